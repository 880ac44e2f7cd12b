use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Notification that a path has been quiet for the whole settle interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled {
    pub path: PathBuf,
    generation: u64,
}

/// One cancellable settle timer per path.
///
/// Scheduling a path that already has a timer aborts the old one, so a burst
/// of writes to the same file produces a single [`Settled`] once the file
/// has been quiet for `delay`. Each timer carries a generation number so a
/// timer that fired just before being replaced is recognised as stale.
#[derive(Debug)]
pub struct SettleTimers {
    delay: Duration,
    next_generation: u64,
    pending: HashMap<PathBuf, (u64, JoinHandle<()>)>,
    tx: mpsc::UnboundedSender<Settled>,
}

impl SettleTimers {
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<Settled>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                delay,
                next_generation: 0,
                pending: HashMap::new(),
                tx,
            },
            rx,
        )
    }

    /// (Re)start the timer for `path`.
    pub fn schedule(&mut self, path: PathBuf) {
        self.next_generation += 1;
        let generation = self.next_generation;

        let tx = self.tx.clone();
        let delay = self.delay;
        let settled = Settled {
            path: path.clone(),
            generation,
        };
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(settled);
        });

        if let Some((_, previous)) = self.pending.insert(path, (generation, handle)) {
            previous.abort();
        }
    }

    /// Drop the timer for `path`; returns whether one was pending.
    pub fn cancel(&mut self, path: &Path) -> bool {
        match self.pending.remove(path) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Consume a fired timer. Returns `false` when it was replaced or
    /// cancelled after firing.
    pub fn take_if_current(&mut self, settled: &Settled) -> bool {
        match self.pending.get(&settled.path) {
            Some((generation, _)) if *generation == settled.generation => {
                self.pending.remove(&settled.path);
                true
            }
            _ => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn cancel_all(&mut self) {
        for (_, (_, handle)) in self.pending.drain() {
            handle.abort();
        }
    }
}

impl Drop for SettleTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
