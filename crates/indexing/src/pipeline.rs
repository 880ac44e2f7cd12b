use crate::builder::EntryBuilder;
use crate::classifier::DocumentClassifier;
use crate::debounce::SettleTimers;
use crate::extractor::LopdfTextSource;
use crate::storage::MetadataStore;
use crate::watcher::{is_top_level_pdf, FileEvent, FileWatcher};
use pdf_meta_common::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle of an [`IngestionLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    Reconciling,
    Watching,
    Stopping,
}

/// Outcome of the startup pass over existing files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub classified: usize,
    pub skipped: usize,
    /// Entries loaded from a previous run whose file is gone.
    pub pruned: usize,
    pub flushed: bool,
}

/// All top-level `*.pdf` files of `directory`, sorted by path. Symlinks are
/// followed; entries that cannot be inspected are logged and left out.
pub async fn list_top_level_pdfs(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut read_dir = tokio::fs::read_dir(directory).await?;
    let mut files = Vec::new();

    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        if !has_pdf_extension(&path) {
            continue;
        }
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => files.push(path),
            Ok(_) => debug!("Skipping non-file {}", path.display()),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    files.sort();
    Ok(files)
}

/// Keeps the metadata index of one directory in sync with its PDFs.
///
/// The loop is the single owner of its [`MetadataStore`]. Filesystem events
/// are drained one at a time from a channel, so store mutations and index
/// flushes never overlap.
pub struct IngestionLoop {
    directory: PathBuf,
    builder: Arc<EntryBuilder>,
    store: MetadataStore,
    settle: Duration,
    load_existing: bool,
    state: LoopState,
}

impl IngestionLoop {
    pub fn new(settings: &WatchSettings, builder: EntryBuilder) -> Self {
        Self {
            directory: settings.directory.clone(),
            builder: Arc::new(builder),
            store: MetadataStore::new(&settings.directory),
            settle: settings.settle,
            load_existing: settings.load_existing,
            state: LoopState::Starting,
        }
    }

    /// Validate settings, load company profiles and wire up the PDF text source.
    pub fn from_settings(settings: WatchSettings) -> Result<Self> {
        let settings = settings.validate()?;
        let config = CompanyConfig::load(&settings.companies_path)?;
        info!("Loaded {} company configuration(s)", config.len());

        let source = Arc::new(LopdfTextSource::new(settings.x_tolerance));
        let classifier = DocumentClassifier::new(Arc::new(config), source);
        Ok(Self::new(&settings, EntryBuilder::new(classifier)))
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Classify every PDF already in the directory and write the index once.
    pub async fn reconcile(&mut self) -> Result<ReconcileReport> {
        self.state = LoopState::Reconciling;
        let mut report = ReconcileReport::default();

        if self.load_existing {
            if let Err(e) = self.store.load() {
                warn!("Could not load .meta file, starting empty: {}", e);
            }
        }

        let files = list_top_level_pdfs(&self.directory).await?;
        report.scanned = files.len();
        if !files.is_empty() {
            info!("Processing {} existing PDF file(s)...", files.len());
        }

        for path in &files {
            match self.build(path).await {
                Some(entry) => {
                    self.store.upsert(entry, false)?;
                    report.classified += 1;
                }
                None => report.skipped += 1,
            }
        }

        if self.load_existing {
            let present: HashSet<String> = files.iter().filter_map(|p| document_name(p)).collect();
            report.pruned = self.store.retain_names(&present);
            if report.pruned > 0 {
                info!("Pruned {} entries for files removed while offline", report.pruned);
            }
        }

        if report.classified > 0 || report.pruned > 0 {
            match self.store.flush() {
                Ok(()) => {
                    report.flushed = true;
                    info!("Saved {} entries to .meta file", self.store.len());
                }
                Err(e) => error!("Error: {}", e),
            }
        }

        Ok(report)
    }

    /// Subscribe to the directory and process events until `shutdown` fires.
    /// The subscription is dropped before returning.
    pub async fn watch(self, shutdown: CancellationToken) -> Result<MetadataStore> {
        let (watcher, events) = FileWatcher::new(&self.directory)?;
        let store = self.run(events, shutdown).await;
        drop(watcher);
        Ok(store)
    }

    /// Drain `events` until `shutdown` fires or the sender goes away.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<FileEvent>,
        shutdown: CancellationToken,
    ) -> MetadataStore {
        self.state = LoopState::Watching;
        let (mut timers, mut settled_rx) = SettleTimers::new(self.settle);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                event = events.recv() => match event {
                    Some(event) => self.handle_event(event, &mut timers),
                    None => {
                        debug!("Event channel closed");
                        break;
                    }
                },

                Some(settled) = settled_rx.recv() => {
                    if timers.take_if_current(&settled) {
                        self.process_settled(&settled.path).await;
                    }
                }
            }
        }

        self.state = LoopState::Stopping;
        if timers.pending() > 0 {
            debug!("Dropping {} pending settle timer(s)", timers.pending());
        }
        timers.cancel_all();
        self.store
    }

    fn handle_event(&mut self, event: FileEvent, timers: &mut SettleTimers) {
        if !is_top_level_pdf(&self.directory, event.path()) {
            debug!("Ignoring event outside watch scope: {}", event);
            return;
        }

        match event {
            FileEvent::Created(path) | FileEvent::Modified(path) => {
                debug!("Settling {}", path.display());
                timers.schedule(path);
            }
            FileEvent::Removed(path) => {
                timers.cancel(&path);
                let Some(name) = document_name(&path) else {
                    return;
                };
                info!("Deleted: {}", path.display());
                if let Err(e) = self.store.remove(&name) {
                    error!("Error: {}", e);
                }
            }
        }
    }

    async fn process_settled(&mut self, path: &Path) {
        if !path.is_file() {
            debug!("{} vanished before settling", path.display());
            return;
        }

        if let Some(entry) = self.build(path).await {
            if let Err(e) = self.store.upsert(entry, true) {
                error!("Error: {}", e);
            }
        }
    }

    /// Classify on the blocking pool; every failure is logged and yields `None`.
    async fn build(&self, path: &Path) -> Option<MetaEntry> {
        info!("Processing: {}", path.display());

        let builder = Arc::clone(&self.builder);
        let owned = path.to_path_buf();
        match tokio::task::spawn_blocking(move || builder.build_entry(&owned)).await {
            Ok(Ok(Some(entry))) => {
                info!(
                    company = %entry.company,
                    insurance_type = %entry.insurance_type,
                    "Classified {}",
                    entry.name
                );
                Some(entry)
            }
            Ok(Ok(None)) => {
                warn!(
                    "Skipped {}: unknown company or insurance type",
                    path.display()
                );
                None
            }
            Ok(Err(e)) => {
                error!("Error processing {}: {}", path.display(), e);
                None
            }
            Err(e) => {
                error!("Classification task failed for {}: {}", path.display(), e);
                None
            }
        }
    }
}
