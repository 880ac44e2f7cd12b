use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use pdf_meta_common::*;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// A change to a top-level PDF of the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

impl FileEvent {
    pub fn path(&self) -> &Path {
        match self {
            FileEvent::Created(p) | FileEvent::Modified(p) | FileEvent::Removed(p) => p,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            FileEvent::Created(_) => "created",
            FileEvent::Modified(_) => "modified",
            FileEvent::Removed(_) => "deleted",
        }
    }
}

impl fmt::Display for FileEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.event_type(), self.path().display())
    }
}

/// True when `path` is a `.pdf` directly inside `directory`.
pub fn is_top_level_pdf(directory: &Path, path: &Path) -> bool {
    has_pdf_extension(path) && path.parent() == Some(directory)
}

/// Map a raw notify event onto the events the ingestion loop cares about.
///
/// Renames become a removal of the old path and a creation of the new one.
/// Paths outside the top level of `directory`, non-PDF files and
/// directories are dropped.
pub fn translate_event(directory: &Path, event: &Event) -> Vec<FileEvent> {
    let relevant = |p: &PathBuf| is_top_level_pdf(directory, p);
    let existing_file = |p: &PathBuf| relevant(p) && !p.is_dir();

    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event
            .paths
            .iter()
            .filter(|&p| existing_file(p))
            .cloned()
            .map(FileEvent::Created)
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .filter(|&p| relevant(p))
            .cloned()
            .map(FileEvent::Removed)
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .filter(|&p| existing_file(p))
            .cloned()
            .map(FileEvent::Created)
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut out = Vec::new();
            if let [from, to, ..] = event.paths.as_slice() {
                if relevant(from) {
                    out.push(FileEvent::Removed(from.clone()));
                }
                if existing_file(to) {
                    out.push(FileEvent::Created(to.clone()));
                }
            }
            out
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => event
            .paths
            .iter()
            .filter(|&p| existing_file(p))
            .cloned()
            .map(FileEvent::Modified)
            .collect(),
        // A file closed after writing was created or updated
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => event
            .paths
            .iter()
            .filter(|&p| existing_file(p))
            .cloned()
            .map(FileEvent::Modified)
            .collect(),
        EventKind::Remove(RemoveKind::Folder) => Vec::new(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .filter(|&p| relevant(p))
            .cloned()
            .map(FileEvent::Removed)
            .collect(),
        _ => Vec::new(),
    }
}

/// Non-recursive notify watcher on one directory, forwarding translated
/// events over a tokio channel. Dropping it unsubscribes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    pub fn new(directory: &Path) -> Result<(Self, mpsc::UnboundedReceiver<FileEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let root = directory.to_path_buf();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for file_event in translate_event(&root, &event) {
                        tracing::trace!("Watch event: {}", file_event);
                        if tx.send(file_event).is_err() {
                            tracing::debug!("Event receiver dropped, discarding event");
                            return;
                        }
                    }
                }
                Err(error) => tracing::error!("Watch error: {:?}", error),
            }
        })
        .map_err(|e| MetaError::Watch(e.to_string()))?;

        watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(|e| MetaError::Watch(format!("{}: {}", directory.display(), e)))?;
        tracing::info!("Watching path: {:?}", directory);

        Ok((Self { _watcher: watcher }, rx))
    }
}
