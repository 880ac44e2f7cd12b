pub mod builder;
pub mod classifier;
pub mod debounce;
pub mod extractor;
pub mod hashing;
pub mod pipeline;
pub mod storage;
pub mod watcher;

pub use builder::EntryBuilder;
pub use classifier::DocumentClassifier;
pub use extractor::{LopdfTextSource, RegionTextSource};
pub use pipeline::{IngestionLoop, LoopState, ReconcileReport};
pub use storage::MetadataStore;
pub use watcher::{FileEvent, FileWatcher};
