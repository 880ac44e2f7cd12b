use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Extraction failed for {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error("Could not write index file {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Watch error: {0}")]
    Watch(String),
}

impl MetaError {
    pub fn extraction(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        MetaError::Extraction {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MetaError>;
