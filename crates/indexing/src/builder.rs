use crate::classifier::DocumentClassifier;
use crate::hashing::file_sha256;
use pdf_meta_common::*;
use std::path::Path;

/// Turns a PDF on disk into a [`MetaEntry`], or nothing when it cannot be
/// fully classified.
#[derive(Debug, Clone)]
pub struct EntryBuilder {
    classifier: DocumentClassifier,
}

impl EntryBuilder {
    pub fn new(classifier: DocumentClassifier) -> Self {
        Self { classifier }
    }

    /// `Ok(None)` is a classification miss; `Err` means the file itself
    /// could not be read.
    pub fn build_entry(&self, path: &Path) -> Result<Option<MetaEntry>> {
        let name = document_name(path)
            .ok_or_else(|| MetaError::extraction(path, "file has no usable name"))?;
        let content_hash = file_sha256(path)?;

        let Some(Classification {
            company,
            insurance_type,
        }) = self.classifier.classify(path)
        else {
            return Ok(None);
        };

        Ok(Some(MetaEntry {
            name,
            content_hash,
            company,
            insurance_type,
        }))
    }
}
