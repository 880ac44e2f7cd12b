use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// One classified document as it appears in the index file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetaEntry {
    /// File name without extension.
    pub name: String,
    /// Hex SHA-256 of the file at classification time.
    pub content_hash: String,
    pub company: String,
    pub insurance_type: String,
}

impl MetaEntry {
    pub fn new(
        name: impl Into<String>,
        content_hash: impl Into<String>,
        company: impl Into<String>,
        insurance_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            content_hash: content_hash.into(),
            company: company.into(),
            insurance_type: insurance_type.into(),
        }
    }
}

impl fmt::Display for MetaEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} / {})", self.name, self.company, self.insurance_type)
    }
}

/// Outcome of the two classification stages for a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub company: String,
    pub insurance_type: String,
}

/// Stable document identity: the file name without its extension.
pub fn document_name(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// True for `*.pdf`, ignoring extension case.
pub fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}
