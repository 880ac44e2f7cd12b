#![allow(dead_code)]

use pdf_meta_common::*;
use pdf_meta_indexing::{DocumentClassifier, EntryBuilder, IngestionLoop, RegionTextSource};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tempfile::TempDir;

pub const HEADER: BoundingBox = BoundingBox {
    x0: 0.0,
    y0: 0.0,
    x1: 300.0,
    y1: 60.0,
};

pub const FOOTER: BoundingBox = BoundingBox {
    x0: 0.0,
    y0: 700.0,
    x1: 600.0,
    y1: 790.0,
};

/// One page of a fake document: full-page text plus text for exact regions.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub full: String,
    pub regions: Vec<(BoundingBox, String)>,
}

pub fn page(full: &str, regions: &[(BoundingBox, &str)]) -> FakePage {
    FakePage {
        full: full.to_string(),
        regions: regions
            .iter()
            .map(|(bbox, text)| (*bbox, text.to_string()))
            .collect(),
    }
}

pub type Call = (String, usize, Option<BoundingBox>);

/// In-memory text source keyed by file name. Unknown files fail extraction.
#[derive(Debug, Default)]
pub struct FakeTextSource {
    docs: RwLock<HashMap<String, Vec<FakePage>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeTextSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, file_name: &str, pages: Vec<FakePage>) -> Self {
        self.set_document(file_name, pages);
        self
    }

    pub fn set_document(&self, file_name: &str, pages: Vec<FakePage>) {
        self.docs
            .write()
            .unwrap()
            .insert(file_name.to_string(), pages);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn full_page_reads(&self, file_name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|(name, _, region)| name == file_name && region.is_none())
            .count()
    }
}

impl RegionTextSource for FakeTextSource {
    fn text_at(
        &self,
        path: &Path,
        page_index: usize,
        region: Option<&BoundingBox>,
    ) -> Result<Option<String>> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls
            .lock()
            .unwrap()
            .push((file_name.clone(), page_index, region.copied()));

        let docs = self.docs.read().unwrap();
        let pages = docs
            .get(&file_name)
            .ok_or_else(|| MetaError::extraction(path, "not a PDF"))?;

        let Some(page) = pages.get(page_index) else {
            return Ok(None);
        };

        Ok(Some(match region {
            None => page.full.clone(),
            Some(bbox) => page
                .regions
                .iter()
                .find(|(b, _)| b == bbox)
                .map(|(_, text)| text.clone())
                .unwrap_or_default(),
        }))
    }
}

/// Acme is detected from the header of page 1 (after an optional page 3
/// region), Globex from the footer of page 1.
pub fn test_config() -> CompanyConfig {
    CompanyConfig::new(vec![
        CompanyProfile::new("Acme")
            .with_region(Region::new(3, HEADER))
            .with_region(Region::new(1, HEADER))
            .with_type("auto", ["Auto Policy", "Vehicle"])
            .with_type("home", ["Homeowners"]),
        CompanyProfile::new("Globex")
            .with_region(Region::new(1, FOOTER))
            .with_type("life", ["Term Life"]),
    ])
    .unwrap()
}

pub fn classifier(source: Arc<FakeTextSource>) -> DocumentClassifier {
    DocumentClassifier::new(Arc::new(test_config()), source)
}

pub fn builder(source: Arc<FakeTextSource>) -> EntryBuilder {
    EntryBuilder::new(classifier(source))
}

/// Canonical temp directory so event paths match the loop's directory.
pub fn watch_dir() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().canonicalize().unwrap();
    (temp, dir)
}

pub fn settings(dir: &Path) -> WatchSettings {
    WatchSettings {
        settle: Duration::from_millis(50),
        ..WatchSettings::new(dir)
    }
}

pub fn ingestion_loop(dir: &Path, source: Arc<FakeTextSource>) -> IngestionLoop {
    IngestionLoop::new(&settings(dir), builder(source))
}

/// Write placeholder bytes; the fake source decides what the "PDF" says.
pub fn write_pdf(dir: &Path, file_name: &str) -> PathBuf {
    let path = dir.join(file_name);
    fs::write(&path, format!("%PDF-1.4 {file_name}")).unwrap();
    path
}

pub fn acme_auto() -> Vec<FakePage> {
    vec![page(
        "Acme\nAuto Policy declarations",
        &[(HEADER, "Acme Insurance Co")],
    )]
}

pub fn acme_home() -> Vec<FakePage> {
    vec![page(
        "Acme\nHomeowners coverage",
        &[(HEADER, "Acme Insurance Co")],
    )]
}

pub fn unknown_company() -> Vec<FakePage> {
    vec![page(
        "Initech statement",
        &[(HEADER, "Initech"), (FOOTER, "page 1")],
    )]
}

pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}
