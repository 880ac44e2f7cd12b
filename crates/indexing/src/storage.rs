use pdf_meta_common::*;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const RECORD_SEPARATOR: &str = "---";
pub const INDEX_EXTENSION: &str = "meta";

/// `<dir>/<dir name>.meta`
pub fn index_path_for(directory: &Path) -> PathBuf {
    let stem = directory
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".to_string());
    directory.join(format!("{stem}.{INDEX_EXTENSION}"))
}

/// In-memory map of classified documents mirrored to one index file.
///
/// The store is the only writer of its file. Every flush rewrites the whole
/// file; nothing is appended.
#[derive(Debug)]
pub struct MetadataStore {
    index_path: PathBuf,
    entries: BTreeMap<String, MetaEntry>,
    flush_count: u64,
}

impl MetadataStore {
    /// Empty store for `directory`. The existing index file, if any, is not read.
    pub fn new(directory: &Path) -> Self {
        Self::with_index_path(index_path_for(directory))
    }

    pub fn with_index_path(index_path: PathBuf) -> Self {
        Self {
            index_path,
            entries: BTreeMap::new(),
            flush_count: 0,
        }
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn get(&self, name: &str) -> Option<&MetaEntry> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = &MetaEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of successful writes of the index file.
    pub fn flush_count(&self) -> u64 {
        self.flush_count
    }

    /// Insert or replace by name, optionally rewriting the index file.
    pub fn upsert(&mut self, entry: MetaEntry, flush: bool) -> Result<()> {
        debug!("Updated metadata for: {}", entry.name);
        self.entries.insert(entry.name.clone(), entry);
        if flush {
            self.flush()?;
        }
        Ok(())
    }

    /// Drop `name` and rewrite the file. Unknown names leave the file alone.
    pub fn remove(&mut self, name: &str) -> Result<bool> {
        if self.entries.remove(name).is_none() {
            return Ok(false);
        }
        info!("Removed metadata for: {}", name);
        self.flush()?;
        Ok(true)
    }

    /// Keep only entries whose name is in `names`; returns how many were dropped.
    pub fn retain_names(&mut self, names: &HashSet<String>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|name, _| names.contains(name));
        before - self.entries.len()
    }

    /// Serialize every entry, replacing the previous file atomically.
    pub fn flush(&mut self) -> Result<()> {
        let rendered = render_entries(self.entries.values());
        let tmp_path = self.index_path.with_extension(format!("{INDEX_EXTENSION}.tmp"));

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(rendered.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.index_path)
        };

        write().map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            MetaError::Persistence {
                path: self.index_path.clone(),
                source,
            }
        })?;

        self.flush_count += 1;
        debug!(
            "Wrote {} entries to {}",
            self.entries.len(),
            self.index_path.display()
        );
        Ok(())
    }

    /// Replace the in-memory map with the contents of the index file.
    /// A missing file yields an empty store.
    pub fn load(&mut self) -> Result<usize> {
        self.entries.clear();
        if !self.index_path.exists() {
            return Ok(0);
        }

        let content = fs::read_to_string(&self.index_path)?;
        for entry in parse_entries(&content) {
            self.entries.insert(entry.name.clone(), entry);
        }
        info!(
            "Loaded {} entries from {}",
            self.entries.len(),
            self.index_path.display()
        );
        Ok(self.entries.len())
    }
}

/// Index file layout: a separator line, then name, hash, company and type.
pub fn render_entries<'a>(entries: impl IntoIterator<Item = &'a MetaEntry>) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(RECORD_SEPARATOR);
        out.push('\n');
        for field in [
            &entry.name,
            &entry.content_hash,
            &entry.company,
            &entry.insurance_type,
        ] {
            out.push_str(field);
            out.push('\n');
        }
    }
    out
}

/// Inverse of [`render_entries`]. Blocks with fewer than four lines are skipped.
pub fn parse_entries(content: &str) -> Vec<MetaEntry> {
    let mut entries = Vec::new();
    for block in content.split(RECORD_SEPARATOR) {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }

        let lines: Vec<&str> = block.lines().map(str::trim).collect();
        match lines[..] {
            [name, hash, company, insurance_type, ..] => entries.push(MetaEntry::new(
                name,
                hash,
                company,
                insurance_type,
            )),
            _ => warn!("Skipping malformed index block: {:?}", block),
        }
    }
    entries
}
