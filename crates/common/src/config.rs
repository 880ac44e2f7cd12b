use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MetaError, Result};

pub const DEFAULT_COMPANIES_FILE: &str = "companies.json";
pub const DEFAULT_X_TOLERANCE: f64 = 1.0;
pub const DEFAULT_SETTLE_MS: u64 = 500;

/// Axis-aligned box in page space, origin at the top-left corner of the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BoundingBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }
}

/// A detection region: 1-indexed page plus the box to read on it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default)]
    pub x0: f64,
    #[serde(default)]
    pub y0: f64,
    #[serde(default)]
    pub x1: f64,
    #[serde(default)]
    pub y1: f64,
}

fn default_page() -> u32 {
    1
}

impl Region {
    pub fn new(page: u32, bbox: BoundingBox) -> Self {
        Self {
            page,
            x0: bbox.x0,
            y0: bbox.y0,
            x1: bbox.x1,
            y1: bbox.y1,
        }
    }

    /// Zero-based page index as understood by text sources.
    pub fn page_index(&self) -> usize {
        self.page.saturating_sub(1) as usize
    }

    /// Page 0 and inverted boxes can never be read; classification skips them.
    pub fn is_usable(&self) -> bool {
        self.page >= 1 && self.x0 <= self.x1 && self.y0 <= self.y1
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.x0, self.y0, self.x1, self.y1)
    }
}

/// Detection rules for one issuing company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    /// Used both as the literal to search for and as the label.
    pub company: String,
    #[serde(default)]
    pub coordinates: Vec<Region>,
    /// Type identifier to candidate phrases, kept in file order.
    #[serde(default)]
    pub insurance_types: IndexMap<String, Vec<String>>,
}

impl CompanyProfile {
    pub fn new(company: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            coordinates: Vec::new(),
            insurance_types: IndexMap::new(),
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.coordinates.push(region);
        self
    }

    pub fn with_type<I, S>(mut self, type_id: impl Into<String>, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insurance_types
            .insert(type_id.into(), phrases.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Debug, Deserialize)]
struct TomlCompanies {
    companies: Vec<CompanyProfile>,
}

/// Ordered set of company profiles, immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyConfig {
    pub companies: Vec<CompanyProfile>,
}

impl CompanyConfig {
    pub fn new(companies: Vec<CompanyProfile>) -> Result<Self> {
        let config = Self { companies };
        config.validate()?;
        Ok(config)
    }

    /// Load profiles from a JSON array, or from `[[companies]]` tables when
    /// the path ends in `.toml`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(MetaError::Config(format!(
                "Companies config file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

        let companies = if is_toml {
            toml::from_str::<TomlCompanies>(&content)?.companies
        } else {
            serde_json::from_str::<Vec<CompanyProfile>>(&content)?
        };

        Self::new(companies)
    }

    /// Names must be non-empty and unique. Regions are not checked here:
    /// ones that cannot be read are skipped during classification.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for profile in &self.companies {
            if profile.company.is_empty() {
                return Err(MetaError::Config("company name must not be empty".into()));
            }
            if !seen.insert(profile.company.as_str()) {
                return Err(MetaError::Config(format!(
                    "duplicate company profile: {}",
                    profile.company
                )));
            }
            if profile.insurance_types.is_empty() {
                tracing::warn!("Company '{}' has no insurance types configured", profile.company);
            }
        }
        Ok(())
    }

    pub fn profile(&self, company: &str) -> Option<&CompanyProfile> {
        self.companies.iter().find(|p| p.company == company)
    }

    pub fn len(&self) -> usize {
        self.companies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }
}

/// Runtime settings for one watched directory.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub directory: PathBuf,
    pub companies_path: PathBuf,
    pub x_tolerance: f64,
    pub settle: Duration,
    /// Read the previous index back before reconciling instead of starting empty.
    pub load_existing: bool,
}

impl WatchSettings {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            companies_path: PathBuf::from(DEFAULT_COMPANIES_FILE),
            x_tolerance: DEFAULT_X_TOLERANCE,
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            load_existing: false,
        }
    }

    /// Resolve the directory and make sure it exists.
    pub fn validate(mut self) -> Result<Self> {
        if !self.directory.exists() {
            return Err(MetaError::Config(format!(
                "Directory does not exist: {}",
                self.directory.display()
            )));
        }
        if !self.directory.is_dir() {
            return Err(MetaError::Config(format!(
                "Path is not a directory: {}",
                self.directory.display()
            )));
        }
        self.directory = self.directory.canonicalize()?;
        if !self.x_tolerance.is_finite() || self.x_tolerance < 0.0 {
            return Err(MetaError::Config(format!(
                "x tolerance must be a non-negative number, got {}",
                self.x_tolerance
            )));
        }
        Ok(self)
    }
}
