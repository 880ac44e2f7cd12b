use crate::extractor::RegionTextSource;
use pdf_meta_common::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Two-stage document classifier driven entirely by [`CompanyConfig`].
///
/// Stage one finds the issuing company by reading each profile's regions in
/// configured order. Stage two reads the first page of the document and looks
/// for that company's insurance-type phrases. Both stages are literal,
/// case-sensitive substring checks and the first hit wins.
#[derive(Clone)]
pub struct DocumentClassifier {
    config: Arc<CompanyConfig>,
    source: Arc<dyn RegionTextSource>,
}

impl DocumentClassifier {
    pub fn new(config: Arc<CompanyConfig>, source: Arc<dyn RegionTextSource>) -> Self {
        Self { config, source }
    }

    /// First company whose name appears in one of its own regions.
    pub fn detect_company(&self, path: &Path) -> Option<String> {
        for profile in &self.config.companies {
            for region in &profile.coordinates {
                if !region.is_usable() {
                    warn!(
                        "Skipping unusable region for '{}' (page {}, {}, {}, {}, {})",
                        profile.company, region.page, region.x0, region.y0, region.x1, region.y1
                    );
                    continue;
                }
                let bbox = region.bbox();
                let text = match self.source.text_at(path, region.page_index(), Some(&bbox)) {
                    Ok(Some(text)) => text,
                    Ok(None) => {
                        debug!(
                            "{}: page {} absent, skipping region for '{}'",
                            path.display(),
                            region.page,
                            profile.company
                        );
                        continue;
                    }
                    Err(e) => {
                        warn!("Could not extract text from region: {}", e);
                        continue;
                    }
                };

                if text.contains(profile.company.as_str()) {
                    debug!(
                        "{}: matched '{}' on page {}",
                        path.display(),
                        profile.company,
                        region.page
                    );
                    return Some(profile.company.clone());
                }
            }
        }
        None
    }

    /// First insurance type of `company` with a phrase on page one.
    pub fn detect_insurance_type(&self, path: &Path, company: Option<&str>) -> Option<String> {
        let company = company?;
        let profile = self.config.profile(company)?;

        let full_text = match self.source.text_at(path, 0, None) {
            Ok(Some(text)) => text,
            Ok(None) => String::new(),
            Err(e) => {
                warn!("Could not extract page text: {}", e);
                String::new()
            }
        };

        for (type_id, phrases) in &profile.insurance_types {
            if phrases.iter().any(|p| full_text.contains(p.as_str())) {
                return Some(type_id.clone());
            }
        }

        warn!("No insurance type matched for company '{}'", company);
        None
    }

    /// Run both stages; `None` unless both produce a non-empty label.
    pub fn classify(&self, path: &Path) -> Option<Classification> {
        let company = self.detect_company(path);
        let insurance_type = self.detect_insurance_type(path, company.as_deref());

        match (company, insurance_type) {
            (Some(company), Some(insurance_type))
                if !company.is_empty() && !insurance_type.is_empty() =>
            {
                Some(Classification {
                    company,
                    insurance_type,
                })
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for DocumentClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentClassifier")
            .field("companies", &self.config.len())
            .finish()
    }
}
