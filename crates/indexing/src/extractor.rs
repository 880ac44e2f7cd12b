//! Region text access for PDF pages.
//!
//! The classifiers only see the [`RegionTextSource`] trait. [`LopdfTextSource`]
//! is the production implementation: `lopdf` parses the document and
//! `pdf-extract` interprets the page, handing every decoded character over
//! with its text rendering matrix and the advance width its font declares.
//! Glyphs whose centre falls in the requested box are laid out into lines.

use lopdf::Document;
use pdf_extract::{MediaBox, OutputDev, OutputError, Transform};
use pdf_meta_common::{BoundingBox, MetaError, Result};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

/// Default vertical distance under which two glyphs share a line.
pub const DEFAULT_Y_TOLERANCE: f64 = 3.0;

/// Anything that can answer "what text is at this spot of this page".
pub trait RegionTextSource: Send + Sync {
    /// Text inside `region` on the zero-based `page_index`, or the whole page
    /// when `region` is `None`.
    ///
    /// `Ok(None)` means the page does not exist, `Ok(Some(""))` means the
    /// page exists but nothing was found there.
    fn text_at(
        &self,
        path: &Path,
        page_index: usize,
        region: Option<&BoundingBox>,
    ) -> Result<Option<String>>;
}

/// Layout knobs for joining glyphs back into text.
#[derive(Debug, Clone, Copy)]
pub struct LayoutOptions {
    /// Horizontal gap above which a space is inserted between two glyphs.
    pub x_tolerance: f64,
    pub y_tolerance: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            x_tolerance: pdf_meta_common::DEFAULT_X_TOLERANCE,
            y_tolerance: DEFAULT_Y_TOLERANCE,
        }
    }
}

/// `lopdf` + `pdf-extract` text source. Each call opens the document afresh.
#[derive(Debug, Clone, Default)]
pub struct LopdfTextSource {
    layout: LayoutOptions,
}

impl LopdfTextSource {
    pub fn new(x_tolerance: f64) -> Self {
        Self {
            layout: LayoutOptions {
                x_tolerance,
                ..LayoutOptions::default()
            },
        }
    }
}

impl RegionTextSource for LopdfTextSource {
    fn text_at(
        &self,
        path: &Path,
        page_index: usize,
        region: Option<&BoundingBox>,
    ) -> Result<Option<String>> {
        let doc = Document::load(path).map_err(|e| MetaError::extraction(path, e))?;

        // get_pages is keyed by 1-based page number
        let Some(page_number) = u32::try_from(page_index + 1)
            .ok()
            .filter(|n| doc.get_pages().contains_key(n))
        else {
            return Ok(None);
        };

        let glyphs = page_glyphs(&doc, page_number).map_err(|e| MetaError::extraction(path, e))?;

        let text = match region {
            Some(bbox) => {
                let inside: Vec<Glyph> = glyphs
                    .into_iter()
                    .filter(|g| bbox.contains(g.center_x(), g.center_y()))
                    .collect();
                layout_text(inside, &self.layout).trim().to_string()
            }
            None => layout_text(glyphs, &self.layout),
        };

        tracing::trace!(
            path = %path.display(),
            page = page_index,
            ?region,
            "extracted {} chars",
            text.len()
        );
        Ok(Some(text))
    }
}

/// One decoded character (or ligature) in top-left page coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    pub x: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Glyph {
    fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    fn center_y(&self) -> f64 {
        self.top + self.height / 2.0
    }

    fn end_x(&self) -> f64 {
        self.x + self.width
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Group glyphs into lines by their top edge, order each line left to right
/// and insert spaces where the horizontal gap exceeds the tolerance.
pub fn layout_text(mut glyphs: Vec<Glyph>, options: &LayoutOptions) -> String {
    glyphs.sort_by(|a, b| a.top.total_cmp(&b.top));

    let mut lines: Vec<Vec<Glyph>> = Vec::new();
    for glyph in glyphs {
        match lines.last_mut() {
            Some(line) if (glyph.top - line[0].top).abs() <= options.y_tolerance => {
                line.push(glyph)
            }
            _ => lines.push(vec![glyph]),
        }
    }

    let mut rendered = Vec::with_capacity(lines.len());
    for mut line in lines {
        line.sort_by(|a, b| a.x.total_cmp(&b.x));

        let mut text = String::new();
        let mut prev: Option<&Glyph> = None;
        for glyph in &line {
            if let Some(p) = prev {
                let gap = glyph.x - p.end_x();
                if gap > options.x_tolerance && !p.is_blank() && !glyph.is_blank() {
                    text.push(' ');
                }
            }
            text.push_str(&glyph.text);
            prev = Some(glyph);
        }
        rendered.push(text);
    }

    rendered.join("\n")
}

/// `OutputDev` that keeps the glyphs of a single page.
struct GlyphCollector {
    page_number: u32,
    /// `(llx, ury)` of the wanted page while it is being interpreted.
    origin: Option<(f64, f64)>,
    glyphs: Vec<Glyph>,
}

impl GlyphCollector {
    fn new(page_number: u32) -> Self {
        Self {
            page_number,
            origin: None,
            glyphs: Vec::new(),
        }
    }
}

impl OutputDev for GlyphCollector {
    fn begin_page(
        &mut self,
        page_num: u32,
        media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> std::result::Result<(), OutputError> {
        if page_num == self.page_number {
            self.origin = Some((media_box.llx, media_box.ury));
        }
        Ok(())
    }

    fn end_page(&mut self) -> std::result::Result<(), OutputError> {
        self.origin = None;
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        char: &str,
    ) -> std::result::Result<(), OutputError> {
        let Some((llx, ury)) = self.origin else {
            return Ok(());
        };
        if char.is_empty() || char.chars().all(char::is_control) {
            return Ok(());
        }

        // trm maps unscaled text space to user space; width is in em
        let height = font_size * trm.m21.hypot(trm.m22);
        let advance = width * font_size * trm.m11.hypot(trm.m12);

        self.glyphs.push(Glyph {
            text: char.to_string(),
            x: trm.m31 - llx,
            top: ury - (trm.m32 + height),
            width: advance,
            height,
        });
        Ok(())
    }

    fn begin_word(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }
}

/// Interpret the document and keep the glyphs of `page_number` (1-based).
fn page_glyphs(doc: &Document, page_number: u32) -> std::result::Result<Vec<Glyph>, String> {
    let mut collector = GlyphCollector::new(page_number);

    // pdf-extract panics on some unsupported font programs
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::output_doc(doc, &mut collector)
    }));

    match outcome {
        Ok(Ok(())) => Ok(collector.glyphs),
        Ok(Err(e)) => Err(format!("{e:?}")),
        Err(_) => Err("text interpreter panicked".to_string()),
    }
}
