//! Paginated output – the intermediate representation between compositing and
//! PDF serialization. It encodes exactly which band goes where on which page.
//!
//! Like a PDF writer, a fresh output already holds one blank page. Pages are
//! only ever appended, and [`PaginatedOutput::finalize`] consumes the output so
//! it cannot be written twice.

use serde::Serialize;

use crate::error::Result;
use crate::render;
use crate::view::SectionKind;

/// Page size and margin in PDF points (1 pt = 1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageGeometry {
    pub width_pt: f32,
    pub height_pt: f32,
    pub margin_pt: f32,
}

impl PageGeometry {
    /// A4 portrait with a 40 pt margin.
    pub fn a4() -> Self {
        Self {
            width_pt: 595.28,
            height_pt: 841.89,
            margin_pt: 40.0,
        }
    }

    pub fn printable_width(&self) -> f32 {
        (self.width_pt - 2.0 * self.margin_pt).max(0.0)
    }

    pub fn printable_height(&self) -> f32 {
        (self.height_pt - 2.0 * self.margin_pt).max(0.0)
    }
}

/// One band of a surface drawn on a page.
#[derive(Debug, Clone, Serialize)]
pub struct Placement {
    /// Top-left corner on the page, in points from the page's top-left.
    pub x_pt: f32,
    pub y_pt: f32,
    pub width_pt: f32,
    pub height_pt: f32,
    /// Pixel size of the encoded band.
    pub px_width: u32,
    pub px_height: u32,
    /// Source rows `source_top..source_bottom` of the surface.
    pub source_top: u32,
    pub source_bottom: u32,
    /// PNG-encoded band pixels.
    #[serde(skip)]
    pub png: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Page {
    pub placements: Vec<Placement>,
}

/// Where one rendered section landed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionRecord {
    pub document_index: usize,
    pub section: SectionKind,
    /// Zero-based index of the section's first page.
    pub first_page: usize,
    pub page_count: usize,
    pub source_height_px: u32,
    pub scaled_height_pt: f32,
}

#[derive(Debug, Clone)]
pub struct PaginatedOutput {
    title: String,
    geometry: PageGeometry,
    pages: Vec<Page>,
    cursor_y_pt: f32,
    sections: Vec<SectionRecord>,
}

/// JSON-friendly summary of an output (no pixel data).
#[derive(Debug, Clone, Serialize)]
pub struct OutputManifest<'a> {
    pub title: &'a str,
    pub geometry: PageGeometry,
    pub page_count: usize,
    pub pages: &'a [Page],
    pub sections: &'a [SectionRecord],
}

impl PaginatedOutput {
    pub fn new(title: impl Into<String>, geometry: PageGeometry) -> Self {
        Self {
            title: title.into(),
            geometry,
            pages: vec![Page::default()],
            cursor_y_pt: geometry.margin_pt,
            sections: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Index of the page currently being drawn on.
    pub fn current_page(&self) -> usize {
        self.pages.len() - 1
    }

    /// Vertical position (pt from the page top) just below the last drawing.
    pub fn cursor_y(&self) -> f32 {
        self.cursor_y_pt
    }

    pub fn sections(&self) -> &[SectionRecord] {
        &self.sections
    }

    /// Start a new page and move the cursor to its top margin.
    pub fn add_page(&mut self) {
        self.pages.push(Page::default());
        self.cursor_y_pt = self.geometry.margin_pt;
    }

    /// Draw a band on the current page and move the cursor below it.
    pub fn place(&mut self, placement: Placement) {
        self.cursor_y_pt = placement.y_pt + placement.height_pt;
        if let Some(page) = self.pages.last_mut() {
            page.placements.push(placement);
        }
    }

    pub fn record_section(&mut self, record: SectionRecord) {
        self.sections.push(record);
    }

    pub fn manifest(&self) -> OutputManifest<'_> {
        OutputManifest {
            title: &self.title,
            geometry: self.geometry,
            page_count: self.pages.len(),
            pages: &self.pages,
            sections: &self.sections,
        }
    }

    pub fn manifest_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.manifest())?)
    }

    /// Serialize to PDF bytes. Consumes the output.
    pub fn finalize(self) -> Result<Vec<u8>> {
        render::render_pdf(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_one_blank_page() {
        let out = PaginatedOutput::new("t", PageGeometry::a4());
        assert_eq!(out.page_count(), 1);
        assert_eq!(out.current_page(), 0);
        assert!(out.pages()[0].placements.is_empty());
        assert_eq!(out.cursor_y(), 40.0);
    }

    #[test]
    fn a4_printable_area() {
        let g = PageGeometry::a4();
        assert!((g.printable_width() - 515.28).abs() < 1e-3);
        assert!((g.printable_height() - 761.89).abs() < 1e-3);
    }

    #[test]
    fn manifest_omits_pixels() {
        let mut out = PaginatedOutput::new("Manifest", PageGeometry::a4());
        out.place(Placement {
            x_pt: 40.0,
            y_pt: 40.0,
            width_pt: 515.28,
            height_pt: 100.0,
            px_width: 10,
            px_height: 2,
            source_top: 0,
            source_bottom: 2,
            png: vec![1, 2, 3],
        });
        assert_eq!(out.cursor_y(), 140.0);
        let json = out.manifest_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["page_count"], 1);
        assert_eq!(value["pages"][0]["placements"][0]["px_width"], 10);
        assert!(value["pages"][0]["placements"][0].get("png").is_none());
    }
}
