//! Font loading, text measurement and glyph outlines using `ttf-parser`.
//!
//! Views use a single sans-serif typeface in four faces (regular, bold,
//! italic, bold italic). Faces come from explicit font files or from system
//! font discovery via `fontdb`. With no face loaded, measurement falls back to
//! Helvetica-like average advances and the rasterizer greeks the text.

use std::collections::HashMap;
use std::path::Path;

use ttf_parser::OutlineBuilder;

use crate::error::{ExportError, Result};

/// Families tried, in order, during system font discovery.
const SYSTEM_FAMILIES: [&str; 4] = ["Liberation Sans", "DejaVu Sans", "Arial", "Helvetica"];

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    pub face_index: u32,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub bold: bool,
    pub italic: bool,
}

/// Manages the loaded faces of the document typeface.
#[derive(Default)]
pub struct FontManager {
    fonts: HashMap<FontKey, FontData>,
}

impl FontManager {
    /// A manager with no faces: heuristic metrics, greeked rendering.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover a sans-serif typeface among the installed system fonts.
    pub fn with_system_fonts() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();

        let families: Vec<fontdb::Family> = SYSTEM_FAMILIES
            .iter()
            .map(|name| fontdb::Family::Name(name))
            .chain(std::iter::once(fontdb::Family::SansSerif))
            .collect();

        let mut mgr = Self::new();
        for (bold, italic) in [(false, false), (true, false), (false, true), (true, true)] {
            let query = fontdb::Query {
                families: &families,
                weight: if bold {
                    fontdb::Weight::BOLD
                } else {
                    fontdb::Weight::NORMAL
                },
                style: if italic {
                    fontdb::Style::Italic
                } else {
                    fontdb::Style::Normal
                },
                ..fontdb::Query::default()
            };
            let Some(id) = db.query(&query) else {
                continue;
            };
            let Some((bytes, index)) = db.with_face_data(id, |data, index| (data.to_vec(), index))
            else {
                continue;
            };
            if let Err(e) = mgr.load_font(bold, italic, bytes, index) {
                log::warn!("Skipping system font face — {e}");
            }
        }

        if mgr.has_real_fonts() {
            log::debug!("Loaded {} system font face(s)", mgr.fonts.len());
        } else {
            log::warn!("No system sans-serif font found; text will be greeked");
        }
        mgr
    }

    /// Load a TTF/OTF face from bytes.
    pub fn load_font(&mut self, bold: bool, italic: bool, bytes: Vec<u8>, face_index: u32) -> Result<()> {
        let face = ttf_parser::Face::parse(&bytes, face_index)
            .map_err(|e| ExportError::Font(format!("failed to parse font: {e}")))?;

        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            face_index,
            bytes,
        };
        self.fonts.insert(FontKey { bold, italic }, data);
        Ok(())
    }

    /// Load a face from a font file.
    pub fn load_file(&mut self, path: &Path, bold: bool, italic: bool) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.load_font(bold, italic, bytes, 0)
    }

    /// Exact face, then the upright face of the same weight, then regular.
    fn get(&self, bold: bool, italic: bool) -> Option<&FontData> {
        self.fonts
            .get(&FontKey { bold, italic })
            .or_else(|| self.fonts.get(&FontKey { bold, italic: false }))
            .or_else(|| self.fonts.get(&FontKey { bold: false, italic: false }))
            .or_else(|| self.fonts.values().next())
    }

    /// True when at least one real face is loaded.
    pub fn has_real_fonts(&self) -> bool {
        !self.fonts.is_empty()
    }

    /// Measure the width of a string at a given font size (in px).
    pub fn measure_text_width(&self, text: &str, font_size: f32, bold: bool, italic: bool) -> f32 {
        let face = self
            .get(bold, italic)
            .and_then(|d| ttf_parser::Face::parse(&d.bytes, d.face_index).ok().map(|f| (d, f)));

        match face {
            Some((data, face)) => {
                let scale = font_size / data.units_per_em;
                text.chars()
                    .map(|ch| match face.glyph_index(ch) {
                        Some(gid) => face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                        None => font_size * 0.5,
                    })
                    .sum()
            }
            None => {
                // Average char width ≈ 0.5 × font_size; bold is ~10 % wider.
                let avg = if bold { 0.55 } else { 0.5 };
                text.chars().count() as f32 * font_size * avg
            }
        }
    }

    /// Ascender in px (distance from the line top to the baseline).
    pub fn ascender_px(&self, font_size: f32, bold: bool, italic: bool) -> f32 {
        match self.get(bold, italic) {
            Some(d) => d.ascender * font_size / d.units_per_em,
            None => font_size * 0.75,
        }
    }

    /// Emit the glyph outlines of `text` in px coordinates, with the pen
    /// starting at `(x, baseline)`.
    ///
    /// Returns `false` without emitting anything when no face is loaded.
    pub fn outline_text<B: OutlineBuilder>(
        &self,
        text: &str,
        font_size: f32,
        bold: bool,
        italic: bool,
        x: f32,
        baseline: f32,
        builder: &mut B,
    ) -> bool {
        let Some(data) = self.get(bold, italic) else {
            return false;
        };
        let Ok(face) = ttf_parser::Face::parse(&data.bytes, data.face_index) else {
            return false;
        };
        let scale = font_size / data.units_per_em;

        let mut pen_x = x;
        for ch in text.chars() {
            let Some(gid) = face.glyph_index(ch) else {
                pen_x += font_size * 0.5;
                continue;
            };
            let mut placed = PlacedGlyph {
                inner: &mut *builder,
                scale,
                x: pen_x,
                y: baseline,
            };
            face.outline_glyph(gid, &mut placed);
            pen_x += face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale;
        }
        true
    }
}

/// Maps font units (y up) to px (y down) at a pen position.
struct PlacedGlyph<'a, B: OutlineBuilder> {
    inner: &'a mut B,
    scale: f32,
    x: f32,
    y: f32,
}

impl<B: OutlineBuilder> PlacedGlyph<'_, B> {
    fn px(&self, gx: f32, gy: f32) -> (f32, f32) {
        (self.x + gx * self.scale, self.y - gy * self.scale)
    }
}

impl<B: OutlineBuilder> OutlineBuilder for PlacedGlyph<'_, B> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.px(x, y);
        self.inner.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.px(x, y);
        self.inner.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.px(x1, y1);
        let (x, y) = self.px(x, y);
        self.inner.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.px(x1, y1);
        let (x2, y2) = self.px(x2, y2);
        let (x, y) = self.px(x, y);
        self.inner.curve_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

/// Word-wrap text to fit within `max_width` pixels. Returns a vec of lines.
pub fn wrap_text(
    text: &str,
    font_size: f32,
    bold: bool,
    italic: bool,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current_line = String::new();
        for word in &words {
            let candidate = if current_line.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current_line, word)
            };
            let w = fonts.measure_text_width(&candidate, font_size, bold, italic);
            if w > max_width && !current_line.is_empty() {
                lines.push(current_line);
                current_line = word.to_string();
            } else {
                current_line = candidate;
            }
        }
        if !current_line.is_empty() {
            lines.push(current_line);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_text_width() {
        let mgr = FontManager::new();
        let w = mgr.measure_text_width("Hello", 16.0, false, false);
        // 5 chars × 16 × 0.5 = 40
        assert!((w - 40.0).abs() < 0.1);
        let bold = mgr.measure_text_width("Hello", 16.0, true, false);
        assert!(bold > w);
    }

    #[test]
    fn word_wrap_basic() {
        let mgr = FontManager::new();
        let lines = wrap_text("Hello world foo bar", 16.0, false, false, 60.0, &mgr);
        assert!(lines.len() >= 2, "Expected wrapping, got {:?}", lines);
        assert_eq!(lines.join(" "), "Hello world foo bar");
    }

    #[test]
    fn outline_without_fonts_reports_greeking() {
        struct Count(usize);
        impl OutlineBuilder for Count {
            fn move_to(&mut self, _: f32, _: f32) {
                self.0 += 1;
            }
            fn line_to(&mut self, _: f32, _: f32) {}
            fn quad_to(&mut self, _: f32, _: f32, _: f32, _: f32) {}
            fn curve_to(&mut self, _: f32, _: f32, _: f32, _: f32, _: f32, _: f32) {}
            fn close(&mut self) {}
        }
        let mut count = Count(0);
        let drawn = FontManager::new().outline_text("Hi", 12.0, false, false, 0.0, 10.0, &mut count);
        assert!(!drawn);
        assert_eq!(count.0, 0);
    }

    #[test]
    fn invalid_font_bytes_are_rejected() {
        let mut mgr = FontManager::new();
        let err = mgr.load_font(false, false, vec![0, 1, 2, 3], 0).unwrap_err();
        assert!(matches!(err, ExportError::Font(_)));
        assert!(!mgr.has_real_fonts());
    }
}
