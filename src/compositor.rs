//! Page compositor – scales a rendered surface to the printable width and
//! slices it into page-sized bands.
//!
//! Band `k` starts at source row `floor(k × printable_height / scale)`; the
//! last band ends at the surface's bottom row. Bands are contiguous and never
//! overlap, so their drawn heights always add up to the scaled height. Because
//! offsets are floored, a band can extend less than one source pixel into the
//! bottom margin.

use crate::error::{ExportError, Result};
use crate::output::{PageGeometry, PaginatedOutput, Placement, SectionRecord};
use crate::surface::Surface;
use crate::view::SectionKind;

/// Float noise below this fraction of a page never adds a page.
const PAGE_EPSILON: f64 = 1e-6;

/// One slice of a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub source_top: u32,
    pub source_bottom: u32,
    /// Drawn height in points.
    pub height_pt: f32,
}

/// How a surface of a given size is spread over pages.
#[derive(Debug, Clone, PartialEq)]
pub struct BandPlan {
    /// Points per source pixel.
    pub scale: f64,
    pub scaled_height: f64,
    pub bands: Vec<Band>,
}

impl BandPlan {
    pub fn page_count(&self) -> usize {
        self.bands.len()
    }
}

/// Plan the bands for a `width × height` px surface. `None` when the surface
/// is empty, the page has no printable area, or a single source row would be
/// drawn taller than the printable height.
pub fn band_plan(width: u32, height: u32, geometry: &PageGeometry) -> Option<BandPlan> {
    let printable_width = geometry.printable_width() as f64;
    let printable_height = geometry.printable_height() as f64;
    if width == 0 || height == 0 || printable_width <= 0.0 || printable_height <= 0.0 {
        return None;
    }

    let scale = printable_width / width as f64;
    let scaled_height = height as f64 * scale;
    let count = ((scaled_height / printable_height - PAGE_EPSILON).ceil() as usize).max(1);
    let rows_per_page = printable_height / scale;
    // A row cannot be split across pages.
    if rows_per_page < 1.0 {
        return None;
    }

    let mut bands = Vec::with_capacity(count);
    for k in 0..count {
        let top = ((k as f64 * rows_per_page).floor() as u32).min(height);
        let bottom = if k + 1 == count {
            height
        } else {
            (((k + 1) as f64 * rows_per_page).floor() as u32).min(height)
        };
        bands.push(Band {
            source_top: top,
            source_bottom: bottom,
            height_pt: ((bottom - top) as f64 * scale) as f32,
        });
    }

    Some(BandPlan {
        scale,
        scaled_height,
        bands,
    })
}

/// Draw `surface` into `output`, consuming it.
///
/// When `is_first` is set the first band goes on the output's current page;
/// otherwise a new page is started. Every further band starts a new page.
/// Returns `false` (and records nothing) for an empty surface. A surface so
/// narrow that one of its rows outgrows a page is a render error.
pub fn composite(
    output: &mut PaginatedOutput,
    surface: Surface,
    is_first: bool,
    document_index: usize,
    section: SectionKind,
) -> Result<bool> {
    let geometry = output.geometry();
    let Some(plan) = band_plan(surface.width(), surface.height(), &geometry) else {
        if !surface.is_empty() {
            return Err(ExportError::render(
                section.to_string(),
                format!(
                    "{}x{} px surface cannot be paginated: one row is {:.1} pt tall, the printable height is {:.1} pt",
                    surface.width(),
                    surface.height(),
                    geometry.printable_width() / surface.width() as f32,
                    geometry.printable_height()
                ),
            ));
        }
        log::warn!(
            "Skipping empty {section} surface ({}x{} px)",
            surface.width(),
            surface.height()
        );
        return Ok(false);
    };

    let mut first_page = output.current_page();
    for (k, band) in plan.bands.iter().enumerate() {
        if k > 0 || !is_first {
            output.add_page();
        }
        if k == 0 {
            first_page = output.current_page();
        }
        let png = surface.encode_band_png(band.source_top, band.source_bottom)?;
        output.place(Placement {
            x_pt: geometry.margin_pt,
            y_pt: geometry.margin_pt,
            width_pt: geometry.printable_width(),
            height_pt: band.height_pt,
            px_width: surface.width(),
            px_height: band.source_bottom - band.source_top,
            source_top: band.source_top,
            source_bottom: band.source_bottom,
            png,
        });
    }

    log::debug!(
        "Composited {section}: {}x{} px → {:.1} pt over {} page(s) from page {}",
        surface.width(),
        surface.height(),
        plan.scaled_height,
        plan.page_count(),
        first_page + 1
    );
    output.record_section(SectionRecord {
        document_index,
        section,
        first_page,
        page_count: plan.page_count(),
        source_height_px: surface.height(),
        scaled_height_pt: plan.scaled_height as f32,
    });
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> PageGeometry {
        // 500 × 700 printable
        PageGeometry {
            width_pt: 600.0,
            height_pt: 800.0,
            margin_pt: 50.0,
        }
    }

    #[test]
    fn single_page_surface() {
        let plan = band_plan(1000, 1000, &geometry()).unwrap();
        assert_eq!(plan.scale, 0.5);
        assert_eq!(plan.page_count(), 1);
        assert_eq!(plan.bands[0].source_bottom, 1000);
        assert!((plan.bands[0].height_pt - 500.0).abs() < 1e-3);
    }

    #[test]
    fn exact_multiple_does_not_add_sliver_page() {
        // 2800 px × 0.5 = 1400 pt = exactly two pages
        let plan = band_plan(1000, 2800, &geometry()).unwrap();
        assert_eq!(plan.page_count(), 2);
        assert_eq!(plan.bands[0].source_bottom, 1400);
        assert_eq!(plan.bands[1].source_top, 1400);
    }

    fn landscape_a4() -> PageGeometry {
        PageGeometry {
            width_pt: 841.89,
            height_pt: 595.28,
            margin_pt: 40.0,
        }
    }

    #[test]
    fn bands_are_contiguous_and_sum_to_scaled_height() {
        let cases = [
            (PageGeometry::a4(), 1588, 6000),
            (PageGeometry::a4(), 1588, 1),
            (PageGeometry::a4(), 800, 12345),
            (PageGeometry::a4(), 3, 9999),
            (PageGeometry::a4(), 1, 40),
            (landscape_a4(), 1588, 6000),
            (landscape_a4(), 1123, 1),
            (landscape_a4(), 2, 500),
            (landscape_a4(), 7, 3333),
        ];
        for (g, w, h) in cases {
            let plan = band_plan(w, h, &g).unwrap();
            let expected = (plan.scaled_height / g.printable_height() as f64 - PAGE_EPSILON)
                .ceil()
                .max(1.0) as usize;
            assert_eq!(plan.page_count(), expected, "{w}x{h}");
            assert_eq!(plan.bands[0].source_top, 0);
            assert_eq!(plan.bands.last().unwrap().source_bottom, h);
            for pair in plan.bands.windows(2) {
                assert_eq!(pair[0].source_bottom, pair[1].source_top);
            }
            let max_row_pt = plan.scale;
            for band in &plan.bands {
                assert!(band.source_bottom > band.source_top, "{w}x{h}");
                assert!((band.height_pt as f64) < g.printable_height() as f64 + max_row_pt, "{w}x{h}");
            }
            let drawn: f64 = plan.bands.iter().map(|b| b.height_pt as f64).sum();
            let tolerance = 1e-6 * plan.scaled_height + 0.01;
            assert!((drawn - plan.scaled_height).abs() < tolerance, "{w}x{h}");
        }
    }

    #[test]
    fn row_taller_than_page_is_rejected() {
        // 1 px wide in landscape: each row is 761.89 pt, the page holds 515.28 pt.
        assert!(band_plan(1, 10, &landscape_a4()).is_none());

        let mut out = PaginatedOutput::new("t", landscape_a4());
        let err = composite(&mut out, Surface::filled(1, 10, [255; 4]), true, 0, SectionKind::Invoice)
            .unwrap_err();
        assert!(matches!(err, ExportError::Render { .. }), "{err}");
        assert_eq!(out.page_count(), 1);
        assert!(out.sections().is_empty());
        assert!(out.pages()[0].placements.is_empty());
    }

    #[test]
    fn empty_surface_is_noop() {
        let mut out = PaginatedOutput::new("t", geometry());
        let drew = composite(&mut out, Surface::filled(0, 100, [0; 4]), true, 0, SectionKind::Msa).unwrap();
        assert!(!drew);
        assert_eq!(out.page_count(), 1);
        assert!(out.sections().is_empty());
    }

    #[test]
    fn first_surface_uses_initial_page() {
        let mut out = PaginatedOutput::new("t", geometry());
        composite(&mut out, Surface::filled(100, 150, [255; 4]), true, 0, SectionKind::Invoice).unwrap();
        // 150 px × 5 = 750 pt → 2 pages
        assert_eq!(out.page_count(), 2);
        assert_eq!(out.sections()[0].first_page, 0);
        assert_eq!(out.sections()[0].page_count, 2);
        let placement = &out.pages()[0].placements[0];
        assert_eq!((placement.x_pt, placement.y_pt), (50.0, 50.0));
        assert_eq!(placement.width_pt, 500.0);

        composite(&mut out, Surface::filled(100, 10, [255; 4]), false, 0, SectionKind::Msa).unwrap();
        assert_eq!(out.page_count(), 3);
        assert_eq!(out.sections()[1].first_page, 2);
        assert!((out.cursor_y() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn aspect_ratio_is_preserved() {
        let mut out = PaginatedOutput::new("t", geometry());
        composite(&mut out, Surface::filled(400, 200, [255; 4]), true, 0, SectionKind::Invoice).unwrap();
        let p = &out.pages()[0].placements[0];
        let drawn_ratio = p.width_pt / p.height_pt;
        assert!((drawn_ratio - 2.0).abs() < 1e-4);
    }
}
