//! PDF writer – takes a [`PaginatedOutput`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API). Every placement is embedded as an image
//! XObject.

use printpdf::*;

use crate::error::{ExportError, Result};
use crate::output::{PaginatedOutput, Placement};

/// Render a paginated output into PDF bytes.
pub fn render_pdf(output: &PaginatedOutput) -> Result<Vec<u8>> {
    let geometry = output.geometry();
    let page_w = Mm(geometry.width_pt * 0.352778); // pt → mm
    let page_h = Mm(geometry.height_pt * 0.352778);

    let mut doc = PdfDocument::new(output.title());
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();

    let mut pages = Vec::with_capacity(output.page_count());
    for (page_index, page) in output.pages().iter().enumerate() {
        let mut ops = Vec::with_capacity(page.placements.len());
        for placement in &page.placements {
            let raw = RawImage::decode_from_bytes(&placement.png, &mut warnings).map_err(|e| {
                ExportError::Pdf(format!("page {}: cannot embed band: {e}", page_index + 1))
            })?;
            let xobj_id = doc.add_image(&raw);
            ops.push(place_op(xobj_id, placement, geometry.height_pt));
        }
        pages.push(PdfPage::new(page_w, page_h, ops));
    }

    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
    for w in &warnings {
        log::debug!("printpdf: {w:?}");
    }
    Ok(bytes)
}

fn place_op(id: XObjectId, placement: &Placement, page_height: f32) -> Op {
    // PDF origin is bottom-left; placements are measured from the top-left.
    let bottom_y = page_height - placement.y_pt - placement.height_pt;

    // At dpi=72 printpdf renders 1 px = 1 pt, so scale = desired_pt / px_dim.
    let scale_x = if placement.px_width > 0 {
        placement.width_pt / placement.px_width as f32
    } else {
        1.0
    };
    let scale_y = if placement.px_height > 0 {
        placement.height_pt / placement.px_height as f32
    } else {
        1.0
    };

    Op::UseXobject {
        id,
        transform: XObjectTransform {
            translate_x: Some(Pt(placement.x_pt)),
            translate_y: Some(Pt(bottom_y)),
            dpi: Some(72.0),
            scale_x: Some(scale_x),
            scale_y: Some(scale_y),
            rotate: None,
        },
    }
}
