//! Default rasterizer – lays a mounted view out with Taffy and paints it into
//! a `tiny-skia` pixmap.
//!
//! Text is drawn from real glyph outlines when the font manager has a face
//! loaded. Without one, each word is greeked as a filled bar of the measured
//! width.

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, Transform};

use crate::bridge::Rasterizer;
use crate::error::{ExportError, Result};
use crate::fonts::FontManager;
use crate::host::MountGuard;
use crate::layout::{align_offset, layout_view, BoxContent, LaidOutView, PositionedBox};
use crate::surface::Surface;
use crate::view::{Color, TextStyle};

pub struct SkiaRasterizer {
    fonts: FontManager,
}

impl SkiaRasterizer {
    pub fn new(fonts: FontManager) -> Self {
        Self { fonts }
    }

    pub fn fonts(&self) -> &FontManager {
        &self.fonts
    }

    /// Paint an already laid-out view at `scale`.
    pub fn paint(&self, laid: &LaidOutView, scale: f32) -> Result<Surface> {
        let px_width = (laid.width * scale).ceil() as u32;
        let px_height = (laid.height * scale).ceil() as u32;
        if px_width == 0 || px_height == 0 {
            log::warn!("{} view has no visible area", laid.section);
            return Ok(Surface::filled(px_width, px_height, [255; 4]));
        }

        let mut pixmap = Pixmap::new(px_width, px_height).ok_or_else(|| {
            ExportError::render(
                laid.section.to_string(),
                format!("cannot allocate {px_width}x{px_height} pixmap"),
            )
        })?;
        pixmap.fill(tiny_skia::Color::WHITE);

        let transform = Transform::from_scale(scale, scale);
        self.paint_box(&mut pixmap, &laid.root, transform);

        let pixels = pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        Surface::from_rgba(px_width, px_height, pixels)
    }

    fn paint_box(&self, pixmap: &mut Pixmap, b: &PositionedBox, transform: Transform) {
        if let Some(bg) = b.background {
            if let Some(rect) = Rect::from_xywh(b.x, b.y, b.width, b.height) {
                pixmap.fill_rect(rect, &paint_for(bg), transform, None);
            }
        }
        if let Some((width, color)) = b.border {
            let inset = width / 2.0;
            if let Some(rect) =
                Rect::from_xywh(b.x + inset, b.y + inset, b.width - width, b.height - width)
            {
                let path = PathBuilder::from_rect(rect);
                let stroke = Stroke {
                    width,
                    ..Stroke::default()
                };
                pixmap.stroke_path(&path, &paint_for(color), &stroke, transform, None);
            }
        }

        match &b.content {
            BoxContent::None => {}
            BoxContent::Text { lines, style } => self.paint_text(pixmap, b, lines, style, transform),
            BoxContent::Rule { color } => {
                if let Some(rect) = Rect::from_xywh(b.x, b.y, b.width, b.height.max(0.5)) {
                    pixmap.fill_rect(rect, &paint_for(*color), transform, None);
                }
            }
            BoxContent::Image { src } => {
                if let Err(e) = paint_image(pixmap, b, src, transform) {
                    log::warn!("Skipping image — {e}");
                }
            }
        }

        for child in &b.children {
            self.paint_box(pixmap, child, transform);
        }
    }

    fn paint_text(
        &self,
        pixmap: &mut Pixmap,
        b: &PositionedBox,
        lines: &[String],
        style: &TextStyle,
        transform: Transform,
    ) {
        let paint = paint_for(style.color);
        let line_px = style.font_size * style.line_height;
        let ascender = self.fonts.ascender_px(style.font_size, style.bold, style.italic);
        // Half-leading above the glyphs, as browsers do.
        let leading = (line_px - style.font_size) / 2.0;

        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let width = self
                .fonts
                .measure_text_width(line, style.font_size, style.bold, style.italic);
            let x = b.x + align_offset(style.align, b.width, width);
            let top = b.y + i as f32 * line_px + leading;
            let baseline = top + ascender;

            let mut outline = SkiaOutline(PathBuilder::new());
            let drawn = self.fonts.outline_text(
                line,
                style.font_size,
                style.bold,
                style.italic,
                x,
                baseline,
                &mut outline,
            );
            let path = if drawn {
                outline.0.finish()
            } else {
                self.greek_line(line, style, x, top)
            };
            if let Some(path) = path {
                pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
            }
        }
    }

    /// One bar per word at x-height, spaced by measured widths.
    fn greek_line(&self, line: &str, style: &TextStyle, x: f32, top: f32) -> Option<tiny_skia::Path> {
        let size = style.font_size;
        let space = self.fonts.measure_text_width(" ", size, style.bold, style.italic);
        let bar_top = top + size * 0.35;
        let bar_height = size * 0.5;

        let mut pb = PathBuilder::new();
        let mut pen = x;
        for word in line.split(' ') {
            let w = self.fonts.measure_text_width(word, size, style.bold, style.italic);
            if let Some(rect) = Rect::from_xywh(pen, bar_top, w, bar_height) {
                pb.push_rect(rect);
            }
            pen += w + space;
        }
        pb.finish()
    }
}

impl Rasterizer for SkiaRasterizer {
    async fn rasterize(&self, mounted: &MountGuard<'_>, scale: f32) -> Result<Surface> {
        let laid = layout_view(mounted.view(), mounted.width(), &self.fonts)?;
        log::debug!(
            "Laid out {} in {}: {:.0}x{:.0} px, {} lines",
            laid.section,
            mounted.host_id(),
            laid.width,
            laid.height,
            laid.line_count()
        );
        self.paint(&laid, scale)
    }
}

/// Adapts glyph outlines to a tiny-skia path.
struct SkiaOutline(PathBuilder);

impl ttf_parser::OutlineBuilder for SkiaOutline {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.0.close();
    }
}

fn paint_for(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(
        channel(color.r),
        channel(color.g),
        channel(color.b),
        channel(color.a),
    );
    paint.anti_alias = true;
    paint
}

fn channel(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Draw a data-URI image scaled to fit its box, keeping its aspect ratio.
fn paint_image(pixmap: &mut Pixmap, b: &PositionedBox, src: &str, transform: Transform) -> Result<()> {
    let bytes = parse_data_uri(src)?;
    let img = ::image::load_from_memory(&bytes)
        .map_err(|e| ExportError::Encode(format!("decode error: {e}")))?
        .to_rgba8();
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Ok(());
    }

    // tiny-skia pixmaps hold premultiplied colour.
    let mut data = img.into_raw();
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        for c in &mut px[..3] {
            *c = ((*c as u16 * a + 127) / 255) as u8;
        }
    }
    let size = tiny_skia::IntSize::from_wh(w, h)
        .ok_or_else(|| ExportError::Encode("invalid image size".to_string()))?;
    let image = Pixmap::from_vec(data, size)
        .ok_or_else(|| ExportError::Encode("invalid image buffer".to_string()))?;

    let fit = (b.width / w as f32).min(b.height / h as f32);
    let placed = transform
        .pre_translate(b.x, b.y)
        .pre_scale(fit, fit);
    pixmap.draw_pixmap(0, 0, image.as_ref(), &PixmapPaint::default(), placed, None);
    Ok(())
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
pub fn parse_data_uri(src: &str) -> Result<Vec<u8>> {
    let rest = src.strip_prefix("data:").ok_or_else(|| {
        let preview: String = src.chars().take(80).collect();
        ExportError::Encode(format!(
            "image src must be a base64 data URI (e.g. `data:image/png;base64,...`), got {preview:?}"
        ))
    })?;
    let comma_pos = rest.find(',').ok_or_else(|| {
        ExportError::Encode("invalid data URI: missing `,` separator between header and data".to_string())
    })?;
    let header = &rest[..comma_pos];
    if !header.contains(";base64") {
        return Err(ExportError::Encode(
            "only base64-encoded data URIs are supported".to_string(),
        ));
    }
    BASE64_STD
        .decode(rest[comma_pos + 1..].trim())
        .map_err(|e| ExportError::Encode(format!("base64 decode error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostEnvironment;
    use crate::view::{Block, BoxStyle, SectionKind, View};
    use sha2::{Digest, Sha256};

    fn png_data_uri(w: u32, h: u32) -> String {
        let img = ::image::RgbaImage::from_pixel(w, h, ::image::Rgba([0, 0, 255, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), ::image::ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", BASE64_STD.encode(bytes))
    }

    fn sample_view() -> View {
        View::new(
            SectionKind::Invoice,
            Block::styled_column(
                BoxStyle {
                    padding: 20.0,
                    background: Some(Color::GRAY_100),
                    ..BoxStyle::default()
                },
                vec![
                    Block::text("Invoice INV-001", TextStyle::default().size(24.0).bold()),
                    Block::rule(),
                    Block::text("Web Development", TextStyle::default()),
                ],
            ),
        )
    }

    #[tokio::test]
    async fn rasterizes_at_upscaling_factor() {
        let hosts = HostEnvironment::new();
        let host = hosts.create_container(400.0);
        let view = sample_view();
        let mounted = hosts.mount(host.id(), &view).unwrap();
        let surface = SkiaRasterizer::new(FontManager::new())
            .rasterize(&mounted, 2.0)
            .await
            .unwrap();
        assert_eq!(surface.width(), 800);
        assert!(surface.height() > 100);
        // Padding area is the background colour, not white.
        assert_ne!(surface.pixel(4, 4), Some([255, 255, 255, 255]));
    }

    #[tokio::test]
    async fn rasterization_is_deterministic() {
        let hosts = HostEnvironment::new();
        let host = hosts.create_container(400.0);
        let view = sample_view();
        let rasterizer = SkiaRasterizer::new(FontManager::new());

        let mut digests = Vec::new();
        for _ in 0..2 {
            let mounted = hosts.mount(host.id(), &view).unwrap();
            let surface = rasterizer.rasterize(&mounted, 2.0).await.unwrap();
            digests.push(Sha256::digest(surface.pixels()));
        }
        assert_eq!(digests[0], digests[1]);
    }

    #[test]
    fn greeked_text_leaves_ink() {
        let fonts = FontManager::new();
        let view = View::new(
            SectionKind::Msa,
            Block::column(vec![Block::text("Hello world", TextStyle::default())]),
        );
        let laid = layout_view(&view, 200.0, &fonts).unwrap();
        let surface = SkiaRasterizer::new(fonts).paint(&laid, 1.0).unwrap();
        let inked = surface
            .pixels()
            .chunks_exact(4)
            .filter(|p| p[0] < 128)
            .count();
        assert!(inked > 50, "expected greeked glyph bars, got {inked} dark pixels");
    }

    #[test]
    fn images_are_drawn_and_bad_images_skipped() {
        let fonts = FontManager::new();
        let view = View::new(
            SectionKind::CoverPage,
            Block::column(vec![
                Block::Image {
                    src: png_data_uri(10, 10),
                    width: 40.0,
                    height: 40.0,
                },
                Block::Image {
                    src: "https://example.com/logo.png".to_string(),
                    width: 40.0,
                    height: 40.0,
                },
            ]),
        );
        let laid = layout_view(&view, 100.0, &fonts).unwrap();
        let surface = SkiaRasterizer::new(fonts).paint(&laid, 1.0).unwrap();
        assert_eq!(surface.pixel(20, 20), Some([0, 0, 255, 255]));
        assert_eq!(surface.pixel(20, 60), Some([255, 255, 255, 255]));
    }

    #[test]
    fn data_uri_parsing() {
        assert!(parse_data_uri("data:image/png;base64,aGk=").is_ok());
        assert!(parse_data_uri("data:image/png,raw").is_err());
        assert!(parse_data_uri("logo.png").is_err());
    }
}
