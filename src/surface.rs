//! Rendered bitmap surfaces.

use std::fmt;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::error::{ExportError, Result};

/// An RGBA bitmap produced by rasterizing a view.
///
/// A surface is moved into the compositor, which consumes it; it is never
/// drawn twice.
#[derive(Clone, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    /// Row-major, 4 bytes per pixel, straight alpha.
    pixels: Vec<u8>,
}

impl Surface {
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(ExportError::Encode(format!(
                "surface {width}x{height} needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A surface of one solid colour.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// True when there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGBA of one pixel, if in bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    /// Encode source rows `top..bottom` as a PNG for embedding.
    pub fn encode_band_png(&self, top: u32, bottom: u32) -> Result<Vec<u8>> {
        if top >= bottom || bottom > self.height {
            return Err(ExportError::Encode(format!(
                "band rows {top}..{bottom} outside surface of height {}",
                self.height
            )));
        }
        let row_bytes = self.width as usize * 4;
        let band = &self.pixels[top as usize * row_bytes..bottom as usize * row_bytes];

        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(band, self.width, bottom - top, ExtendedColorType::Rgba8)
            .map_err(|e| ExportError::Encode(e.to_string()))?;
        Ok(png)
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}
