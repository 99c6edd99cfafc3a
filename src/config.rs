//! Export configuration.
//!
//! Every field has a default, so a JSON config file only needs the values it
//! changes:
//!
//! ```json
//! { "orientation": "landscape", "throttle_ms": 0 }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};
use crate::output::PageGeometry;

/// Page orientation for the generated PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageOrientation {
    /// Portrait mode: height > width (default).
    #[default]
    Portrait,
    /// Landscape mode: width > height.
    Landscape,
}

/// Configuration for an [`Exporter`](crate::Exporter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Document title embedded in the PDF metadata. Defaults to the file name.
    pub title: Option<String>,
    /// Page width in points (default: A4 = 595.28).
    pub page_width: f32,
    /// Page height in points (default: A4 = 841.89).
    pub page_height: f32,
    /// Page margin in points (default: 40).
    pub page_margin: f32,
    /// Page orientation; swaps effective width/height when `Landscape`.
    pub orientation: PageOrientation,
    /// Width of the off-screen host container in CSS px (default: 794, A4 at 96 dpi).
    pub host_width: f32,
    /// Rasterization upscaling factor (default: 2).
    pub scale: f32,
    /// Delay between mounting a view and rasterizing it.
    pub settle_ms: u64,
    /// Delay between documents of a batch.
    pub throttle_ms: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            title: None,
            page_width: 595.28,
            page_height: 841.89,
            page_margin: 40.0,
            orientation: PageOrientation::Portrait,
            host_width: 794.0,
            scale: 2.0,
            settle_ms: 50,
            throttle_ms: 100,
        }
    }
}

impl ExportConfig {
    /// No settle or throttle delays; handy in tests.
    pub fn immediate() -> Self {
        Self {
            settle_ms: 0,
            throttle_ms: 0,
            ..Self::default()
        }
    }

    /// Load a config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot produce a usable page.
    pub fn validate(&self) -> Result<()> {
        let geometry = self.geometry();
        if geometry.printable_width() <= 0.0 || geometry.printable_height() <= 0.0 {
            return Err(ExportError::Configuration(format!(
                "page margin {} leaves no printable area on a {}x{} pt page",
                self.page_margin,
                self.effective_width(),
                self.effective_height()
            )));
        }
        if self.host_width <= 0.0 || self.scale <= 0.0 {
            return Err(ExportError::Configuration(
                "host_width and scale must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Effective page width after applying orientation.
    pub fn effective_width(&self) -> f32 {
        match self.orientation {
            PageOrientation::Portrait => self.page_width,
            PageOrientation::Landscape => self.page_height,
        }
    }

    /// Effective page height after applying orientation.
    pub fn effective_height(&self) -> f32 {
        match self.orientation {
            PageOrientation::Portrait => self.page_height,
            PageOrientation::Landscape => self.page_width,
        }
    }

    pub fn geometry(&self) -> PageGeometry {
        PageGeometry {
            width_pt: self.effective_width(),
            height_pt: self.effective_height(),
            margin_pt: self.page_margin,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn throttle_delay(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ExportConfig =
            serde_json::from_str(r#"{"orientation": "landscape", "throttle_ms": 0}"#).unwrap();
        assert_eq!(config.orientation, PageOrientation::Landscape);
        assert_eq!(config.throttle_delay(), Duration::ZERO);
        assert_eq!(config.settle_ms, 50);
        assert_eq!(config.scale, 2.0);
        assert_eq!(config.effective_width(), 841.89);
        assert_eq!(config.geometry().height_pt, 595.28);
    }

    #[test]
    fn oversized_margin_is_rejected() {
        let config = ExportConfig {
            page_margin: 400.0,
            ..ExportConfig::default()
        };
        assert!(config.validate().unwrap_err().is_configuration());
        assert!(ExportConfig::default().validate().is_ok());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        std::fs::write(&path, r#"{"title": "Q1 invoices", "scale": 1.5}"#).unwrap();
        let config = ExportConfig::from_file(&path).unwrap();
        assert_eq!(config.title.as_deref(), Some("Q1 invoices"));
        assert_eq!(config.scale, 1.5);
    }
}
