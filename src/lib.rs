//! # doc-export – off-screen rendering of business documents into paginated PDFs
//!
//! This crate exports invoices and order forms (with optional MSA and cover
//! page) as multi-page PDFs. The pipeline stages are:
//!
//! 1. **View** – build the presentational views of a document ([`templates`], [`view`], [`richtext`])
//! 2. **Render** – mount each view into an off-screen host, lay it out and rasterize it ([`bridge`], [`host`], [`layout`], [`raster`])
//! 3. **Composite** – scale surfaces to the printable width and slice them into pages ([`compositor`], [`output`])
//! 4. **Finalize** – emit PDF bytes via printpdf and save them ([`render`], [`sink`])
//!
//! [`Exporter`] ties the stages together for single documents and batches.

pub mod assembler;
pub mod bridge;
pub mod compositor;
pub mod config;
pub mod document;
pub mod error;
pub mod fonts;
pub mod host;
pub mod layout;
pub mod notify;
pub mod output;
pub mod raster;
pub mod render;
pub mod richtext;
pub mod sink;
pub mod surface;
pub mod templates;
pub mod view;

// Re-exports for convenience
pub use assembler::{section_plan, ExportReport, ExportState, Exporter};
pub use bridge::{Rasterizer, RendererBridge};
pub use config::{ExportConfig, PageOrientation};
pub use document::{Branding, Customer, Document};
pub use error::{ExportError, Result};
pub use notify::{LogNotifier, NotificationKind, Notifier, RecordingNotifier};
pub use raster::SkiaRasterizer;
pub use sink::{DirectorySink, MemorySink, OutputSink};
pub use surface::Surface;
