//! Error types for the export pipeline.

use std::io;
use thiserror::Error;

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Everything that can go wrong while exporting documents.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The off-screen host container is missing. This is a caller bug, not a
    /// content problem.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Mounting or rasterizing a view failed.
    #[error("Rendering {section} failed: {message}")]
    Render { section: String, message: String },

    /// A failure attributed to one document of an export.
    #[error("{document}: {source}")]
    Document {
        document: String,
        #[source]
        source: Box<ExportError>,
    },

    /// A band could not be encoded for embedding.
    #[error("Image encoding error: {0}")]
    Encode(String),

    /// The PDF writer rejected the output.
    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Font error: {0}")]
    Font(String),

    /// Batch documents and customers are not index-aligned.
    #[error("Batch has {documents} documents but {customers} customer entries")]
    BatchMismatch { documents: usize, customers: usize },

    #[error("Nothing to export: the batch is empty")]
    EmptyBatch,

    /// Another export is still running on this exporter.
    #[error("An export is already in progress")]
    Busy,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExportError {
    pub fn render(section: impl Into<String>, message: impl Into<String>) -> Self {
        ExportError::Render {
            section: section.into(),
            message: message.into(),
        }
    }

    /// Attribute this error to a document label such as `Invoice INV-001`.
    pub fn for_document(self, document: impl Into<String>) -> Self {
        ExportError::Document {
            document: document.into(),
            source: Box::new(self),
        }
    }

    /// True for errors that indicate a programming mistake rather than bad
    /// content.
    pub fn is_configuration(&self) -> bool {
        match self {
            ExportError::Configuration(_) => true,
            ExportError::Document { source, .. } => source.is_configuration(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_errors_keep_their_kind() {
        let err = ExportError::Configuration("host `h1` not found".into()).for_document("Invoice INV-1");
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "Invoice INV-1: Configuration error: host `h1` not found"
        );

        let err = ExportError::render("cover page", "boom").for_document("OrderForm OF-1");
        assert!(!err.is_configuration());
    }
}
