//! Error types for the pathway-recon library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PathwayError`] — **Fatal**: the reconstruction cannot proceed at all
//!   (bad upload, provider not configured, API failure, Graphviz missing).
//!   Returned as `Err(PathwayError)` from [`crate::reconstruct()`] and the
//!   export functions.
//!
//! * [`DocumentError`] — **Non-fatal**: evidence location failed for one
//!   uploaded document, but the extraction and every other document are fine.
//!   Stored inside [`crate::output::DocumentEvidence`] so the dashboard can
//!   report it next to that document only.
//!
//! Problems in the model's response text are neither: the parser skips what
//! it cannot shape-match and attaches a [`crate::output::ParseDiagnostic`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pathway-recon library.
#[derive(Debug, Error)]
pub enum PathwayError {
    // ── Upload errors ─────────────────────────────────────────────────────
    /// The upload form carried no PDF at all.
    #[error("No PDF files were uploaded. Choose at least one PDF file.")]
    NoDocuments,

    /// An uploaded file had zero bytes.
    #[error("'{filename}' is empty.")]
    EmptyUpload { filename: String },

    /// The file does not start with the `%PDF` magic bytes.
    #[error("'{filename}' is not a PDF file (first bytes: {magic:?}).")]
    NotAPdf { filename: String, magic: Vec<u8> },

    /// The file exceeds the configured upload limit.
    #[error("'{filename}' is {size} bytes; the limit is {limit} bytes.")]
    UploadTooLarge {
        filename: String,
        size: usize,
        limit: usize,
    },

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    // ── Provider errors ───────────────────────────────────────────────────
    /// No API key (or provider) is available.
    #[error("Extraction provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model API returned a non-success status.
    #[error("LLM API error [{status}]: {message}")]
    LlmApiError { status: u16, message: String },

    /// The model API returned HTTP 429.
    #[error("Rate limit exceeded for provider '{provider}'")]
    RateLimitExceeded {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// The model API call timed out.
    #[error("API call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    /// The model API returned an authentication error (401/403).
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// The network request itself failed.
    #[error("Request to '{provider}' failed: {detail}")]
    RequestFailed { provider: String, detail: String },

    /// The model answered but produced no candidate text.
    #[error("The model returned no text{}", finish_reason_suffix(.reason))]
    EmptyResponse { reason: Option<String> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Export errors ─────────────────────────────────────────────────────
    /// Graphviz failed or is not installed.
    #[error("Could not render the pathway graph as {format}: {detail}")]
    ExportFailed { format: String, detail: String },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PathwayError {
    /// True for the upload-error family, whose messages are meant for the user.
    pub fn is_upload_error(&self) -> bool {
        matches!(
            self,
            PathwayError::NoDocuments
                | PathwayError::EmptyUpload { .. }
                | PathwayError::NotAPdf { .. }
                | PathwayError::UploadTooLarge { .. }
                | PathwayError::FileNotFound { .. }
                | PathwayError::PermissionDenied { .. }
        )
    }

    /// True for failures of the external model service.
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            PathwayError::ProviderNotConfigured { .. }
                | PathwayError::LlmApiError { .. }
                | PathwayError::RateLimitExceeded { .. }
                | PathwayError::ApiTimeout { .. }
                | PathwayError::AuthError { .. }
                | PathwayError::RequestFailed { .. }
                | PathwayError::EmptyResponse { .. }
        )
    }
}

fn finish_reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(r) => format!(" (finish reason: {r})"),
        None => String::new(),
    }
}

/// A non-fatal error for a single uploaded document.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// The PDF's text layer could not be read.
    #[error("{filename}: could not read text layer: {detail}")]
    TextLayerUnavailable { filename: String, detail: String },

    /// A single page failed while its words were extracted.
    #[error("{filename}: page {page} could not be read: {detail}")]
    PageUnreadable {
        filename: String,
        page: usize,
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_too_large_display() {
        let e = PathwayError::UploadTooLarge {
            filename: "paper.pdf".into(),
            size: 100,
            limit: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("paper.pdf"), "got: {msg}");
        assert!(msg.contains("limit is 10"), "got: {msg}");
        assert!(e.is_upload_error());
        assert!(!e.is_provider_error());
    }

    #[test]
    fn rate_limit_is_provider_error() {
        let e = PathwayError::RateLimitExceeded {
            provider: "gemini".into(),
            retry_after_secs: Some(30),
        };
        assert!(e.to_string().contains("gemini"));
        assert!(e.is_provider_error());
    }

    #[test]
    fn empty_response_display_with_reason() {
        let e = PathwayError::EmptyResponse {
            reason: Some("SAFETY".into()),
        };
        assert!(e.to_string().contains("finish reason: SAFETY"));

        let e = PathwayError::EmptyResponse { reason: None };
        assert_eq!(e.to_string(), "The model returned no text");
    }

    #[test]
    fn export_failed_display() {
        let e = PathwayError::ExportFailed {
            format: "png".into(),
            detail: "dot not found".into(),
        };
        assert!(e.to_string().contains("as png"));
        assert!(!e.is_upload_error());
    }

    #[test]
    fn document_error_display() {
        let e = DocumentError::PageUnreadable {
            filename: "a.pdf".into(),
            page: 3,
            detail: "bad font".into(),
        };
        assert!(e.to_string().contains("page 3"));
    }
}
