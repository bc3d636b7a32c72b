//! Error types for the softmask-pdf2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2MdError`] — **Fatal** for one document (or for the whole run when
//!   the input directory is empty or unreadable). Returned as
//!   `Err(Pdf2MdError)` from the top-level `convert*` functions.
//!
//! * [`ImageError`] — **Non-fatal**: a single embedded image could not be
//!   decoded, its soft mask was unusable, or its PNG could not be written.
//!   Stored inside [`crate::output::PageResult`] so callers can see exactly
//!   which images were skipped while every other image and page survives.
//!
//! Soft-mask failures are a special case of the second kind: the compositor
//! catches [`ImageError::MaskResolution`] itself and falls back to the
//! image's own transparency, so it never reaches the page loop as a skip.

use crate::pipeline::source::ObjectRef;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the softmask-pdf2md library.
///
/// Image-level failures use [`ImageError`] and are stored in
/// [`crate::output::PageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Pdf2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The input directory holds no `*.pdf` files.
    #[error("No PDF files found in '{dir}'")]
    NoInputFiles { dir: PathBuf },

    /// The input directory is missing or cannot be listed.
    #[error("Cannot read input directory '{dir}': {source}")]
    InputDirUnreadable {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and the document cannot be opened.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the output directory or write the Markdown file.
    #[error("Failed to write output '{path}': {source}")]
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

/// A non-fatal error for a single embedded image.
///
/// The page loop logs it with the page number, records it next to the
/// page's [`crate::output::PageResult`] and moves on to the next image.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageError {
    /// The image bytes are not a raster format we can decode.
    #[error("image decode failed: {reason}")]
    Decode { reason: String },

    /// A soft mask is referenced but could not be fetched or decoded.
    #[error("soft mask {mask} unusable: {reason}")]
    MaskResolution { mask: ObjectRef, reason: String },

    /// The PDF layer could not hand out the image object.
    #[error("image object unavailable: {detail}")]
    Source { detail: String },

    /// PNG encoding of the composited image failed.
    #[error("PNG encoding failed: {detail}")]
    Encode { detail: String },

    /// The PNG could not be written to disk.
    #[error("failed to write '{path}': {detail}")]
    Write { path: PathBuf, detail: String },
}

impl ImageError {
    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        ImageError::Decode {
            reason: reason.into(),
        }
    }
}

impl From<image::ImageError> for ImageError {
    fn from(e: image::ImageError) -> Self {
        ImageError::decode(e.to_string())
    }
}
