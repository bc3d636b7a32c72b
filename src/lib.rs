//! # softmask-pdf2md
//!
//! Convert PDF documents to Markdown plus PNG images, keeping the
//! transparency of every embedded image.
//!
//! ## Why this crate?
//!
//! A PDF stores a transparent logo as two objects: the color image and a
//! separate grayscale soft mask (`/SMask`) holding per-pixel opacity. Most
//! extractors save only the first, and every logo comes out sitting in a
//! black or white box. This crate follows the `/SMask` reference, scales the
//! mask to the image if needed, and writes the pair as a single RGBA PNG.
//!
//! ## Pipeline Overview
//!
//! ```text
//! resources/*.pdf
//!  │
//!  ├─ 1. Input      discover PDFs, or vet a single path
//!  ├─ 2. Source     page text + image references via lopdf
//!  ├─ 3. Raster     decode JPEG / PNG / raw samples into a color-mode enum
//!  ├─ 4. Composite  base image + soft mask → RGBA PNG
//!  ├─ 5. Extract    per-document dedup, images/page<N>_img<k>.png
//!  └─ 6. Markdown   # name / ## Page N / text / ![Image k](…)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use softmask_pdf2md::{convert_directory, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // resources/*.pdf → resources/extracted/<name>/<name>.md
//!     let batch = convert_directory(&ConversionConfig::default()).await?;
//!     for doc in &batch.converted {
//!         println!("{}: {} image(s)", doc.name, doc.stats.images_extracted);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! softmask-pdf2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, PageSelection, ResampleFilter};
pub use convert::{convert, convert_directory, convert_from_bytes, convert_sync, inspect};
pub use error::{ImageError, Pdf2MdError};
pub use output::{
    BatchOutput, ConversionOutput, ConversionStats, DocumentFailure, DocumentMetadata,
    ExtractedImage, PageResult, SkippedImage,
};
pub use pipeline::composite::{composite, AlphaSource, Composited};
pub use pipeline::raster::{ColorMode, RawImage, Raster};
pub use pipeline::source::{ImageDict, LopdfSource, ObjectRef, PdfSource};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
