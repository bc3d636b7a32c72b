//! Result types returned by the conversion entry points.
//!
//! Everything here is `Serialize + Deserialize` so the CLI's `--json` mode
//! can print a run summary without a second set of types.

use crate::error::ImageError;
use crate::pipeline::composite::AlphaSource;
use crate::pipeline::raster::ColorMode;
use crate::pipeline::source::ObjectRef;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything produced for one PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Document name: the file stem, used for the output directory and
    /// the Markdown heading.
    pub name: String,
    /// The assembled Markdown, identical to what was written to disk.
    pub markdown: String,
    pub markdown_path: PathBuf,
    pub pages: Vec<PageResult>,
    pub metadata: DocumentMetadata,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Directory holding the Markdown file and its `images/` folder.
    pub fn document_dir(&self) -> Option<&std::path::Path> {
        self.markdown_path.parent()
    }
}

/// Result for one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    pub text: String,
    /// Images written for this page, in encounter order.
    pub images: Vec<ExtractedImage>,
    /// Images that were attempted and failed.
    pub skipped: Vec<SkippedImage>,
}

/// One PNG written to the `images/` folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedImage {
    /// Per-page counter (`k` in `page<N>_img<k>.png`), 1-based.
    pub index: usize,
    /// File name relative to the `images/` folder.
    pub file_name: String,
    pub reference: ObjectRef,
    pub width: u32,
    pub height: u32,
    pub base_mode: ColorMode,
    pub alpha: AlphaSource,
}

impl ExtractedImage {
    /// Path relative to the Markdown file, as used in the image link.
    pub fn link(&self) -> String {
        format!("images/{}", self.file_name)
    }
}

/// An image that could not be extracted. It has no file and no Markdown
/// reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedImage {
    pub page: usize,
    pub reference: ObjectRef,
    pub error: ImageError,
}

/// Counters for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages selected and walked.
    pub processed_pages: usize,
    pub images_extracted: usize,
    pub images_skipped: usize,
    /// References already written earlier in the document.
    pub duplicate_references: usize,
    pub soft_masks_applied: usize,
    /// Masks referenced but unusable; the image kept its own alpha.
    pub mask_fallbacks: usize,
    pub total_duration_ms: u64,
}

/// Document-level facts, available without converting anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
    pub is_encrypted: bool,
    /// Distinct image XObjects reachable from the pages.
    pub image_count: usize,
    /// Distinct soft masks referenced by those images.
    pub soft_mask_count: usize,
}

/// Result of a directory run.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BatchOutput {
    pub converted: Vec<ConversionOutput>,
    pub failed: Vec<DocumentFailure>,
}

impl BatchOutput {
    pub fn images_extracted(&self) -> usize {
        self.converted.iter().map(|o| o.stats.images_extracted).sum()
    }

    pub fn images_skipped(&self) -> usize {
        self.converted.iter().map(|o| o.stats.images_skipped).sum()
    }
}

/// A document that could not be converted at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub path: PathBuf,
    /// Display form of the fatal [`crate::Pdf2MdError`].
    pub error: String,
}
