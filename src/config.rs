//! Configuration types for PDF-to-Markdown extraction.
//!
//! All extraction behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across worker threads and to log exactly what
//! a run was asked to do.
//!
//! # Design choice: builder over constructor
//! Callers set only what they care about and rely on the documented defaults
//! for the rest; `build()` is the single place where combinations are
//! validated.

use crate::error::Pdf2MdError;
use crate::progress::ProgressCallback;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default directory scanned for `*.pdf` files.
pub const DEFAULT_INPUT_DIR: &str = "resources";
/// Default directory receiving one sub-directory per converted PDF.
pub const DEFAULT_OUTPUT_DIR: &str = "resources/extracted";

/// Configuration for a PDF-to-Markdown extraction run.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use softmask_pdf2md::{ConversionConfig, ResampleFilter};
///
/// let config = ConversionConfig::builder()
///     .input_dir("pdfs")
///     .output_dir("out")
///     .resample_filter(ResampleFilter::CatmullRom)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Directory scanned (non-recursively) by
    /// [`crate::convert::convert_directory`]. Default: `resources`.
    pub input_dir: PathBuf,

    /// Root of the output tree. Each document gets
    /// `<output_dir>/<name>/<name>.md` plus an `images/` folder.
    /// Default: `resources/extracted`.
    pub output_dir: PathBuf,

    /// Number of documents converted at the same time. Default: 4.
    ///
    /// Each document runs on its own blocking thread with no shared state,
    /// so this only bounds CPU and memory use. Images inside one document
    /// are always processed in order because file names depend on it.
    pub concurrency: usize,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// Filter used when a soft mask must be scaled to its image's size.
    /// Default: [`ResampleFilter::Lanczos3`].
    pub resample_filter: ResampleFilter,

    /// Optional per-document / per-page event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            concurrency: 4,
            pages: PageSelection::default(),
            resample_filter: ResampleFilter::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("concurrency", &self.concurrency)
            .field("pages", &self.pages)
            .field("resample_filter", &self.resample_filter)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.input_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn resample_filter(mut self, filter: ResampleFilter) -> Self {
        self.config.resample_filter = filter;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2MdError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(Pdf2MdError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.output_dir.as_os_str().is_empty() {
            return Err(Pdf2MdError::InvalidConfig(
                "Output directory must not be empty".into(),
            ));
        }
        match c.pages {
            PageSelection::Single(0) => {
                return Err(Pdf2MdError::InvalidConfig(
                    "Pages are 1-indexed, minimum is 1".into(),
                ))
            }
            PageSelection::Range(start, end) if start == 0 || start > end => {
                return Err(Pdf2MdError::InvalidConfig(format!(
                    "Invalid page range {start}-{end}"
                )))
            }
            _ => {}
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the PDF to convert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert a single page (1-indexed).
    Single(usize),
    /// Convert a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Convert specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 1-indexed
    /// page numbers that exist in a document of `total_pages` pages.
    pub fn to_page_numbers(&self, total_pages: usize) -> Vec<usize> {
        let mut pages: Vec<usize> = match self {
            PageSelection::All => (1..=total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![*p]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => ((*start).max(1)..=(*end).min(total_pages)).collect(),
            PageSelection::Set(pages) => pages
                .iter()
                .copied()
                .filter(|&p| p >= 1 && p <= total_pages)
                .collect(),
        };
        pages.sort_unstable();
        pages.dedup();
        pages
    }
}

/// Resampling filter for soft masks whose size differs from their image.
///
/// Lanczos3 is the default. Triangle (bilinear) and Nearest are fallbacks for
/// speed; they visibly soften or stair-step anti-aliased mask edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResampleFilter {
    #[default]
    Lanczos3,
    CatmullRom,
    Gaussian,
    Triangle,
    Nearest,
}

impl From<ResampleFilter> for FilterType {
    fn from(f: ResampleFilter) -> Self {
        match f {
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Gaussian => FilterType::Gaussian,
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::Nearest => FilterType::Nearest,
        }
    }
}
