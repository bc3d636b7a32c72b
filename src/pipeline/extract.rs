//! The page loop: walk a document's pages, composite every image once and
//! write it to `images/`.
//!
//! ## Ordering rules
//!
//! * One processed-reference set per document. An image shown on several
//!   pages is written once, on the first page it appears.
//! * The per-page counter `k` in `page<N>_img<k>.png` advances only when a
//!   PNG has actually been written, so numbering has no gaps.
//! * A soft mask that was applied is marked processed too, which stops PDFs
//!   that also list their masks as page images from emitting them twice.
//! * A failed image is logged, recorded as a [`SkippedImage`] and never
//!   marked processed.
//!
//! Because of these rules images inside a document are processed strictly
//! in order; parallelism happens across documents.

use crate::config::{ConversionConfig, ResampleFilter};
use crate::error::{ImageError, Pdf2MdError};
use crate::output::{ConversionStats, ExtractedImage, PageResult, SkippedImage};
use crate::pipeline::composite::{self, AlphaSource, Composited};
use crate::pipeline::source::{ObjectRef, PdfSource};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Name of the image folder next to each Markdown file.
pub const IMAGES_DIR: &str = "images";

/// A composited image together with the mask that was consulted for it.
#[derive(Debug, Clone)]
pub struct MaskedImage {
    pub composited: Composited,
    /// The `/SMask` reference from the image dictionary, if any.
    pub soft_mask: Option<ObjectRef>,
}

/// Pages walked for one document.
#[derive(Debug, Clone, Default)]
pub struct DocumentOutput {
    pub pages: Vec<PageResult>,
    pub stats: ConversionStats,
}

/// Fetch an image, resolve its soft mask and composite the two.
///
/// # Errors
/// [`ImageError::Source`] when the image object cannot be read, otherwise
/// whatever [`composite::composite`] returns. Mask failures never surface
/// here.
pub fn extract_image_with_mask<S: PdfSource + ?Sized>(
    source: &S,
    id: ObjectRef,
    filter: ResampleFilter,
) -> Result<MaskedImage, ImageError> {
    let source_err = |e: crate::pipeline::source::SourceError| ImageError::Source {
        detail: e.to_string(),
    };

    let dict = source.object_dict(id).map_err(source_err)?;
    let base = source.extract_raw_image(id).map_err(source_err)?;

    let soft_mask = dict.soft_mask;
    let composited = composite::composite(
        &base,
        || {
            soft_mask.map(|mask| {
                debug!("Image {} has soft mask {}", id, mask);
                source
                    .extract_raw_image(mask)
                    .map_err(|e| ImageError::MaskResolution {
                        mask,
                        reason: e.to_string(),
                    })
            })
        },
        filter,
    )?;

    Ok(MaskedImage {
        composited,
        soft_mask,
    })
}

/// Walk `page_numbers` of `source`, writing images under
/// `<doc_dir>/images/`.
///
/// # Errors
/// Only [`Pdf2MdError::OutputWriteFailed`] when the output directories
/// cannot be created. Everything per page or per image is recorded in the
/// returned [`DocumentOutput`] instead.
pub fn extract_document<S: PdfSource + ?Sized>(
    source: &S,
    name: &str,
    doc_dir: &Path,
    page_numbers: &[usize],
    config: &ConversionConfig,
) -> Result<DocumentOutput, Pdf2MdError> {
    let images_dir = doc_dir.join(IMAGES_DIR);
    std::fs::create_dir_all(&images_dir).map_err(|e| Pdf2MdError::OutputWriteFailed {
        path: images_dir.clone(),
        source: e,
    })?;

    let total = page_numbers.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_document_start(name, total);
    }

    let mut stats = ConversionStats {
        total_pages: source.page_count(),
        ..Default::default()
    };
    let mut processed: HashSet<ObjectRef> = HashSet::new();
    let mut pages = Vec::with_capacity(total);

    for &page_num in page_numbers {
        info!("{}: page {}/{}", name, page_num, stats.total_pages);

        let text = source.page_text(page_num).unwrap_or_else(|e| {
            warn!("{}: no text for page {}: {}", name, page_num, e);
            String::new()
        });
        let refs = source.list_images(page_num).unwrap_or_else(|e| {
            warn!("{}: could not list images on page {}: {}", name, page_num, e);
            Vec::new()
        });

        let mut page = PageResult {
            page_num,
            text,
            ..Default::default()
        };

        for id in refs {
            if processed.contains(&id) {
                debug!("Page {}: {} already extracted", page_num, id);
                stats.duplicate_references += 1;
                continue;
            }

            let k = page.images.len() + 1;
            let file_name = format!("page{page_num}_img{k}.png");
            let result = extract_image_with_mask(source, id, config.resample_filter)
                .and_then(|img| write_png(&images_dir.join(&file_name), img));

            match result {
                Ok(img) => {
                    processed.insert(id);
                    let c = img.composited;
                    match &c.alpha {
                        AlphaSource::SoftMask { .. } => {
                            stats.soft_masks_applied += 1;
                            processed.extend(img.soft_mask);
                        }
                        AlphaSource::Fallback { .. } => stats.mask_fallbacks += 1,
                        AlphaSource::Base => {}
                    }
                    debug!("Page {}: wrote {} from {}", page_num, file_name, id);
                    page.images.push(ExtractedImage {
                        index: k,
                        file_name,
                        reference: id,
                        width: c.width,
                        height: c.height,
                        base_mode: c.base_mode,
                        alpha: c.alpha,
                    });
                }
                Err(error) => {
                    warn!(
                        "{}: could not extract image {} on page {}: {}",
                        name, id, page_num, error
                    );
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_image_error(name, page_num, &error.to_string());
                    }
                    page.skipped.push(SkippedImage {
                        page: page_num,
                        reference: id,
                        error,
                    });
                }
            }
        }

        stats.processed_pages += 1;
        stats.images_extracted += page.images.len();
        stats.images_skipped += page.skipped.len();
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_complete(name, page_num, total, page.images.len());
        }
        pages.push(page);
    }

    Ok(DocumentOutput { pages, stats })
}

fn write_png(path: &Path, img: MaskedImage) -> Result<MaskedImage, ImageError> {
    std::fs::write(path, &img.composited.png).map_err(|e| ImageError::Write {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    Ok(img)
}
