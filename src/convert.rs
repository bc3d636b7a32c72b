//! Conversion entry points.
//!
//! ## Why spawn_blocking?
//!
//! Parsing a PDF, inflating its streams and resampling masks is all CPU
//! work with no await points. Each document therefore runs start to finish
//! on a blocking thread, and [`convert_directory`] keeps up to
//! `config.concurrency` of those in flight with `buffer_unordered`.
//! Documents share nothing, so one that fails (or panics) only costs its own
//! entry in [`BatchOutput::failed`].

use crate::config::{ConversionConfig, PageSelection};
use crate::error::Pdf2MdError;
use crate::output::{BatchOutput, ConversionOutput, DocumentFailure, DocumentMetadata};
use crate::pipeline::extract::extract_document;
use crate::pipeline::input::{self, document_name};
use crate::pipeline::markdown::render_document;
use crate::pipeline::source::{LopdfSource, PdfSource};
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};

/// Convert every `*.pdf` in `config.input_dir` into `config.output_dir`.
///
/// # Returns
/// `Ok(BatchOutput)` once every document has been attempted, even if some
/// failed (check `output.failed`). Converted documents are ordered by path.
///
/// # Errors
/// - [`Pdf2MdError::InputDirUnreadable`] if the directory cannot be listed
/// - [`Pdf2MdError::NoInputFiles`] if it holds no PDFs
pub async fn convert_directory(config: &ConversionConfig) -> Result<BatchOutput, Pdf2MdError> {
    let pdfs = input::discover_pdfs(&config.input_dir)?;
    if pdfs.is_empty() {
        return Err(Pdf2MdError::NoInputFiles {
            dir: config.input_dir.clone(),
        });
    }

    info!(
        "Found {} PDF file(s) in {}",
        pdfs.len(),
        config.input_dir.display()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(pdfs.len());
    }

    let mut results: Vec<(PathBuf, Result<ConversionOutput, Pdf2MdError>)> =
        stream::iter(pdfs.into_iter().map(|path| {
            let config = config.clone();
            async move {
                let worker_path = path.clone();
                let result = run_blocking(move || convert_local(&worker_path, &config)).await;
                (path, result)
            }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;
    results.sort_by(|a, b| a.0.cmp(&b.0));

    let mut batch = BatchOutput::default();
    for (path, result) in results {
        match result {
            Ok(output) => batch.converted.push(output),
            Err(e) => batch.failed.push(DocumentFailure {
                path,
                error: e.to_string(),
            }),
        }
    }

    info!(
        "Done: {} converted, {} failed, {} image(s) written",
        batch.converted.len(),
        batch.failed.len(),
        batch.images_extracted()
    );
    Ok(batch)
}

/// Convert one PDF file into `config.output_dir`.
///
/// # Arguments
/// * `path` — Local PDF file
/// * `config` — Conversion configuration
///
/// # Returns
/// `Ok(ConversionOutput)` on success, even if some images were skipped
/// (check `output.stats.images_skipped`).
///
/// # Errors
/// Returns `Err(Pdf2MdError)` only for fatal errors:
/// - File not found / permission denied
/// - Not a valid PDF, or one that cannot be opened
/// - Output directory or Markdown file cannot be written
pub async fn convert(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    let path = path.as_ref().to_path_buf();
    info!("Starting conversion: {}", path.display());
    let config = config.clone();

    run_blocking(move || convert_local(&path, &config)).await
}

/// Convert PDF bytes held in memory.
///
/// `name` becomes the output directory and Markdown file name, exactly as a
/// file stem would.
///
/// # Example
/// ```rust,no_run
/// use softmask_pdf2md::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("brochure.pdf")?;
/// let output = convert_from_bytes(&bytes, "brochure", &ConversionConfig::default()).await?;
/// println!("{}", output.markdown);
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: &[u8],
    name: &str,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    let bytes = bytes.to_vec();
    let name = name.to_string();
    let config = config.clone();

    run_blocking(move || {
        let result = LopdfSource::from_bytes(&bytes, &name)
            .and_then(|source| convert_source(&source, &name, source.metadata(), &config));
        report_failure(&name, &config, result)
    })
    .await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(path, config))
}

/// Read document metadata and image / soft-mask counts without writing
/// anything.
pub async fn inspect(path: impl AsRef<Path>) -> Result<DocumentMetadata, Pdf2MdError> {
    let path = path.as_ref().to_path_buf();
    run_blocking(move || {
        input::resolve_local(&path)
            .and_then(|path| LopdfSource::open(&path))
            .map(|source| source.metadata())
    })
    .await
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run_blocking<T, F>(f: F) -> Result<T, Pdf2MdError>
where
    F: FnOnce() -> Result<T, Pdf2MdError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Pdf2MdError::Internal(format!("conversion worker failed: {e}")))?
}

/// Blocking: validate, open and convert one local file.
fn convert_local(path: &Path, config: &ConversionConfig) -> Result<ConversionOutput, Pdf2MdError> {
    let name = document_name(path);
    let result = input::resolve_local(path)
        .and_then(|path| LopdfSource::open(&path))
        .and_then(|source| convert_source(&source, &name, source.metadata(), config));
    report_failure(&name, config, result)
}

fn report_failure(
    name: &str,
    config: &ConversionConfig,
    result: Result<ConversionOutput, Pdf2MdError>,
) -> Result<ConversionOutput, Pdf2MdError> {
    if let Err(ref e) = result {
        error!("{}: {}", name, e);
        if let Some(ref cb) = config.progress_callback {
            cb.on_document_error(name, &e.to_string());
        }
    }
    result
}

/// Blocking: walk the pages, assemble the Markdown and write it.
fn convert_source<S: PdfSource + ?Sized>(
    source: &S,
    name: &str,
    metadata: DocumentMetadata,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    let start = Instant::now();
    let total_pages = source.page_count();

    let page_numbers = config.pages.to_page_numbers(total_pages);
    if page_numbers.is_empty() && config.pages != PageSelection::All {
        return Err(Pdf2MdError::PageOutOfRange {
            page: first_requested(&config.pages),
            total: total_pages,
        });
    }
    debug!("{}: {} page(s) selected", name, page_numbers.len());

    let doc_dir = config.output_dir.join(name);
    let mut doc = extract_document(source, name, &doc_dir, &page_numbers, config)?;

    let markdown = render_document(name, &doc.pages);
    let markdown_path = doc_dir.join(format!("{name}.md"));
    write_atomic(&markdown_path, &markdown)?;

    doc.stats.total_duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Saved {} ({} image(s), {} skipped, {}ms)",
        markdown_path.display(),
        doc.stats.images_extracted,
        doc.stats.images_skipped,
        doc.stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_document_complete(name, &doc.stats);
    }

    Ok(ConversionOutput {
        name: name.to_string(),
        markdown,
        markdown_path,
        pages: doc.pages,
        metadata,
        stats: doc.stats,
    })
}

fn first_requested(pages: &PageSelection) -> usize {
    match pages {
        PageSelection::All => 1,
        PageSelection::Single(p) | PageSelection::Range(p, _) => *p,
        PageSelection::Set(set) => set.iter().copied().min().unwrap_or(0),
    }
}

/// Write `contents` to `path` via a temp file in the same directory and a
/// rename, so a crash never leaves a half-written Markdown file behind.
fn write_atomic(path: &Path, contents: &str) -> Result<(), Pdf2MdError> {
    let failed = |source| Pdf2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(failed)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(failed)?;
    tmp.write_all(contents.as_bytes()).map_err(failed)?;
    tmp.persist(path).map_err(|e| failed(e.error))?;
    Ok(())
}
