//! CLI binary for softmask-pdf2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use softmask_pdf2md::config::{DEFAULT_INPUT_DIR, DEFAULT_OUTPUT_DIR};
use softmask_pdf2md::{
    convert_directory, inspect, BatchOutput, ConversionConfig, ConversionStats,
    ExtractionProgressCallback, PageSelection, Pdf2MdError, ProgressCallback, ResampleFilter,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over documents plus a log line per
/// finished document. Documents may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    failed_documents: AtomicUsize,
    skipped_images: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failed_documents: AtomicUsize::new(0),
            skipped_images: AtomicUsize::new(0),
        })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_documents: usize) {
        self.bar.set_length(total_documents as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Found {total_documents} PDF file(s); images become PNG with transparency"
            ))
        ));
    }

    fn on_document_start(&self, document: &str, total_pages: usize) {
        self.bar
            .set_message(format!("{document} ({total_pages} pages)"));
    }

    fn on_image_error(&self, _document: &str, _page_num: usize, _error: &str) {
        self.skipped_images.fetch_add(1, Ordering::SeqCst);
    }

    fn on_document_complete(&self, document: &str, stats: &ConversionStats) {
        let skipped = if stats.images_skipped > 0 {
            red(&format!("{} skipped", stats.images_skipped))
        } else {
            String::new()
        };
        self.bar.println(format!(
            "  {} {:<32} {:>3} pages  {:>4} images  {}  {}",
            green("✓"),
            document,
            stats.processed_pages,
            stats.images_extracted,
            dim(&format!("{:.1}s", stats.total_duration_ms as f64 / 1000.0)),
            skipped,
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, document: &str, error: &str) {
        self.failed_documents.fetch_add(1, Ordering::SeqCst);

        // Keep one line per document even for long parser messages.
        let msg = match error.char_indices().nth(80) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };
        self.bar
            .println(format!("  {} {:<32} {}", red("✗"), document, red(&msg)));
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert every PDF in ./resources into ./resources/extracted
  pdf2md

  # Other directories
  pdf2md --input-dir scans --output-dir out

  # First ten pages only, faster mask scaling
  pdf2md --pages 1-10 --filter triangle

  # Machine-readable run summary
  pdf2md --json > summary.json

  # Metadata, image and soft-mask counts of one file
  pdf2md --inspect-only brochure.pdf

OUTPUT LAYOUT:
  <output-dir>/<name>/<name>.md
  <output-dir>/<name>/images/page<N>_img<k>.png

ENVIRONMENT VARIABLES:
  RUST_LOG                Override log filter (e.g. softmask_pdf2md=debug)
"#;

/// Extract Markdown and transparent PNG images from PDF files.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2md",
    version,
    about = "Extract Markdown and transparent PNG images from PDF files",
    long_about = "Convert every PDF in a directory to Markdown. Embedded images are written \
as PNG files, with their PDF soft masks applied as the alpha channel so transparent artwork \
stays transparent.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory scanned for *.pdf files.
    #[arg(long, env = "PDF2MD_INPUT_DIR", default_value = DEFAULT_INPUT_DIR)]
    input_dir: PathBuf,

    /// Directory receiving one folder per converted PDF.
    #[arg(long, env = "PDF2MD_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2MD_PAGES", default_value = "all")]
    pages: String,

    /// Number of documents converted at the same time.
    #[arg(short, long, env = "PDF2MD_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Resampling filter for soft masks whose size differs from their image.
    #[arg(long, env = "PDF2MD_FILTER", value_enum, default_value = "lanczos3")]
    filter: FilterArg,

    /// Print a JSON summary (BatchOutput) on stdout.
    #[arg(long, env = "PDF2MD_JSON")]
    json: bool,

    /// Print metadata of a single PDF and exit without converting.
    #[arg(long, value_name = "FILE")]
    inspect_only: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "PDF2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2MD_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FilterArg {
    Lanczos3,
    CatmullRom,
    Gaussian,
    Triangle,
    Nearest,
}

impl From<FilterArg> for ResampleFilter {
    fn from(v: FilterArg) -> Self {
        match v {
            FilterArg::Lanczos3 => ResampleFilter::Lanczos3,
            FilterArg::CatmullRom => ResampleFilter::CatmullRom,
            FilterArg::Gaussian => ResampleFilter::Gaussian,
            FilterArg::Triangle => ResampleFilter::Triangle,
            FilterArg::Nearest => ResampleFilter::Nearest,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.inspect_only.is_none();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if let Some(ref file) = cli.inspect_only {
        let meta = inspect(file).await.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", file.display());
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            println!("Encrypted:    {}", meta.is_encrypted);
            println!("Images:       {}", meta.image_count);
            println!("Soft masks:   {}", meta.soft_mask_count);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress
            .as_ref()
            .map(|cb| Arc::clone(cb) as ProgressCallback),
    )?;

    // ── Run conversion ───────────────────────────────────────────────────
    let batch = match convert_directory(&config).await {
        Ok(batch) => batch,
        Err(Pdf2MdError::NoInputFiles { dir }) => {
            eprintln!("No PDF files found in {}.", dir.display());
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Conversion failed"),
    };

    if let Some(ref cb) = progress {
        cb.bar.finish_and_clear();
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&batch).context("Failed to serialise output")?
        );
    } else if !cli.quiet {
        print_summary(&batch, &config, show_progress);
    }

    Ok(())
}

fn print_summary(batch: &BatchOutput, config: &ConversionConfig, progress_shown: bool) {
    // The progress callback already printed one line per document.
    if !progress_shown {
        for doc in &batch.converted {
            eprintln!(
                "Saved {}  ({} images, {} skipped)",
                doc.markdown_path.display(),
                doc.stats.images_extracted,
                doc.stats.images_skipped
            );
        }
        for failure in &batch.failed {
            eprintln!("Failed {}: {}", failure.path.display(), failure.error);
        }
    }

    let mark = if batch.failed.is_empty() {
        green("✔")
    } else {
        cyan("⚠")
    };
    eprintln!(
        "{} {} document(s) converted, {} failed, {} image(s) written  →  {}",
        mark,
        bold(&batch.converted.len().to_string()),
        batch.failed.len(),
        batch.images_extracted(),
        bold(&config.output_dir.display().to_string()),
    );
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let pages = parse_pages(&cli.pages)?;

    let mut builder = ConversionConfig::builder()
        .input_dir(&cli.input_dir)
        .output_dir(&cli.output_dir)
        .concurrency(cli.concurrency)
        .pages(pages)
        .resample_filter(cli.filter.into());

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if pages.contains(&0) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got 0)");
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}
