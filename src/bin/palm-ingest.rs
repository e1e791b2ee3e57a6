//! CLI binary for palmbook-ingest.
//!
//! A thin shim over the library crate: configuration comes from the
//! environment (and `.env`), flags only override a few run-level settings.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use palmbook_ingest::{
    ingest_directory_with, IngestConfig, IngestProgressCallback, IngestRunStatistics,
    PdfiumBackend, ProcessingMode, ProgressCallback, QdrantWriter, VisionInterpreter,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar per file, reset when the next file opens.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix("Scanning");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl IngestProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_files: usize) {
        self.bar
            .println(format!("{} {total_files} PDF file(s) found", bold("◆")));
    }

    fn on_file_start(&self, file: &str, total_pages: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        self.bar.set_length(total_pages as u64);
        self.bar.set_position(0);
        self.bar.set_prefix(file.to_string());
        self.bar.reset_eta();
    }

    fn on_page_complete(&self, _file: &str, page: usize, _total: usize, mode: ProcessingMode) {
        self.bar.set_message(format!("page {page} {}", dim(mode.as_str())));
        self.bar.inc(1);
    }

    fn on_page_skipped(&self, _file: &str, page: usize, _total: usize) {
        self.bar.set_message(format!("page {page} {}", dim("skipped")));
        self.bar.inc(1);
    }

    fn on_page_error(&self, _file: &str, page: usize, _total: usize, error: &str) {
        self.bar
            .println(format!("  {} page {page}: {}", red("✗"), red(error)));
        self.bar.inc(1);
    }

    fn on_file_complete(&self, file: &str, documents_written: usize, error: Option<&str>) {
        match error {
            None => self.bar.println(format!(
                "  {} {file}  {}",
                green("✓"),
                dim(&format!("{documents_written} documents"))
            )),
            Some(e) => self.bar.println(format!("  {} {file}  {}", red("✗"), red(e))),
        }
    }

    fn on_run_complete(&self, _files: usize, _documents_written: usize) {
        self.bar.finish_and_clear();
    }
}

/// Load PDF books into the palmistry knowledge base.
#[derive(Parser, Debug)]
#[command(
    name = "palm-ingest",
    version,
    about = "Load palmistry PDF books into a Qdrant vector store",
    long_about = "Scan a folder of PDF books, extract text or ask a vision model to read \
scanned pages and diagrams, and upsert one record per page into Qdrant.\n\
All tuning keys (MIN_TEXT_LENGTH, OVERLAP_SIZE, RENDER_ZOOM, ...) are read from the \
environment or a .env file."
)]
struct Cli {
    /// Root folder scanned recursively for PDFs.
    #[arg(long, env = "PDF_FOLDER")]
    pdf_folder: Option<PathBuf>,

    /// Drop the collection before ingesting.
    #[arg(long)]
    clear: bool,

    /// Rewrite a JSON report here after every file.
    #[arg(long, env = "STATS_PATH")]
    stats: Option<PathBuf>,

    /// Print the final report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the process environment still applies.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Configuration ────────────────────────────────────────────────────
    let mut config = IngestConfig::from_env().context("Invalid configuration")?;
    if let Some(folder) = cli.pdf_folder {
        config.pdf_root = folder;
    }
    if let Some(stats) = cli.stats {
        config.stats_path = Some(stats);
    }
    if show_progress {
        config.progress_callback = Some(CliProgressCallback::new() as ProgressCallback);
    }

    // ── Collaborators (fatal on failure, before any file is opened) ──────
    let interpreter = VisionInterpreter::from_config(&config).context("Vision provider")?;
    let writer = QdrantWriter::from_config(&config).context("Vector store")?;
    if cli.clear && writer.clear_collection().await.context("Clearing collection")? {
        eprintln!("Collection '{}' cleared", writer.collection());
    }
    writer
        .ensure_collection()
        .await
        .context("Preparing collection")?;
    let backend = tokio::task::block_in_place(PdfiumBackend::new)
        .context("Failed to prepare PDFium engine")?;

    // ── Ctrl-C: finish the current page, write, stop ─────────────────────
    let cancel = Arc::clone(&config.cancel_flag);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted; finishing the current page…");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let report = ingest_directory_with(
        &config,
        Arc::new(backend),
        Arc::new(interpreter),
        Arc::new(writer),
    )
    .await
    .context("Ingestion failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else if !cli.quiet {
        print_summary(&report);
    }

    Ok(())
}

fn print_summary(report: &IngestRunStatistics) {
    let t = &report.totals;
    eprintln!();
    eprintln!("{}", bold("Ingestion summary"));
    for file in &report.files {
        match (&file.stats, &file.error) {
            (Some(s), None) => eprintln!(
                "  {} {:<40} {:>4} pages  {:>4} written  {:>3} skipped  {:>3} failed",
                green("✓"),
                file.file_name,
                s.total_pages,
                s.documents_written,
                s.skipped_pages,
                s.failed_pages
            ),
            (_, Some(e)) => eprintln!("  {} {:<40} {}", red("✗"), file.file_name, red(e)),
            (None, None) => {}
        }
    }
    eprintln!(
        "  pages {}  text {}  text+images {}  hybrid {}  vision {}",
        t.total_pages,
        t.text_only_pages,
        t.text_with_images_pages,
        t.hybrid_pages,
        t.vision_full_pages
    );
    eprintln!(
        "  images analyzed {}  documents written {}  files errored {}",
        t.images_analyzed, t.documents_written, report.files_errored
    );
    eprintln!(
        "  {}",
        dim(&format!(
            "tokens: {} in / {} out ({} interpreter calls)",
            t.input_tokens, t.output_tokens, t.interpreter_calls
        ))
    );
    if report.cancelled {
        eprintln!("  {}", red("run was cancelled before all files were processed"));
    }
}
