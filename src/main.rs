//! pagebinder main entry point
//!
//! This is the command-line interface for the pagebinder site crawler.

use anyhow::Context;
use clap::Parser;
use pagebinder::config::{compute_config_hash, load_config, validate, Config};
use pagebinder::crawler::{crawl, CrawlReport};
use pagebinder::pipeline::{render_pdf, HttpPipeline, PdfSummary};
use pagebinder::storage::{JsonStateStore, StateStore};
use pagebinder::url::normalize_absolute;
use pagebinder::{CrawlPhase, DocumentError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// pagebinder: crawl a website into a single document
///
/// pagebinder starts at a seed URL, follows links up to a maximum depth
/// while respecting robots.txt, and appends the text and first image of
/// every page to a Markdown document. Interrupted crawls resume where they
/// stopped.
#[derive(Parser, Debug)]
#[command(name = "pagebinder")]
#[command(version)]
#[command(about = "Crawl a website into a single document", long_about = None)]
struct Cli {
    /// URL to start crawling from
    #[arg(value_name = "SEED_URL")]
    seed: Option<String>,

    /// Maximum link depth from the seed, inclusive [default: 3]
    #[arg(long)]
    max_depth: Option<u32>,

    /// Output document path [default: web_content.md]
    #[arg(short, long, value_name = "PATH")]
    output: Option<String>,

    /// Also typeset the document into a PDF at this path (needs a font directory)
    #[arg(long, value_name = "PATH")]
    pdf: Option<String>,

    /// Directory holding the PDF fonts
    #[arg(long, value_name = "DIR")]
    font_dir: Option<String>,

    /// Maximum pages processed at once [default: 10]
    #[arg(long)]
    concurrency: Option<u32>,

    /// Follow links to other sites
    #[arg(long)]
    include_external: bool,

    /// Leave images out of the document
    #[arg(long)]
    text_only: bool,

    /// Image types to keep, comma separated [default: jpg,jpeg,png,gif,svg,webp]
    #[arg(long, value_delimiter = ',', value_name = "TYPES")]
    image_types: Option<Vec<String>>,

    /// Wait for dynamic content to settle after each page load
    #[arg(long)]
    dynamic: bool,

    /// Where crawl progress is saved for resuming [default: .pagebinder-state.json]
    #[arg(long, value_name = "PATH")]
    state_file: Option<String>,

    /// Start a fresh crawl, discarding saved progress
    #[arg(long)]
    fresh: bool,

    /// Path to a TOML configuration file; flags override its values
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;
    validate(&config).context("Invalid configuration")?;

    let mut store = JsonStateStore::new(&config.output.state_path);
    if cli.fresh {
        tracing::info!("Starting fresh crawl (discarding saved progress)");
        store
            .clear()
            .with_context(|| format!("Failed to remove {}", store.path().display()))?;
    }

    // The document is appended to only when the saved crawl is for this seed.
    let seed = normalize_absolute(&config.crawler.seed_url, config.crawler.query_policy)
        .context("Invalid seed URL")?;
    let resume = store
        .load()
        .map(|state| state.belongs_to(&seed))
        .unwrap_or(false);
    let pipeline = HttpPipeline::new(&config, resume)
        .await
        .context("Failed to set up the page pipeline")?;
    let document_path = pipeline.document_path().to_path_buf();
    let pdf = pdf_job(&config, &document_path);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, saving progress");
            signal_token.cancel();
        }
    });

    let report = crawl(config, Arc::new(pipeline), Box::new(store), cancel).await?;

    if !cli.quiet {
        print_report(&report);
        println!("Document: {}", document_path.display());
    }

    if let Some(job) = pdf {
        let pdf_path = job.pdf_path.clone();
        let summary = tokio::task::spawn_blocking(move || job.run())
            .await
            .context("PDF rendering task failed")?
            .context("Failed to render PDF")?;
        if !cli.quiet {
            println!(
                "PDF: {} ({} sections, {} images)",
                pdf_path.display(),
                summary.sections,
                summary.images
            );
        }
    }

    Ok(())
}

/// Inputs for typesetting the finished document
struct PdfJob {
    markdown_path: PathBuf,
    pdf_path: PathBuf,
    font_dir: PathBuf,
    fonts: Vec<String>,
}

impl PdfJob {
    fn run(self) -> Result<PdfSummary, DocumentError> {
        render_pdf(&self.markdown_path, &self.pdf_path, &self.font_dir, &self.fonts)
    }
}

/// Collects the PDF inputs when a PDF was requested
fn pdf_job(config: &Config, document_path: &Path) -> Option<PdfJob> {
    let pdf_path = config.output.pdf_path.as_ref()?;
    let font_dir = config.render.font_dir.as_ref()?;
    Some(PdfJob {
        markdown_path: document_path.to_path_buf(),
        pdf_path: PathBuf::from(pdf_path),
        font_dir: PathBuf::from(font_dir),
        fonts: config.render.fonts.clone(),
    })
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagebinder=info,warn"),
            1 => EnvFilter::new("pagebinder=debug,info"),
            2 => EnvFilter::new("pagebinder=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file (if any) and applies command-line overrides
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let config = load_config(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            let hash = compute_config_hash(path)?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(seed) = &cli.seed {
        config.crawler.seed_url = seed.clone();
    }
    if let Some(depth) = cli.max_depth {
        config.crawler.max_depth = depth;
    }
    if let Some(concurrency) = cli.concurrency {
        config.crawler.max_concurrent = concurrency;
    }
    if cli.include_external {
        config.crawler.include_external = true;
    }
    if let Some(output) = &cli.output {
        config.output.document_path = output.clone();
    }
    if let Some(pdf) = &cli.pdf {
        config.output.pdf_path = Some(pdf.clone());
    }
    if let Some(font_dir) = &cli.font_dir {
        config.render.font_dir = Some(font_dir.clone());
    }
    if let Some(state_file) = &cli.state_file {
        config.output.state_path = state_file.clone();
    }
    if cli.text_only {
        config.content.text_only = true;
    }
    if let Some(types) = &cli.image_types {
        config.content.allowed_image_types = types
            .iter()
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
    }
    if cli.dynamic {
        config.render.dynamic = true;
    }

    Ok(config)
}

/// Prints the end-of-run statistics to stdout
fn print_report(report: &CrawlReport) {
    let stats = &report.stats;

    println!("=== Crawl Report ===\n");

    match report.phase {
        CrawlPhase::Completed => println!("Status: completed"),
        CrawlPhase::Interrupted => println!(
            "Status: interrupted ({} URLs saved for resume)",
            report.state.frontier_len()
        ),
        other => println!("Status: {}", other),
    }
    println!("Duration: {:.1}s", stats.elapsed.as_secs_f64());
    println!();

    println!("Pages:");
    println!("  Dispatched: {}", stats.pages_dispatched);
    println!("  Written to document: {}", stats.pages_appended);
    println!("  Disallowed by robots.txt: {}", stats.robots_denied);
    println!("  Fetch failures: {}", stats.fetch_failures);
    if stats.document_failures > 0 {
        println!("  Document write failures: {}", stats.document_failures);
    }
    if stats.requeued > 0 {
        println!("  Requeued after interrupt: {}", stats.requeued);
    }
    println!();

    println!("Images:");
    println!("  Stored: {}", stats.images_stored);
    println!("  Skipped: {}", stats.image_failures);
    println!();

    println!("Links:");
    println!("  Discovered: {}", stats.links_discovered);
    println!("  Queued: {}", stats.links_enqueued);
    println!("  Out of scope: {}", stats.out_of_scope_links);
    println!("  Not crawlable: {}", stats.invalid_links);
    println!();

    if stats.save_failures > 0 {
        println!("Warning: {} state saves failed", stats.save_failures);
    }

    println!(
        "Success Rate: {:.1}% ({} / {} pages), peak concurrency {}",
        stats.success_rate(),
        stats.pages_appended,
        stats.pages_finished(),
        stats.peak_in_flight
    );
}
