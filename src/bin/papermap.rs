//! CLI binary for papermap.
//!
//! A thin shim over the library crate that maps CLI flags onto
//! `PaperMapConfig`, runs uploads and prints the catalogue.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use papermap::{
    markers_for, ExtractorKind, GeocodeSource, GeocoderKind, MemoryStorage, Paper, PaperMapConfig,
    PaperMapError, PaperRepository, ProgressCallback, SqliteStorage, StorageProvider, UploadOutcome,
    UploadPipeline, UploadProgressCallback, UploadStage,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

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

/// Spinner with one log line per geocoded affiliation.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl UploadProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: UploadStage, message: &str) {
        match stage {
            UploadStage::Done | UploadStage::Failed => self.bar.finish_and_clear(),
            _ => {
                self.bar.set_prefix(stage.to_string());
                self.bar.set_message(message.to_string());
            }
        }
    }

    fn on_geocode_item(&self, index: usize, total: usize, affiliation: &str) {
        self.bar.set_message(format!("{index}/{total}  {affiliation}"));
    }

    fn on_complete(&self, outcome: &UploadOutcome) {
        for report in &outcome.geocoding {
            let line = match (&report.source, report.geo_point) {
                (GeocodeSource::Cache, Some(p)) => format!(
                    "  {} {}  {}",
                    green("✓"),
                    report.affiliation,
                    dim(&format!("({:.4}, {:.4}) cached", p.lat(), p.lon()))
                ),
                (_, Some(p)) => format!(
                    "  {} {}  {}",
                    green("✓"),
                    report.affiliation,
                    dim(&format!("({:.4}, {:.4})", p.lat(), p.lon()))
                ),
                (GeocodeSource::Failed(e), None) => {
                    format!("  {} {}  {}", red("✗"), report.affiliation, red(&e.to_string()))
                }
                (_, None) => format!("  {} {}  {}", cyan("·"), report.affiliation, dim("not found")),
            };
            eprintln!("{line}");
        }
    }

    fn on_failed(&self, stage: UploadStage, error: &PaperMapError) {
        self.bar.finish_and_clear();
        eprintln!("{} Upload failed while {}: {}", red("✘"), stage, error);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Upload a paper (LLM extraction, Nominatim geocoding) and save it
  papermap upload paper.pdf

  # No API keys at all: local heuristics
  papermap upload --extractor heuristic paper.pdf

  # Google Maps geocoding, print the outcome as JSON, do not save
  papermap upload --geocoder google --no-save --json paper.pdf

  # Browse the catalogue
  papermap list
  papermap show 1b4e28ba-2fa1-11d2-883f-0016d3cca427
  papermap markers > markers.json

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY                     Google Gemini API key (LLM extraction)
  GOOGLE_MAPS_API_KEY                Google Maps Geocoding API key
  PAPERMAP_GEOCODER                  nominatim | google
  PAPERMAP_EXTRACTOR                 llm | heuristic | auto
  PAPERMAP_LLM_PROVIDER              edgequake-llm provider name (default gemini)
  PAPERMAP_LLM_MODEL                 model id (default gemini-2.5-flash-lite)
  PAPERMAP_NOMINATIM_URL             Nominatim base URL
  PAPERMAP_NOMINATIM_RATE_LIMIT_MS   minimum spacing between Nominatim requests
  PAPERMAP_NOMINATIM_USER_AGENT      User-Agent sent to Nominatim
  PAPERMAP_MAX_UPLOAD_BYTES          upload size limit (default 10 MiB)
  PAPERMAP_DB_PATH                   SQLite catalogue location
  PAPERMAP_HTTP_TIMEOUT_SECS         timeout for geocoding requests
  PDFIUM_LIB_PATH                    Path to an existing libpdfium; skips auto-download

  A .env file in the working directory is read before the environment.
"#;

/// Extract authors and affiliations from PDF papers and put them on a map.
#[derive(Parser, Debug)]
#[command(
    name = "papermap",
    version,
    about = "Extract authors and affiliations from PDF papers and geocode them",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SQLite catalogue path.
    #[arg(long, global = true, env = "PAPERMAP_DB_PATH")]
    db: Option<PathBuf>,

    /// Keep everything in memory for this run; nothing is written to disk.
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PAPERMAP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PAPERMAP_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract, geocode and (by default) save a paper.
    Upload {
        /// Local PDF file.
        pdf: PathBuf,

        /// Geocoding provider.
        #[arg(long, value_enum)]
        geocoder: Option<GeocoderArg>,

        /// Entity extraction strategy.
        #[arg(long, value_enum)]
        extractor: Option<ExtractorArg>,

        /// Do not save the paper to the catalogue.
        #[arg(long)]
        no_save: bool,

        /// Print the full upload outcome as JSON.
        #[arg(long)]
        json: bool,

        /// Disable the progress spinner.
        #[arg(long)]
        no_progress: bool,
    },
    /// List saved papers.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Print one saved paper as JSON.
    Show { id: String },
    /// Delete a saved paper.
    Delete { id: String },
    /// Print map markers for every located affiliation as JSON.
    Markers,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum GeocoderArg {
    Nominatim,
    Google,
}

impl From<GeocoderArg> for GeocoderKind {
    fn from(v: GeocoderArg) -> Self {
        match v {
            GeocoderArg::Nominatim => GeocoderKind::Nominatim,
            GeocoderArg::Google => GeocoderKind::GoogleMaps,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ExtractorArg {
    Llm,
    Heuristic,
    Auto,
}

impl From<ExtractorArg> for ExtractorKind {
    fn from(v: ExtractorArg) -> Self {
        match v {
            ExtractorArg::Llm => ExtractorKind::Llm,
            ExtractorArg::Heuristic => ExtractorKind::Heuristic,
            ExtractorArg::Auto => ExtractorKind::Auto,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries upload feedback, so library INFO logs are hidden
    // while it is active unless --verbose is given.
    let spinner = matches!(
        cli.command,
        Command::Upload { json: false, no_progress: false, .. }
    ) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || spinner {
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

    let mut config = PaperMapConfig::from_env().context("Invalid configuration")?;
    if let Some(ref db) = cli.db {
        config.database_path = db.clone();
    }

    let storage: Arc<dyn StorageProvider> = if cli.ephemeral {
        Arc::new(MemoryStorage::new())
    } else {
        Arc::new(SqliteStorage::open(&config.database_path).with_context(|| {
            format!("Failed to open catalogue at {}", config.database_path.display())
        })?)
    };
    let repository = PaperRepository::new(Arc::clone(&storage));

    match cli.command {
        Command::Upload {
            pdf,
            geocoder,
            extractor,
            no_save,
            json,
            no_progress: _,
        } => {
            if let Some(g) = geocoder {
                config.geocoder = g.into();
            }
            if let Some(e) = extractor {
                config.extractor = e.into();
            }
            if spinner {
                let cb = CliProgressCallback::new();
                config.progress_callback = Some(cb as ProgressCallback);
            }

            ensure_pdfium(cli.quiet)?;

            let pipeline = UploadPipeline::from_config(&config, storage)
                .context("Failed to set up the upload pipeline")?;
            let outcome = pipeline
                .upload_file(&pdf)
                .await
                .with_context(|| format!("Upload of {} failed", pdf.display()))?;

            if !no_save {
                repository.save(&outcome.paper).await.context("Failed to save paper")?;
            }

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?
                );
            } else if !cli.quiet {
                print_paper(&outcome.paper);
                eprintln!(
                    "{}  {}/{} affiliations located  ({} cached, {} failed)  {}ms{}",
                    if outcome.stats.failed == 0 { green("✔") } else { cyan("⚠") },
                    outcome.stats.located(),
                    outcome.stats.affiliations,
                    outcome.stats.cached,
                    outcome.stats.failed,
                    outcome.stats.total_duration_ms,
                    if no_save { dim("  (not saved)") } else { String::new() },
                );
            }
        }

        Command::List { json } => {
            let papers = repository.find_all().await.context("Failed to list papers")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&papers).context("Failed to serialise papers")?);
            } else {
                if papers.is_empty() && !cli.quiet {
                    eprintln!("{}", dim("No papers saved yet."));
                }
                for paper in &papers {
                    println!(
                        "{}  {}  {}",
                        dim(&paper.id.to_string()),
                        paper.uploaded_at.format("%Y-%m-%d"),
                        bold(&paper.title)
                    );
                }
            }
        }

        Command::Show { id } => {
            let id = parse_id(&id)?;
            let paper = repository
                .find_by_id(&id)
                .await
                .context("Failed to load paper")?
                .with_context(|| format!("No paper with id {id}"))?;
            println!("{}", serde_json::to_string_pretty(&paper).context("Failed to serialise paper")?);
        }

        Command::Delete { id } => {
            let id = parse_id(&id)?;
            if !repository.exists(&id).await.context("Failed to look up paper")? {
                anyhow::bail!("No paper with id {id}");
            }
            repository.delete(&id).await.context("Failed to delete paper")?;
            if !cli.quiet {
                eprintln!("{} Deleted {}", green("✔"), id);
            }
        }

        Command::Markers => {
            let papers = repository.find_all().await.context("Failed to list papers")?;
            let markers = markers_for(&papers);
            println!("{}", serde_json::to_string_pretty(&markers).context("Failed to serialise markers")?);
        }
    }

    Ok(())
}

fn parse_id(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s.trim()).with_context(|| format!("Invalid paper id '{s}'"))
}

fn print_paper(paper: &Paper) {
    println!("{}", bold(&paper.title));
    println!("{}", dim(&paper.id.to_string()));
    if !paper.authors.is_empty() {
        let names: Vec<&str> = paper.authors.iter().map(|a| a.name.as_str()).collect();
        println!("Authors:      {}", names.join(", "));
    }
    for affiliation in &paper.affiliations {
        let place = match affiliation.geo_point() {
            Some(p) => format!("({:.4}, {:.4})", p.lat(), p.lon()),
            None => "unlocated".to_string(),
        };
        let country = affiliation.country().map(|c| format!(", {c}")).unwrap_or_default();
        println!("Affiliation:  {}{}  {}", affiliation.name(), country, dim(&place));
    }
}

/// Make sure a pdfium library is available before the first parse.
///
/// With `--features bundled` the library embedded at build time is
/// extracted. Otherwise it is downloaded once into the pdfium-auto cache.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    #[cfg(feature = "bundled")]
    {
        let _ = quiet;
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_bundled())
            .context("Failed to extract bundled PDFium engine")?;
    }

    #[cfg(not(feature = "bundled"))]
    if !pdfium_auto::is_pdfium_cached() {
        if quiet {
            tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
                .context("Failed to download PDFium engine")?;
            return Ok(());
        }

        let dl_bar = ProgressBar::new(0);
        dl_bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        dl_bar.set_prefix("PDF engine");
        dl_bar.enable_steady_tick(Duration::from_millis(80));

        let bar = dl_bar.clone();
        tokio::task::block_in_place(|| {
            pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
                if let Some(t) = total {
                    if bar.length().unwrap_or(0) != t {
                        bar.set_length(t);
                    }
                }
                bar.set_position(downloaded);
            }))
        })
        .context("Failed to download PDFium engine")?;

        dl_bar.finish_with_message("ready ✓");
    }

    Ok(())
}
