//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use wasmcache_core::{LoadProgress, Loader};
use wasmcache_shared::{
    AppConfig, FetchConfig, cache_db_path, find_source, init_config, load_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// wasmcache — prefetch and cache chunked binary modules.
#[derive(Parser)]
#[command(
    name = "wasmcache",
    version,
    about = "Prefetch chunked WebAssembly modules into a durable local cache.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Override the cache directory from the config file.
    #[arg(long, global = true)]
    pub cache_dir: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Resolve an artifact into the cache, assembling chunks if needed.
    Fetch {
        /// Base URL, or the name of a registered source.
        source: String,

        /// Artifact name to resolve (e.g., core.wasm).
        artifact: String,
    },

    /// List cached artifacts and any leftover chunks.
    Status,

    /// Write a cached artifact to a file as a flat byte buffer.
    Export {
        /// Artifact name to export.
        artifact: String,

        /// Output file path.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Remove a cached artifact so the next fetch reassembles it.
    Evict {
        /// Artifact name to evict.
        artifact: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config()?;
    if let Some(dir) = &cli.cache_dir {
        config.defaults.cache_dir = dir.clone();
    }

    match cli.command {
        Command::Fetch { source, artifact } => cmd_fetch(&config, &source, &artifact).await,
        Command::Status => cmd_status(&config).await,
        Command::Export { artifact, out } => cmd_export(&config, &artifact, &out).await,
        Command::Evict { artifact } => cmd_evict(&config, &artifact).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

/// Build a loader for `source`, which is either a URL or a registered
/// source name from the config file.
fn build_loader(config: &AppConfig, source: &str) -> Result<Loader> {
    let base = match Url::parse(source) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        _ => {
            let entry = find_source(config, source).ok_or_else(|| {
                eyre!("'{source}' is not a URL or a registered source — see `wasmcache config show`")
            })?;
            Url::parse(&entry.base_url)
                .map_err(|e| eyre!("source '{source}' has invalid base_url: {e}"))?
        }
    };

    let loader = Loader::new(base, cache_db_path(config)?, FetchConfig::from(config))?;
    Ok(loader)
}

async fn cmd_fetch(config: &AppConfig, source: &str, artifact: &str) -> Result<()> {
    let loader = build_loader(config, source)?;

    info!(source, artifact, "fetching artifact");
    let start = Instant::now();

    let reporter = CliProgress::new();
    let payload = loader.resolve(artifact, &reporter).await?;
    reporter.finish();

    let cached = loader.has_cached_artifact(artifact).await?;

    println!();
    println!("  Artifact resolved successfully!");
    println!("  Name:   {artifact}");
    println!("  Size:   {} bytes", payload.len());
    println!("  Cached: {}", if cached { "yes" } else { "stored under manifest target name" });
    println!("  Time:   {:.1}s", start.elapsed().as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_status(config: &AppConfig) -> Result<()> {
    // Status needs a store but no network; the base URL is never contacted.
    let loader = build_loader_offline(config)?;

    let artifacts = loader.cached_artifacts().await?;
    let chunks = loader.pending_chunks().await?;

    if artifacts.is_empty() {
        println!("No cached artifacts.");
    } else {
        println!("Cached artifacts:");
        for entry in &artifacts {
            println!(
                "  {}  {} bytes  sha256:{}  {}",
                entry.name,
                entry.size,
                &entry.content_hash[..12.min(entry.content_hash.len())],
                entry.stored_at.format("%Y-%m-%d %H:%M:%S UTC"),
            );
        }
    }

    if !chunks.is_empty() {
        println!();
        println!("Leftover chunks (from interrupted assemblies):");
        for entry in &chunks {
            println!("  {}  {} bytes", entry.name, entry.size);
        }
    }

    Ok(())
}

async fn cmd_export(config: &AppConfig, artifact: &str, out: &PathBuf) -> Result<()> {
    let loader = build_loader_offline(config)?;

    let payload = loader.to_buffer(artifact).await?;
    std::fs::write(out, &payload)
        .map_err(|e| eyre!("failed to write {}: {e}", out.display()))?;

    println!("Exported {artifact} ({} bytes) to {}", payload.len(), out.display());
    Ok(())
}

async fn cmd_evict(config: &AppConfig, artifact: &str) -> Result<()> {
    let loader = build_loader_offline(config)?;

    if loader.evict(artifact).await? {
        println!("Evicted {artifact}.");
    } else {
        println!("{artifact} was not cached.");
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config)?;
    println!("{rendered}");
    Ok(())
}

/// Loader for store-only commands (status/export/evict). The placeholder
/// base URL is never contacted by those paths.
fn build_loader_offline(config: &AppConfig) -> Result<Loader> {
    let base = Url::parse("http://localhost/").expect("static URL parses");
    let loader = Loader::new(base, cache_db_path(config)?, FetchConfig::from(config))?;
    Ok(loader)
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl LoadProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn chunk_fetched(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Fetching chunks [{current}/{total}] {name}"));
    }

    fn artifact_ready(&self, name: &str, size: usize) {
        self.spinner
            .set_message(format!("Ready: {name} ({size} bytes)"));
    }

    fn cleanup_failed(&self, chunks: &[String], error: &str) {
        self.spinner.println(format!(
            "warning: failed to clean up {} chunk(s): {error}",
            chunks.len()
        ));
    }
}
