//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use keywordscout_core::{Pipeline, ProgressReporter, RankResult};
use keywordscout_shared::{AppConfig, init_config, load_config};

use crate::server;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// KeywordScout: discover related keywords and rank them by relevancy.
#[derive(Parser)]
#[command(
    name = "keywordscout",
    version,
    about = "Discover related keyword annotations and rank them by relevancy to a seed keyword.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Rank related keywords for a seed keyword.
    Rank {
        /// Seed keyword.
        keyword: String,

        /// Maximum number of candidate sources to search (defaults to config).
        #[arg(long)]
        max_sources: Option<usize>,

        /// Print the ranking as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Serve the rank interface over HTTP.
    Serve {
        /// Address to bind (host:port). Defaults to config `server.bind`.
        #[arg(long, env = "KEYWORDSCOUT_BIND")]
        bind: Option<String>,
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
        0 => "keywordscout=info",
        1 => "keywordscout=debug",
        _ => "keywordscout=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Rank {
            keyword,
            max_sources,
            json,
        } => cmd_rank(&keyword, max_sources, json).await,
        Command::Serve { bind } => cmd_serve(bind.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_rank(keyword: &str, max_sources: Option<usize>, json: bool) -> Result<()> {
    let config = load_config()?;
    let pipeline = Pipeline::from_config(&config)?;
    let max_sources = max_sources.unwrap_or(config.pipeline.max_candidate_sources);
    if max_sources == 0 {
        return Err(eyre!("--max-sources must be at least 1"));
    }

    info!(keyword, max_sources, "ranking keyword");

    let reporter = CliProgress::new();
    let result = pipeline.run(keyword, max_sources, &reporter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result.ranked)?);
        return Ok(());
    }

    print_ranking(&result);
    Ok(())
}

fn print_ranking(result: &RankResult) {
    println!();
    println!("  Keyword:   {}", result.keyword);
    println!("  Sources:   {}", result.candidate_ids.len());
    println!("  Failures:  {}", result.scrape_failures.len());
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    if result.ranked.is_empty() {
        println!("  No related keywords found.");
        println!();
        return;
    }

    let width = result
        .ranked
        .iter()
        .map(|s| s.annotation.chars().count())
        .max()
        .unwrap_or(0)
        .max("Annotation".len());

    println!("  {:>3}  {:<width$}  {:>10}  {:>6}", "#", "Annotation", "Volume", "Score");
    for (i, scored) in result.ranked.iter().enumerate() {
        println!(
            "  {:>3}  {:<width$}  {:>10}  {:>6.3}",
            i + 1,
            scored.annotation,
            scored.volume,
            scored.relevancy_score
        );
    }
    println!();
}

async fn cmd_serve(bind: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let pipeline = Arc::new(Pipeline::from_config(&config)?);
    let addr = bind.unwrap_or(config.server.bind.as_str()).to_string();

    println!("Serving rank API on http://{addr}/rank");
    server::serve(&addr, pipeline).await
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
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn id_scraped(&self, id: &str, ok: bool, current: usize, total: usize) {
        let status = if ok { "ok" } else { "failed" };
        self.spinner
            .set_message(format!("Scraping [{current}/{total}] pin {id} ({status})"));
    }

    fn volume_resolved(&self, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Resolving volumes [{current}/{total}]"));
    }

    fn done(&self, _result: &RankResult) {
        self.spinner.finish_and_clear();
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
