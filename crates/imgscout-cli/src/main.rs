use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use imgscout_client::{PatternExtractor, ReqwestTransport};
use imgscout_core::catalog::{self, DEFAULT_URL_FIELD};
use imgscout_core::{
    HeaderProfile, ImageFetcher, JitterRange, Orchestrator, ResultStore, RetryPolicy, RunConfig,
    StoreStats, Throttle, ThrottleConfig, TracingRunReporter,
};

#[derive(Parser)]
#[command(name = "imgscout", version, about = "Resumable catalog image scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch image URLs for every unresolved catalog entry
    Run(RunArgs),

    /// Show how much of the catalog is resolved, without fetching anything
    Status {
        #[command(flatten)]
        paths: PathArgs,

        /// Print the counts as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Args)]
struct PathArgs {
    /// Catalog file: JSON array of records
    #[arg(short, long, env = "IMGSCOUT_CATALOG", default_value = "catalog/catalog.json")]
    catalog: PathBuf,

    /// Result store: JSON object of address -> image URL or null
    #[arg(short, long, env = "IMGSCOUT_OUTPUT", default_value = "catalog/images.json")]
    output: PathBuf,

    /// Record field holding each entity's page address
    #[arg(long, env = "IMGSCOUT_URL_FIELD", default_value = DEFAULT_URL_FIELD)]
    url_field: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    /// `og:image` only
    Generic,
    /// parfumo.com perfume pages
    Parfumo,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    paths: PathArgs,

    /// Extraction preset
    #[arg(long, value_enum, env = "IMGSCOUT_PRESET", default_value = "generic")]
    preset: Preset,

    /// Extra fallback regex tried against raw page content (repeatable)
    #[arg(long = "fallback-pattern")]
    fallback_patterns: Vec<String>,

    /// Only accept og:image URLs containing this text
    #[arg(long)]
    require: Option<String>,

    /// User-agent to rotate through (repeatable; defaults to built-in list)
    #[arg(long = "user-agent")]
    user_agents: Vec<String>,

    /// Fixed Referer header (defaults to the page's origin)
    #[arg(long)]
    referer: Option<String>,

    /// Flush results to disk every N targets
    #[arg(long, env = "IMGSCOUT_BATCH_SAVE_EVERY", default_value_t = 20)]
    batch_save_every: usize,

    /// Delay floor before every request, in milliseconds
    #[arg(long, env = "IMGSCOUT_BASE_DELAY_MS", default_value_t = 2000)]
    base_delay_ms: u64,

    /// Minimum random extra delay per request, in milliseconds
    #[arg(long, default_value_t = 500)]
    jitter_min_ms: u64,

    /// Maximum random extra delay per request, in milliseconds
    #[arg(long, default_value_t = 2500)]
    jitter_max_ms: u64,

    /// Backoff before the first retry of a throttled request, in seconds
    #[arg(long, default_value_t = 10)]
    retry_backoff_secs: u64,

    /// Retries of a throttled (429/403) request
    #[arg(long, env = "IMGSCOUT_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Consecutive empty results before a cooldown
    #[arg(long, default_value_t = 5)]
    cooldown_threshold: u32,

    /// Cooldown floor, in seconds
    #[arg(long, default_value_t = 60)]
    cooldown_secs: u64,

    /// Maximum random extra cooldown, in seconds
    #[arg(long, default_value_t = 30)]
    cooldown_jitter_secs: u64,

    /// Per-request timeout, in seconds
    #[arg(long, env = "IMGSCOUT_TIMEOUT_SECS", default_value_t = 20)]
    timeout_secs: u64,

    /// Page used to establish a session (defaults to the first target's origin)
    #[arg(long, env = "IMGSCOUT_WARMUP_URL")]
    warmup_url: Option<String>,

    /// Skip the session warm-up request
    #[arg(long, default_value_t = false)]
    no_warmup: bool,

    /// Seed for the queue shuffle, for reproducible ordering
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("imgscout=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => cmd_run(args).await?,
        Commands::Status { paths, json } => {
            let stats = cmd_status(&paths)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", format_status(&paths.output, &stats));
            }
        }
    }

    Ok(())
}

fn throttle_config(args: &RunArgs) -> Result<ThrottleConfig> {
    let config = ThrottleConfig::default()
        .with_base_delay(Duration::from_millis(args.base_delay_ms))
        .with_base_jitter(JitterRange::new(
            Duration::from_millis(args.jitter_min_ms),
            Duration::from_millis(args.jitter_max_ms),
        ))
        .with_retry_backoff(Duration::from_secs(args.retry_backoff_secs))
        .with_cooldown(
            Duration::from_secs(args.cooldown_secs),
            args.cooldown_threshold,
        )
        .with_cooldown_jitter(JitterRange::new(
            Duration::ZERO,
            Duration::from_secs(args.cooldown_jitter_secs),
        ));
    config.validate().map_err(|e| anyhow::anyhow!(e))?;
    Ok(config)
}

fn extractor(args: &RunArgs) -> Result<PatternExtractor> {
    let mut extractor = match args.preset {
        Preset::Generic => PatternExtractor::new(),
        Preset::Parfumo => PatternExtractor::parfumo(),
    }
    .map_err(|e| anyhow::anyhow!(e))?;

    if let Some(needle) = &args.require {
        extractor = extractor.with_required_substring(needle.clone());
    }
    extractor
        .with_fallback_patterns(args.fallback_patterns.iter().map(String::as_str))
        .map_err(|e| anyhow::anyhow!(e))
}

fn run_config(args: &RunArgs) -> RunConfig {
    let mut config = RunConfig::new(&args.paths.catalog, &args.paths.output)
        .with_url_field(args.paths.url_field.clone())
        .with_batch_save_every(args.batch_save_every);
    if let Some(url) = &args.warmup_url {
        config = config.with_warmup_url(url.clone());
    }
    if args.no_warmup {
        config = config.without_warm_up();
    }
    if let Some(seed) = args.seed {
        config = config.with_shuffle_seed(seed);
    }
    config
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    let throttle = Throttle::new(throttle_config(&args)?);
    let transport = ReqwestTransport::new().context("Failed to create HTTP client")?;

    let mut headers = HeaderProfile::browser();
    if let Some(referer) = &args.referer {
        headers = headers.with_referer(referer.clone());
    }

    let fetcher = ImageFetcher::new(transport, extractor(&args)?, throttle)
        .with_retry_policy(RetryPolicy::new(args.max_retries))
        .with_user_agents(args.user_agents.clone())
        .with_headers(headers)
        .with_timeout(Duration::from_secs(args.timeout_secs));

    let orchestrator = Orchestrator::new(fetcher, run_config(&args));
    let summary = orchestrator
        .run(&TracingRunReporter)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Run aborted")?;

    if summary.attempted == 0 {
        println!("All done! Nothing left to fetch.");
    } else {
        println!(
            "Done! {} images found out of {} entries ({} new this run).",
            summary.found, summary.total, summary.newly_found
        );
        println!("Saved to {}", args.paths.output.display());
    }

    Ok(())
}

fn cmd_status(paths: &PathArgs) -> Result<StoreStats> {
    let targets = catalog::load_targets(&paths.catalog, &paths.url_field)
        .map_err(|e| anyhow::anyhow!(e))?;
    let store = ResultStore::load(&paths.output).map_err(|e| anyhow::anyhow!(e))?;
    Ok(store.stats(&targets))
}

fn format_status(output: &Path, stats: &StoreStats) -> String {
    format!(
        "Result store: {}\n\n  \
         catalog targets {}\n  \
         resolved        {}\n  \
         failed (retry)  {}\n  \
         never attempted {}",
        output.display(),
        stats.total(),
        stats.resolved,
        stats.failed,
        stats.unattempted
    )
}
