//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use restoscout_core::pipeline::{
    Pipeline, PipelineOptions, ProgressReporter, RunSummary, UnitReport, plan_units,
    resolve_adapters,
};
use restoscout_delivery::{BrokerHandle, DeliverySink, MemoryBroker};
use restoscout_shared::{
    AppConfig, DEFAULT_CONFIG_FILE, RestoscoutError, SourceDescriptor, UnitOfWork, init_config,
    load_cities, load_config, load_sources,
};
use restoscout_sources::SourceRegistry;
use restoscout_storage::{CounterFile, SnapshotWriter};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// restoscout: restaurant listings from source to broker.
#[derive(Parser)]
#[command(
    name = "restoscout",
    version,
    about = "Collect, enrich and deliver restaurant listings per city.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ./restoscout.toml when present).
    #[arg(long, global = true, env = "RESTOSCOUT_CONFIG")]
    pub config: Option<PathBuf>,

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
    /// Run every configured source for every city and deliver the results.
    Run(RunArgs),

    /// List registered scrapers and the configured sources.
    Sources,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `restoscout run`. Each one overrides its config value.
#[derive(Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Enrich records with a worker pool.
    #[arg(long)]
    pub parallel: bool,

    /// Worker pool size for parallel enrichment.
    #[arg(long, allow_negative_numbers = true)]
    pub workers: Option<i64>,

    /// Only run this city (need not be in the cities file).
    #[arg(long)]
    pub city: Option<String>,

    /// Only run sources using this scraper.
    #[arg(long)]
    pub scraper: Option<String>,

    /// Publish to an in-memory broker instead of Kafka.
    #[arg(long)]
    pub dry_run: bool,

    /// Snapshot directory.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Kafka bootstrap servers.
    #[arg(long, env = "KAFKA_BOOTSTRAP_SERVERS")]
    pub bootstrap_servers: Option<String>,

    /// Kafka topic.
    #[arg(long)]
    pub topic: Option<String>,

    /// Also write the enriched raw records per unit.
    #[arg(long)]
    pub raw: bool,
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
        0 => "restoscout=info",
        1 => "restoscout=debug",
        _ => "restoscout=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
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
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run(args) => cmd_run(config_path, args).await,
        Command::Sources => cmd_sources(config_path).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path).await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>, args: RunArgs) -> Result<()> {
    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, &args);

    let units = load_units(&config, &args)?;
    if units.is_empty() {
        warn!("nothing to run: no units of work after filtering");
        return Ok(());
    }

    // Unknown scrapers fail here, before anything is fetched or published.
    let adapters = resolve_adapters(&SourceRegistry::builtin(), &config, &units)?;

    let memory = args.dry_run.then(|| Arc::new(MemoryBroker::new()));
    let handle = match &memory {
        Some(broker) => BrokerHandle::with_broker(broker.clone()),
        None => BrokerHandle::kafka(config.broker.clone()),
    };
    let sink = DeliverySink::from_config(Arc::new(handle), &config.broker);

    let pipeline = Pipeline::new(
        adapters,
        Arc::new(CounterFile::new(&config.defaults.counter_file)),
        sink.clone(),
        SnapshotWriter::new(&config.defaults.output_dir),
        PipelineOptions {
            parallel: config.defaults.parallel,
            workers: config.defaults.workers,
            write_raw: args.raw,
        },
    );
    pipeline.validate(&units)?;

    info!(
        units = units.len(),
        parallel = config.defaults.parallel,
        workers = config.defaults.workers,
        topic = %sink.topic(),
        dry_run = args.dry_run,
        "starting run"
    );

    let reporter = CliProgress::new();
    let outcome =
        run_until_shutdown(pipeline.run_all(&units, &reporter), &sink, shutdown_signal()).await;

    let Some(summary) = outcome else {
        reporter.spinner.finish_and_clear();
        return Err(eyre!("interrupted; broker flushed and closed"));
    };

    print_summary(&summary);
    if let Some(broker) = memory {
        println!("  Dry run: {} message(s) kept in memory", broker.messages().len());
        println!();
    }
    Ok(())
}

/// Race `run` against `shutdown`, then close the sink on either path.
///
/// `None` means the run was interrupted; in-flight enrichment is dropped
/// with the run future.
async fn run_until_shutdown<R, S>(run: R, sink: &DeliverySink, shutdown: S) -> Option<RunSummary>
where
    R: Future<Output = RunSummary>,
    S: Future<Output = ()>,
{
    let outcome = tokio::select! {
        summary = run => Some(summary),
        () = shutdown => None,
    };
    sink.close().await;
    outcome
}

/// Fold CLI flags over the loaded config.
fn apply_overrides(config: &mut AppConfig, args: &RunArgs) {
    if args.parallel {
        config.defaults.parallel = true;
    }
    if let Some(workers) = args.workers {
        config.defaults.workers = workers;
    }
    if let Some(dir) = &args.output_dir {
        config.defaults.output_dir = dir.to_string_lossy().into_owned();
    }
    if let Some(servers) = &args.bootstrap_servers {
        config.broker.bootstrap_servers = servers.clone();
    }
    if let Some(topic) = &args.topic {
        config.broker.topic = topic.clone();
    }
}

/// Read the input files and expand them into units, honouring `--scraper` and `--city`.
fn load_units(config: &AppConfig, args: &RunArgs) -> Result<Vec<UnitOfWork>> {
    let mut sources = load_sources(Path::new(&config.inputs.sources_file))?;
    if let Some(scraper) = &args.scraper {
        sources.retain(|s| &s.scraper == scraper);
        if sources.is_empty() {
            return Err(eyre!(
                "no source in {} uses scraper '{scraper}'",
                config.inputs.sources_file
            ));
        }
    }

    let cities = match &args.city {
        Some(city) => vec![city.clone()],
        None if needs_cities(&sources) => load_cities(Path::new(&config.inputs.cities_file))?,
        None => Vec::new(),
    };

    Ok(plan_units(&sources, &cities))
}

fn needs_cities(sources: &[SourceDescriptor]) -> bool {
    sources.iter().any(|s| UnitOfWork::is_templated(&s.url))
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("  Run finished");
    println!("  Units:      {}", summary.units());
    println!("  Processed:  {}", summary.processed());
    println!("  Delivered:  {}", summary.delivered());
    println!("  Undelivered: {}", summary.failed_deliveries());
    if !summary.failures.is_empty() {
        println!("  Failed units:");
        for failure in &summary.failures {
            println!(
                "    {} / {}: {}",
                failure.source_name, failure.unit_label, failure.error
            );
        }
    }
    println!();
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => warn!("received Ctrl+C, shutting down"),
        () = terminate => warn!("received SIGTERM, shutting down"),
    }
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
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn unit_started(&self, unit: &UnitOfWork, index: usize, total: usize) {
        self.spinner.set_message(format!(
            "[{}/{total}] {} · {}",
            index + 1,
            unit.source_name,
            unit.unit_label
        ));
    }

    fn unit_finished(&self, report: &UnitReport) {
        self.spinner.println(format!(
            "  ✓ {:<16} {} record(s), {} delivered",
            report.unit_label, report.processed, report.delivered
        ));
    }

    fn unit_failed(&self, unit: &UnitOfWork, error: &RestoscoutError) {
        self.spinner
            .println(format!("  ✗ {:<16} {error}", unit.unit_label));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// sources / config
// ---------------------------------------------------------------------------

async fn cmd_sources(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = SourceRegistry::builtin();

    println!("Registered scrapers:");
    for name in registry.names() {
        println!("  {name}");
    }

    let path = Path::new(&config.inputs.sources_file);
    if !path.exists() {
        println!("\nNo sources file at {}", path.display());
        return Ok(());
    }

    let sources = load_sources(path)?;
    println!("\nConfigured sources ({}):", path.display());
    for source in sources {
        let note = if registry.contains(&source.scraper) {
            ""
        } else {
            "  (unknown scraper)"
        };
        println!("  {:<12} {}{note}", source.scraper, source.url);
    }
    Ok(())
}

async fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = init_config(config_path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE)))?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config: AppConfig = load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
