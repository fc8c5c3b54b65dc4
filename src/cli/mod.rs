//! Command-line interface for otlp-recorder.
//!
//! Every command opens the filesystem blob store under `storage.data_dir`,
//! so sessions written by `capture` or `seed` can be listed, replayed and
//! exported by later invocations.

use crate::capture::CaptureService;
use crate::core::config::ConfigBuilder;
use crate::core::{
    CaptureConfig, CaptureSession, Config, RecorderError, ReplayState, Result, SessionType,
    SignalType, TimestampAdjustment,
};
use crate::replay::{ReplayConfig, ReplayService, ReplayTarget};
use crate::seed::{PatternRegistry, SeedConfig, SeedGenerator};
use crate::session::{SelectionStrategy, SessionFilter, SessionManager};
use crate::storage::{compression, BlobStore, FsBlobStore};
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use humantime_serde::re::humantime;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Polling cadence of `replay` while the job runs
const REPLAY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Capture, seed and replay OTLP data
#[derive(Parser, Debug)]
#[command(name = "otlp-recorder")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/otlp-recorder/config.yaml)
    #[arg(short, long, env = "OTLP_RECORDER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding session data
    #[arg(long, env = "OTLP_RECORDER_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "OTLP_RECORDER_DEBUG", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered generation patterns
    Patterns,
    /// Generate a synthetic seed session
    Seed(SeedArgs),
    /// Record OTLP/JSON files into a new session
    Capture(CaptureArgs),
    /// Inspect and manage stored sessions
    #[command(subcommand)]
    Sessions(SessionsCommand),
    /// Replay a session to an OTLP/HTTP endpoint
    Replay(ReplayArgs),
    /// Write a session's stored payloads to a directory
    Export(ExportArgs),
}

#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Generation pattern
    #[arg(long, default_value = "basic-topology")]
    pub pattern: String,

    /// Run length, e.g. `30s`
    #[arg(long, value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Traces per second
    #[arg(long)]
    pub rate: Option<f64>,

    /// Probability of a span failing
    #[arg(long)]
    pub error_rate: Option<f64>,

    /// Fixed run seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Label recorded in the session description, as `key=value`
    #[arg(long = "label", value_parser = parse_label)]
    pub labels: Vec<(String, String)>,

    /// Generate without storing anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Id of the new session
    #[arg(long)]
    pub session_id: String,

    /// Signal contained in the files
    #[arg(long, default_value = "traces")]
    pub signal: SignalType,

    /// Free-form session description
    #[arg(long)]
    pub description: Option<String>,

    /// Store payloads uncompressed
    #[arg(long)]
    pub no_compression: bool,

    /// OTLP/JSON files, captured in the given order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum SessionsCommand {
    /// List completed sessions
    List(ListArgs),
    /// Show a session's metadata and data files
    Show {
        /// Session id
        id: String,
    },
    /// Delete a session and all its data
    Delete {
        /// Session id
        id: String,
    },
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Only sessions of this type (seed, training, capture)
    #[arg(long = "type")]
    pub session_type: Option<SessionType>,

    /// Minimum number of captured payloads
    #[arg(long)]
    pub min_size: Option<u64>,

    /// Maximum number of captured payloads
    #[arg(long)]
    pub max_size: Option<u64>,
}

impl ListArgs {
    fn filter(&self) -> Option<SessionFilter> {
        if self.session_type.is_none() && self.min_size.is_none() && self.max_size.is_none() {
            return None;
        }
        Some(SessionFilter {
            session_type: self.session_type,
            min_size: self.min_size,
            max_size: self.max_size,
            ..Default::default()
        })
    }
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Session to replay
    #[arg(conflicts_with = "strategy")]
    pub session_id: Option<String>,

    /// Pick a session instead (latest, random, largest, smallest)
    #[arg(long)]
    pub strategy: Option<SelectionStrategy>,

    #[command(flatten)]
    pub filter: ListArgs,

    /// OTLP/HTTP endpoint
    #[arg(long, env = "OTLP_RECORDER_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Timestamp rewrite: none, relative or current
    #[arg(long, default_value = "relative")]
    pub timestamps: TimestampAdjustment,

    /// Replay speed multiplier
    #[arg(long)]
    pub speed: Option<f64>,

    /// Per-request timeout, e.g. `5s`
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    #[arg(long)]
    pub no_traces: bool,

    #[arg(long)]
    pub no_metrics: bool,

    #[arg(long)]
    pub no_logs: bool,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Session id
    pub id: String,

    /// Signal to export
    #[arg(long, default_value = "traces")]
    pub signal: SignalType,

    /// Output directory
    #[arg(long)]
    pub out: PathBuf,
}

fn parse_label(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got {:?}", raw))
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration: flags override the config file, which overrides
    /// defaults. An explicit `--config` must exist.
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let config_path = match &self.config {
            Some(path) => Some(path.clone()),
            None => dirs::config_dir()
                .map(|dir| dir.join("otlp-recorder").join("config.yaml"))
                .filter(|path| path.exists()),
        };

        if let Some(path) = config_path {
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => builder = builder.from_yaml(&content)?,
                Err(e) if self.config.is_some() => {
                    return Err(RecorderError::config(format!(
                        "Failed to read config file {:?}: {}",
                        path, e
                    )));
                },
                Err(_) => {},
            }
        }

        self.build_config_from_args(builder)
    }

    fn build_config_from_args(&self, mut builder: ConfigBuilder) -> Result<Config> {
        if let Some(dir) = &self.data_dir {
            builder = builder.data_dir(dir.clone());
        }
        if let Command::Replay(args) = &self.command {
            if let Some(endpoint) = &args.endpoint {
                builder = builder.endpoint(endpoint.clone());
            }
            if let Some(timeout) = args.timeout {
                builder = builder.request_timeout(timeout);
            }
            if let Some(speed) = args.speed {
                builder = builder.speed_multiplier(speed);
            }
        }

        builder.debug(self.debug).build()
    }

    /// Initialize logging from the resolved configuration.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let env_log_level = std::env::var("OTLP_RECORDER_LOG_LEVEL").ok();
        let log_level = log_level(config, env_log_level.as_deref());
        let logging = &config.logging;

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let fmt_layer = if logging.structured {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .compact()
        } else {
            tracing_subscriber::fmt::layer().with_target(false).compact()
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| RecorderError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Debug mode wins over `OTLP_RECORDER_LOG_LEVEL`, which wins over the
/// configured level.
fn log_level<'a>(config: &'a Config, env_level: Option<&'a str>) -> &'a str {
    if config.debug {
        "debug"
    } else {
        env_level.unwrap_or(config.logging.level.as_str())
    }
}

/// Execute the parsed command.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;
    cli.init_logging(&config)?;

    if let Command::Patterns = cli.command {
        list_patterns();
        return Ok(());
    }

    tracing::debug!("Using data directory {:?}", config.storage.data_dir);

    let store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(config.storage.data_dir.clone()));
    if !store.health_check().await {
        return Err(RecorderError::storage(format!(
            "Data directory {:?} is not writable",
            config.storage.data_dir
        )));
    }

    match cli.command {
        Command::Patterns => Ok(()),
        Command::Seed(args) => seed(&config, store, args).await,
        Command::Capture(args) => capture(&config, store, args).await,
        Command::Sessions(command) => sessions(store, command).await,
        Command::Replay(args) => replay(&config, store, args).await,
        Command::Export(args) => export(store, args).await,
    }
}

fn list_patterns() {
    for pattern in PatternRegistry::with_defaults().list() {
        println!("{:<20} {:<8} {}", pattern.name, pattern.version, pattern.description);
    }
}

async fn seed(config: &Config, store: Arc<dyn BlobStore>, args: SeedArgs) -> Result<()> {
    let capture = Arc::new(CaptureService::new(store));
    let generator = SeedGenerator::new(capture, PatternRegistry::with_defaults());

    let mut seed_config = SeedConfig::from_defaults(args.pattern, &config.seed);
    if let Some(duration) = args.duration {
        seed_config.duration = duration;
    }
    if let Some(rate) = args.rate {
        seed_config.traces_per_second = rate;
    }
    if let Some(error_rate) = args.error_rate {
        seed_config.error_rate = error_rate;
    }
    seed_config.seed = args.seed;
    seed_config.capture = !args.dry_run;
    seed_config.metadata = args.labels.into_iter().collect::<BTreeMap<_, _>>();

    let session = generator.generate_seed(seed_config).await?;
    if args.dry_run {
        println!("Dry run, nothing stored:");
    }
    print_session(&session);
    Ok(())
}

async fn capture(config: &Config, store: Arc<dyn BlobStore>, args: CaptureArgs) -> Result<()> {
    let service = CaptureService::new(store);

    let mut capture_config = CaptureConfig::new(args.session_id.clone());
    capture_config.created_by = config.capture.created_by.clone();
    capture_config.compression_enabled = config.capture.compression_enabled && !args.no_compression;
    capture_config.description = args.description;
    service.start_capture(capture_config).await?;

    for path in &args.files {
        let result = match tokio::fs::read(path).await {
            Ok(data) => service
                .capture_otlp_data(&args.session_id, Bytes::from(data), args.signal)
                .await,
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(Some(reference)) => println!("{} -> {} ({} bytes)", path.display(), reference.key, reference.size_bytes),
            Ok(None) => println!("{} skipped", path.display()),
            Err(e) => {
                if let Err(close_err) = service.fail_capture(&args.session_id).await {
                    tracing::warn!("Could not close session {}: {}", args.session_id, close_err);
                }
                return Err(e);
            },
        }
    }

    let session = service.stop_capture(&args.session_id).await?;
    print_session(&session);
    Ok(())
}

async fn sessions(store: Arc<dyn BlobStore>, command: SessionsCommand) -> Result<()> {
    let manager = SessionManager::new(store);

    match command {
        SessionsCommand::List(args) => {
            let sessions = manager.list_sessions(args.filter().as_ref()).await?;
            if sessions.is_empty() {
                println!("No sessions found");
            }
            for session in sessions {
                println!(
                    "{:<40} {:<9} {:>8} records {:>10} bytes  {}",
                    session.session_id,
                    format!("{:?}", session.session_type()).to_lowercase(),
                    session.total_records(),
                    session.total_size_bytes,
                    session.start_time.to_rfc3339()
                );
            }
        },
        SessionsCommand::Show { id } => {
            let session = manager.get_session(&id).await?;
            print_session(&session);
            for file in manager.list_data_files(&id, None).await? {
                println!("  {}", file.key);
            }
        },
        SessionsCommand::Delete { id } => {
            let deleted = manager.delete_session(&id).await?;
            println!("Deleted {} ({} objects)", id, deleted);
        },
    }
    Ok(())
}

async fn replay(config: &Config, store: Arc<dyn BlobStore>, args: ReplayArgs) -> Result<()> {
    let service = ReplayService::from_config(store, &config.replay)?;

    let target = match args.session_id {
        Some(session_id) => ReplayTarget::Session(session_id),
        None => ReplayTarget::Select {
            strategy: args.strategy.unwrap_or_default(),
            filter: args.filter.filter(),
        },
    };
    let replay_config = ReplayConfig {
        target,
        replay_traces: !args.no_traces,
        replay_metrics: !args.no_metrics,
        replay_logs: !args.no_logs,
        timestamp_adjustment: args.timestamps,
        speed_multiplier: config.replay.speed_multiplier,
        target_endpoint: config.replay.endpoint.clone(),
    };

    let started = service.start_replay(replay_config).await?;
    println!(
        "Replaying {} ({} records) to {}",
        started.session_id, started.total_records, config.replay.endpoint
    );

    let status = loop {
        tokio::time::sleep(REPLAY_POLL_INTERVAL).await;
        let status = service.get_replay_status(&started.session_id)?;
        tracing::debug!(
            "Replay {}: {}/{} {}",
            status.session_id,
            status.processed_records,
            status.total_records,
            status.current_file.as_deref().unwrap_or("")
        );
        if status.status.is_terminal() {
            break status;
        }
    };

    println!(
        "Replay {:?}: {} processed, {} failed",
        status.status, status.processed_records, status.failed_records
    );
    if status.status == ReplayState::Failed {
        return Err(RecorderError::ingestion(
            None,
            status.error.unwrap_or_else(|| "replay failed".to_string()),
        ));
    }
    Ok(())
}

async fn export(store: Arc<dyn BlobStore>, args: ExportArgs) -> Result<()> {
    let service = ReplayService::new(store, crate::replay::ReplayHttpClient::new()?);
    service.session_manager().get_session(&args.id).await?;
    tokio::fs::create_dir_all(&args.out).await?;

    let mut chunks = service.replay_data_stream(&args.id, args.signal);
    let mut written = 0usize;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        let payload = if compression::is_gzip(&chunk) {
            compression::decompress_async(chunk).await?
        } else {
            chunk.to_vec()
        };
        let path = args.out.join(format!("{}-{:05}.json", args.signal, written));
        tokio::fs::write(&path, payload).await?;
        written += 1;
    }

    println!("Exported {} {} files to {}", written, args.signal, args.out.display());
    Ok(())
}

fn print_session(session: &CaptureSession) {
    println!("Session {}", session.session_id);
    println!("  status:   {:?}", session.status);
    println!("  started:  {}", session.start_time.to_rfc3339());
    if let Some(end) = session.end_time {
        println!("  ended:    {}", end.to_rfc3339());
    }
    println!(
        "  captured: {} traces, {} metrics, {} logs ({} bytes)",
        session.captured_traces, session.captured_metrics, session.captured_logs, session.total_size_bytes
    );
    if let Some(description) = &session.description {
        println!("  {}", description);
    }
}
