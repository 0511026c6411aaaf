//! Logweave CLI
//!
//! Thin wrapper around logweave-core for trying out a logging setup from the
//! command line.
//!
//! ## Usage
//!
//! ```bash
//! # Write one sample record per severity using a TOML settings file
//! logweave emit --config logging.toml
//!
//! # Same, overriding where the files go
//! logweave emit --config logging.toml --log-dir /tmp/logs --name api
//!
//! # Close the files and exit with a chosen status
//! logweave emit --log-dir /tmp/logs --exit-code 3
//!
//! # Report a fatal error and exit with status 1
//! logweave fail --log-dir /tmp/logs --message "disk on fire"
//!
//! # Print the effective settings and resolved log directory
//! logweave config --config logging.toml
//!
//! # Run a retention sweep over one channel folder
//! logweave sweep /var/log/app --prefix api --channel error --min-size 0
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use logweave_core::{
    create_logger, ChannelLayer, ErrorValue, FileSinkConfig, LogError, LogPart, LoggerHandle,
    LoggerSettings, RetentionPolicy, Severity, Sweep,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter, Registry};

/// Slot for the file-channel layer, filled once the logger exists.
type ChannelSlot = reload::Handle<Option<ChannelLayer>, Registry>;

/// Logweave - routed console and rotating file logging
#[derive(Parser)]
#[command(name = "logweave")]
#[command(version = "0.1.0")]
#[command(about = "Logweave - routed console and rotating file logging")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write one sample record per severity through a configured logger
    Emit {
        /// TOML settings file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the log directory
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Override the logger name
        #[arg(long)]
        name: Option<String>,

        /// Trace id attached to every sample record
        #[arg(long)]
        trace_id: Option<String>,

        /// Text of the sample records
        #[arg(short, long, default_value = "sample record")]
        message: String,

        /// Disable console output
        #[arg(short, long)]
        quiet: bool,

        /// Close the files and exit with this status instead of returning
        #[arg(long)]
        exit_code: Option<i32>,
    },

    /// Log a record, then report a fatal error and exit with status 1
    Fail {
        /// TOML settings file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the log directory
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Override the logger name
        #[arg(long)]
        name: Option<String>,

        /// Message of the fatal error
        #[arg(short, long, default_value = "unrecoverable failure")]
        message: String,

        /// Report the message as plain text rather than an error value
        #[arg(long)]
        plain: bool,
    },

    /// Print the effective settings
    Config {
        /// TOML settings file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Remove stale or undersized log files from one channel folder
    Sweep {
        /// Base log directory
        dir: PathBuf,

        /// File prefix (usually the logger name)
        #[arg(short, long)]
        prefix: String,

        /// Channel whose files are swept
        #[arg(long, default_value = "info")]
        channel: String,

        /// Files at or below this many bytes are removed
        #[arg(long, default_value_t = 0)]
        min_size: u64,

        /// Files older than this many seconds are removed
        #[arg(long)]
        max_lifetime_secs: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let channel_slot = setup_logging(cli.verbose);

    match cli.command {
        Commands::Emit {
            config,
            log_dir,
            name,
            trace_id,
            message,
            quiet,
            exit_code,
        } => {
            let mut settings = load_settings(config.as_deref())?;
            if quiet {
                settings.console = false;
            }
            let settings = apply_overrides(settings, config.is_none(), log_dir, name);
            let handle = start_logger(settings, &channel_slot)?;

            let logger = match trace_id {
                Some(id) => handle.logger.with_trace_id(id),
                None => handle.logger.clone(),
            };
            for severity in Severity::ALL {
                let mut parts = vec![LogPart::from(message.as_str())];
                if severity >= Severity::Error {
                    parts.push(LogPart::from(
                        ErrorValue::new("SampleError", format!("{} sample", severity))
                            .with_code(severity.rank()),
                    ));
                }
                logger.log(severity, parts);
            }
            tracing::info!(records = Severity::ALL.len(), "Emitted sample records");

            println!("Log directory: {}", handle.file_sinks.log_dir().display());
            for sink in handle.file_sinks.iter().filter(|s| s.is_active()) {
                println!("  {}: {}", sink.channel(), sink.dir().display());
            }

            if let Some(code) = exit_code {
                handle.shutdown(code);
            }
            handle.close().context("Failed to close log files")?;
        }

        Commands::Fail {
            config,
            log_dir,
            name,
            message,
            plain,
        } => {
            let settings = load_settings(config.as_deref())?;
            let settings = apply_overrides(settings, config.is_none(), log_dir, name);
            let handle = start_logger(settings, &channel_slot)?;

            handle.logger.error(format!("Giving up: {}", message));
            if plain {
                handle.exit_on_error(message)
            } else {
                handle.exit_on_error(ErrorValue::new("FatalError", message))
            }
        }

        Commands::Config { config } => {
            let settings = load_settings(config.as_deref())?;
            let rendered =
                toml::to_string_pretty(&settings).context("Failed to render settings")?;
            println!("{}", rendered.trim_end());
            println!();
            println!("# resolved log directory: {}", settings.resolve_log_dir().display());
        }

        Commands::Sweep {
            dir,
            prefix,
            channel,
            min_size,
            max_lifetime_secs,
        } => {
            let config = FileSinkConfig {
                file_prefix: prefix,
                ..FileSinkConfig::new(channel, dir)
            };
            let pattern = config.file_pattern()?;
            let policy = RetentionPolicy {
                min_size,
                max_lifetime: max_lifetime_secs.map(std::time::Duration::from_secs),
            };
            let channel_dir = config.dir();
            if !channel_dir.is_dir() {
                anyhow::bail!("Not a directory: {}", channel_dir.display());
            }

            let report = Sweep::new(&channel_dir, &pattern, policy).run();
            for path in &report.removed {
                println!("removed {}", path.display());
            }
            for path in &report.failed {
                println!("failed {}", path.display());
            }
            println!("Removed {} file(s)", report.removed.len());
        }
    }

    Ok(())
}

/// Install the stderr subscriber. File channels join later through the
/// returned slot, so warnings raised while they are built still reach stderr.
fn setup_logging(verbosity: u8) -> ChannelSlot {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let (channels, slot) = reload::Layer::new(None::<ChannelLayer>);

    // The verbosity filter only applies to stderr; the file channels get
    // every event and route it themselves.
    tracing_subscriber::registry()
        .with(channels)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .init();
    slot
}

/// Build the logger and attach its file channels to the subscriber.
fn start_logger(settings: LoggerSettings, slot: &ChannelSlot) -> Result<LoggerHandle> {
    let handle = create_logger(settings);
    slot.reload(Some(ChannelLayer::new(handle.logger.clone())))
        .context("Failed to attach file channels")?;
    Ok(handle)
}

/// Command-line overrides on top of the loaded settings.
fn apply_overrides(
    mut settings: LoggerSettings,
    default_routes: bool,
    log_dir: Option<PathBuf>,
    name: Option<String>,
) -> LoggerSettings {
    if let Some(dir) = log_dir {
        settings.log_dir = Some(dir);
    }
    if let Some(name) = name {
        settings.name = name;
    }
    if default_routes {
        settings = with_default_routes(settings);
    }
    settings
}

/// Settings from a TOML file, or the defaults.
fn load_settings(path: Option<&Path>) -> Result<LoggerSettings> {
    let Some(path) = path else {
        return Ok(LoggerSettings::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str::<LoggerSettings>(&text)
        .map_err(|e| LogError::Config(e.to_string()))
        .with_context(|| format!("Invalid settings in {}", path.display()))
}

/// Routing used when no settings file is given: info and warn to the main
/// file, error and fatal to the error file.
fn with_default_routes(settings: LoggerSettings) -> LoggerSettings {
    settings
        .route(Severity::Info, "info")
        .route(Severity::Warn, "info")
        .route(Severity::Error, "error")
        .route(Severity::Fatal, "error")
}
