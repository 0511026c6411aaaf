//! The logger facade: one entry point that wires routing, normalization,
//! console output and file channels together.
//!
//! ## Usage
//!
//! ```ignore
//! use logweave_core::{create_logger, LoggerSettings, Severity};
//!
//! let settings = LoggerSettings::named("billing")
//!     .route(Severity::Info, "info")
//!     .route(Severity::Error, "error");
//! let handle = create_logger(settings);
//!
//! handle.logger.info("service started");
//! handle.logger.with_trace_id("req-7").error(err_value);
//!
//! handle.shutdown(0);
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::clock::{system_clock, Clock, TimeZoneSetting};
use crate::error::LogResult;
use crate::events::EventEmitter;
use crate::normalize::{normalize, to_error, NormalizeOptions, Normalized, NormalizedError};
use crate::record::{LogPart, LogRecord};
use crate::router::RoutingTable;
use crate::settings::LoggerSettings;
use crate::severity::Severity;
use crate::sink::{ConsoleLine, ConsoleSink, FileSink, FileSinkConfig, StyleTable, ERROR_CHANNEL, INFO_CHANNEL};
use crate::trace::{TraceColors, TraceProvider};

/// The file channels of a logger, in construction order.
#[derive(Debug)]
pub struct FileSinks {
    log_dir: PathBuf,
    sinks: Vec<FileSink>,
}

impl FileSinks {
    /// Resolved base log directory.
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn get(&self, channel: &str) -> Option<&FileSink> {
        self.sinks.iter().find(|s| s.channel() == channel)
    }

    pub fn info(&self) -> Option<&FileSink> {
        self.get(INFO_CHANNEL)
    }

    pub fn error(&self) -> Option<&FileSink> {
        self.get(ERROR_CHANNEL)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileSink> {
        self.sinks.iter()
    }

    /// Close every channel, one after another: `info`, then `error`, then the
    /// rest. Each close completes (flush, sync, finish event) before the next
    /// starts. All channels are attempted; the first error is returned.
    pub fn close_all(&self) -> LogResult<()> {
        let mut order: Vec<&FileSink> = Vec::with_capacity(self.sinks.len());
        order.extend(self.info());
        order.extend(self.error());
        order.extend(
            self.sinks
                .iter()
                .filter(|s| s.channel() != INFO_CHANNEL && s.channel() != ERROR_CHANNEL),
        );
        let mut first_err = None;
        for sink in order {
            if let Err(e) = sink.close() {
                warn!(channel = %sink.channel(), error = %e, "Failed to close file channel");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn flush_all(&self) {
        for sink in &self.sinks {
            let _ = sink.flush();
        }
    }
}

/// Per-severity routing decision, fixed at construction.
#[derive(Debug, Clone, Default)]
struct Route {
    console: bool,
    channels: Vec<usize>,
}

struct LoggerInner {
    name: String,
    display_name: bool,
    min_level: Severity,
    time_zone: TimeZoneSetting,
    console: Option<ConsoleSink>,
    files: Arc<FileSinks>,
    dispatch: [Route; 7],
    trace_provider: Option<TraceProvider>,
    trace_colors: TraceColors,
    clock: Clock,
}

/// Cheap-to-clone logging handle. Clones share sinks; a clone made with
/// [`Logger::with_trace_id`] tags every line with that id.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
    trace_id: Option<Arc<str>>,
}

impl Logger {
    /// Child logger bound to a correlation id.
    pub fn with_trace_id(&self, trace_id: impl Into<String>) -> Logger {
        Logger {
            inner: self.inner.clone(),
            trace_id: Some(Arc::from(trace_id.into())),
        }
    }

    /// The logger's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether a record of `severity` goes anywhere.
    pub fn is_enabled(&self, severity: Severity) -> bool {
        let route = &self.inner.dispatch[severity.rank() as usize];
        route.console || !route.channels.is_empty()
    }

    pub fn files(&self) -> &Arc<FileSinks> {
        &self.inner.files
    }

    fn current_trace_id(&self) -> Option<String> {
        match &self.trace_id {
            Some(id) => Some(id.to_string()),
            None => self.inner.trace_provider.as_ref().and_then(|p| p()),
        }
    }

    /// Log a record made of several parts.
    pub fn log<I>(&self, severity: Severity, parts: I)
    where
        I: IntoIterator<Item = LogPart>,
    {
        let route = &self.inner.dispatch[severity.rank() as usize];
        if !route.console && route.channels.is_empty() {
            return;
        }
        let record = LogRecord::new(severity, (self.inner.clock)(), parts.into_iter().collect())
            .with_trace_id(self.current_trace_id());
        if route.console {
            self.write_console(&record);
        }
        if !route.channels.is_empty() {
            self.write_channels(&record, &route.channels);
        }
    }

    pub fn silly(&self, part: impl Into<LogPart>) {
        self.log(Severity::Silly, [part.into()]);
    }

    pub fn trace(&self, part: impl Into<LogPart>) {
        self.log(Severity::Trace, [part.into()]);
    }

    pub fn debug(&self, part: impl Into<LogPart>) {
        self.log(Severity::Debug, [part.into()]);
    }

    pub fn info(&self, part: impl Into<LogPart>) {
        self.log(Severity::Info, [part.into()]);
    }

    pub fn warn(&self, part: impl Into<LogPart>) {
        self.log(Severity::Warn, [part.into()]);
    }

    pub fn error(&self, part: impl Into<LogPart>) {
        self.log(Severity::Error, [part.into()]);
    }

    pub fn fatal(&self, part: impl Into<LogPart>) {
        self.log(Severity::Fatal, [part.into()]);
    }

    /// Write a record to its file channels only. Used by the `tracing` bridge,
    /// where console output belongs to the subscriber's own formatter.
    pub fn log_to_files(&self, record: &LogRecord) {
        let route = &self.inner.dispatch[record.severity.rank() as usize];
        if !route.channels.is_empty() {
            self.write_channels(record, &route.channels);
        }
    }

    fn write_console(&self, record: &LogRecord) {
        let Some(console) = &self.inner.console else {
            return;
        };
        let message = console_message(record);
        let timestamp = self.inner.time_zone.timestamp(record.timestamp);
        let trace = record
            .trace_id
            .as_deref()
            .map(|id| (id, self.inner.trace_colors.color_for(id)));
        console.write_line(&ConsoleLine {
            timestamp: &timestamp,
            severity: record.severity,
            name: self.inner.display_name.then_some(self.inner.name.as_str()),
            trace,
            message: &message,
        });
    }

    fn write_channels(&self, record: &LogRecord, channels: &[usize]) {
        let mut message = file_message(&record.parts);
        if message.is_empty() {
            return;
        }
        if let Some(trace_id) = &record.trace_id {
            message = format!("[{}] {}", trace_id, message);
        }
        for &index in channels {
            self.inner.files.sinks[index].write(record.severity, &message);
        }
    }

    /// Print `err` as an error and terminate the process with exit code 1.
    /// Non-error values are turned into errors first.
    pub fn exit_on_error(&self, err: impl Into<LogPart>) -> ! {
        self.report_fatal(err);
        self.inner.files.flush_all();
        if let Some(console) = &self.inner.console {
            console.flush();
        }
        std::process::exit(1)
    }

    /// The printing half of [`Logger::exit_on_error`]: normalizes `err` into
    /// an error, writes it to stderr and returns it.
    pub fn report_fatal(&self, err: impl Into<LogPart>) -> NormalizedError {
        let err = to_error(&err.into());
        eprintln!("{}", err.to_pretty());
        err
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.inner.name)
            .field("min_level", &self.inner.min_level)
            .field("trace_id", &self.trace_id)
            .finish()
    }
}

/// Console text for a record. At error severity and above every part goes
/// through the normalizer, so malformed or huge values cannot break the line.
fn console_message(record: &LogRecord) -> String {
    let force_errors = record.severity >= Severity::Error;
    record
        .parts
        .iter()
        .filter(|p| !p.is_blank())
        .map(|part| match part {
            LogPart::Text(s) => s.clone(),
            LogPart::Value(v) if !force_errors => serde_json::to_string_pretty(v).unwrap_or_default(),
            other => normalize(other, NormalizeOptions::default()).to_pretty(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Single-line file text: blank parts dropped, non-text parts reduced to
/// JSON, color escapes stripped, parts joined by spaces.
pub fn file_message(parts: &[LogPart]) -> String {
    let pieces: Vec<String> = parts
        .iter()
        .filter(|p| !p.is_blank())
        .map(|part| match normalize(part, NormalizeOptions::object()) {
            Normalized::Text(s) => s,
            other => other.to_line(),
        })
        .map(|s| strip_ansi(&s).trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    pieces.join(" ")
}

fn strip_ansi(s: &str) -> std::borrow::Cow<'_, str> {
    use std::sync::OnceLock;
    static ANSI: OnceLock<regex::Regex> = OnceLock::new();
    let re = ANSI.get_or_init(|| regex::Regex::new(r"\x1b\[[\d;]*m").expect("static pattern"));
    re.replace_all(s, "")
}

/// What [`create_logger`] returns: the logger, its file channels, and the
/// shutdown path.
#[derive(Debug, Clone)]
pub struct LoggerHandle {
    pub logger: Logger,
    pub file_sinks: Arc<FileSinks>,
}

impl LoggerHandle {
    /// Flush and close all file channels in order (`info`, then `error`, then
    /// the rest). Returns once every channel is closed.
    pub fn close(&self) -> LogResult<()> {
        self.file_sinks.close_all()
    }

    /// Close all channels, then terminate the process with `exit_code`.
    pub fn shutdown(&self, exit_code: i32) -> ! {
        if let Err(e) = self.close() {
            eprintln!("logweave: failed to close log files: {}", e);
        }
        std::process::exit(exit_code)
    }

    /// See [`Logger::exit_on_error`].
    pub fn exit_on_error(&self, err: impl Into<LogPart>) -> ! {
        self.logger.exit_on_error(err)
    }
}

/// Builder for a [`LoggerHandle`] with its external collaborators.
pub struct LoggerBuilder {
    settings: LoggerSettings,
    emitter: Option<Arc<dyn EventEmitter>>,
    trace_provider: Option<TraceProvider>,
    console: Option<ConsoleSink>,
    clock: Clock,
}

impl LoggerBuilder {
    pub fn new(settings: LoggerSettings) -> Self {
        Self {
            settings,
            emitter: None,
            trace_provider: None,
            console: None,
            clock: system_clock(),
        }
    }

    /// Receiver of `{channel}-log-{new,rotate,finish}` events.
    pub fn emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Lookup used for the trace tag when a logger has no bound id.
    pub fn trace_provider(mut self, provider: TraceProvider) -> Self {
        self.trace_provider = Some(provider);
        self
    }

    /// Replace the stdout console (e.g. with an in-memory writer).
    pub fn console(mut self, console: ConsoleSink) -> Self {
        self.console = Some(console);
        self
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Build sinks and the dispatch table. Never fails; configuration
    /// problems are logged and degrade file output.
    pub fn build(self) -> LoggerHandle {
        let settings = self.settings;
        let log_dir = settings.resolve_log_dir();
        let table = RoutingTable::from_map(&settings.channel_map);
        if table.is_empty() {
            warn!(logger = %settings.name, "No severities are routed to file channels; file output disabled");
        }

        // With nothing routed, the single warning above replaces the
        // per-channel ones and no sink is built.
        let sinks: Vec<FileSink> = if table.is_empty() {
            Vec::new()
        } else {
            settings
                .channel_names()
                .into_iter()
                .map(|name| {
                    let params = settings.channel_params(&name);
                    let config = FileSinkConfig {
                        channel: name.clone(),
                        base_dir: log_dir.clone(),
                        file_prefix: settings.file_prefix().to_string(),
                        max_size: params.max_size,
                        retention: params.retention,
                        time_zone: settings.time_zone,
                        mask: table.mask_for(&name),
                    };
                    FileSink::with_clock(config, self.emitter.clone(), self.clock.clone())
                })
                .collect()
        };
        let files = Arc::new(FileSinks { log_dir, sinks });

        let console = if settings.console {
            let styles = StyleTable::default().with_overrides(&settings.level_colors);
            let console = self.console.unwrap_or_else(ConsoleSink::stdout);
            Some(console.with_template(&settings.pretty_template).with_styles(styles))
        } else {
            None
        };

        let dispatch: [Route; 7] = Severity::ALL.map(|severity| {
            if severity < settings.min_level {
                return Route::default();
            }
            Route {
                console: console.is_some(),
                channels: files
                    .sinks
                    .iter()
                    .enumerate()
                    .filter(|(_, sink)| sink.accepts(severity))
                    .map(|(index, _)| index)
                    .collect(),
            }
        });

        let inner = LoggerInner {
            name: settings.name.clone(),
            display_name: settings.display_name,
            min_level: settings.min_level,
            time_zone: settings.time_zone,
            console,
            files: files.clone(),
            dispatch,
            trace_provider: self.trace_provider,
            trace_colors: TraceColors::new(settings.trace_color_cache),
            clock: self.clock,
        };
        LoggerHandle {
            logger: Logger {
                inner: Arc::new(inner),
                trace_id: None,
            },
            file_sinks: files,
        }
    }
}

/// Build a logger from settings with stdout console output and no external
/// collaborators.
pub fn create_logger(settings: LoggerSettings) -> LoggerHandle {
    LoggerBuilder::new(settings).build()
}
