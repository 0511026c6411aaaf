//! Logweave Core Library
//!
//! Structured logging facade with severity routing, colorized console output
//! and date/size-rotating file channels with retention.
//!
//! ## Overview
//!
//! A logger is built once from [`LoggerSettings`]. Each of the seven
//! severities (`silly` < `trace` < `debug` < `info` < `warn` < `error` <
//! `fatal`) is routed to the console and to zero or more named file
//! channels. `info` writes into the base log directory; every other channel
//! gets its own sub-folder. Files rotate daily and on a size cap, and a
//! retention sweep removes near-empty or expired files.
//!
//! ## Core Principles
//!
//! - **Never fail the caller**: logging calls return nothing; I/O problems
//!   are reported through `tracing` and degrade the affected channel
//! - **Bounded output**: error values are normalized so no field can grow a
//!   log line without limit
//! - **Ordered shutdown**: channels close one after another before exit
//!
//! ## Quick Start
//!
//! ```ignore
//! use logweave_core::{create_logger, ErrorValue, LoggerSettings, Severity};
//!
//! let settings = LoggerSettings::named("billing")
//!     .route(Severity::Info, "info")
//!     .route(Severity::Error, "error")
//!     .route(Severity::Fatal, "error");
//! let handle = create_logger(settings);
//!
//! handle.logger.info("service started");
//! handle
//!     .logger
//!     .with_trace_id("req-7")
//!     .error(ErrorValue::new("PaymentError", "card declined"));
//!
//! handle.shutdown(0);
//! ```

pub mod clock;
pub mod error;
pub mod events;
pub mod facade;
pub mod layer;
pub mod normalize;
pub mod record;
pub mod retention;
pub mod router;
pub mod settings;
pub mod severity;
pub mod sink;
pub mod trace;

// Re-exports
pub use clock::{fixed_clock, system_clock, Clock, TimeZoneSetting};
pub use error::{LogError, LogResult};
pub use events::{EventEmitter, FnEmitter, SinkEvent, SinkEventKind};
pub use facade::{create_logger, file_message, FileSinks, Logger, LoggerBuilder, LoggerHandle};
pub use layer::ChannelLayer;
pub use normalize::{normalize, to_error, NormalizeOptions, Normalized, NormalizedError};
pub use record::{ErrorValue, LogPart, LogRecord};
pub use retention::{sweep, RetentionPolicy, Sweep, SweepReport};
pub use router::{ChannelTargets, RoutingTable, SeverityMask};
pub use settings::{ByteSize, ChannelOverrides, LoggerSettings};
pub use severity::Severity;
pub use sink::{
    ConsoleLine, ConsoleSink, FileSink, FileSinkConfig, SharedBuffer, StyleTable, DEFAULT_MAX_SIZE,
    DEFAULT_TEMPLATE, ERROR_CHANNEL, INFO_CHANNEL,
};
pub use trace::{TraceColors, TraceProvider};
