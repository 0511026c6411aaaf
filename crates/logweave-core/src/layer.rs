//! `tracing` Layer that feeds events into a logger's file channels.
//!
//! Console output stays with whatever formatter the subscriber already has;
//! this layer only adds routed, rotating file persistence.
//!
//! ```ignore
//! use tracing_subscriber::prelude::*;
//!
//! let handle = logweave_core::create_logger(settings);
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(ChannelLayer::new(handle.logger.clone()))
//!     .init();
//!
//! tracing::error!(code = 17, "payment declined");
//! tracing::info!(severity = "fatal", "out of disk");
//! ```

use std::fmt::Write as FmtWrite;

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::facade::Logger;
use crate::record::{LogPart, LogRecord};
use crate::severity::Severity;

/// Events from this crate are never forwarded, so diagnostics about the file
/// channels cannot loop back into them.
const OWN_TARGET: &str = "logweave_core";

/// A tracing Layer writing events to the logger's file channels.
pub struct ChannelLayer {
    logger: Logger,
}

impl ChannelLayer {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S> Layer<S> for ChannelLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(OWN_TARGET) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let severity = visitor
            .severity
            .as_deref()
            .map(Severity::from_name_or_default)
            .unwrap_or_else(|| Severity::from(*metadata.level()));

        let mut fields = visitor.fields;
        if let Some(scope) = ctx.event_scope(event) {
            let spans: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
            if !spans.is_empty() {
                fields.insert("span".to_string(), Value::String(spans.join(" > ")));
            }
        }

        let mut parts = vec![LogPart::Text(visitor.message.unwrap_or_default())];
        if !fields.is_empty() {
            parts.push(LogPart::Value(Value::Object(fields)));
        }

        let trace_id = visitor.trace_id;
        let record = LogRecord::new(severity, chrono::Utc::now(), parts).with_trace_id(trace_id);
        self.logger.log_to_files(&record);
    }
}

/// Collects the message, the `severity`/`trace_id` overrides and all other
/// fields of an event.
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    severity: Option<String>,
    trace_id: Option<String>,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn record_value(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }

    fn record_text(&mut self, field: &Field, text: String) {
        match field.name() {
            "message" => self.message = Some(text),
            "severity" => self.severity = Some(text),
            "trace_id" => self.trace_id = Some(text),
            _ => self.record_value(field, Value::String(text)),
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let mut buf = String::new();
        let _ = write!(&mut buf, "{:?}", value);
        self.record_text(field, buf);
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_text(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_value(field, Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_value(field, Value::Number(value.into()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_value(field, Value::Bool(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.record_value(field, Value::Number(n));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record_text(field, value.to_string());
    }
}
