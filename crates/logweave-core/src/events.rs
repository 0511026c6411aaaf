//! Notifications about file lifecycle, fanned out to an external emitter.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::broadcast;

/// What happened to a channel's file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkEventKind {
    /// A file was created
    New,
    /// Writing moved to a new file (new day or size cap reached)
    Rotate,
    /// The channel was flushed and closed
    Finish,
}

impl fmt::Display for SinkEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SinkEventKind::New => "new",
            SinkEventKind::Rotate => "rotate",
            SinkEventKind::Finish => "finish",
        })
    }
}

/// Payload of a channel event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkEvent {
    pub channel: String,
    pub kind: SinkEventKind,
    /// The file now being written (or the last one, on finish)
    pub path: Option<PathBuf>,
    /// The file written before a rotation
    pub previous: Option<PathBuf>,
}

impl SinkEvent {
    /// Event name in `{channel}-log-{kind}` form, e.g. `error-log-rotate`.
    pub fn name(&self) -> String {
        format!("{}-log-{}", self.channel, self.kind)
    }
}

/// Receiver of channel events. Implementations must not block.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, name: &str, event: &SinkEvent);
}

impl EventEmitter for broadcast::Sender<SinkEvent> {
    fn emit(&self, _name: &str, event: &SinkEvent) {
        // No subscribers is fine
        let _ = self.send(event.clone());
    }
}

/// Adapts a closure into an [`EventEmitter`].
pub struct FnEmitter<F>(pub F);

impl<F> EventEmitter for FnEmitter<F>
where
    F: Fn(&str, &SinkEvent) + Send + Sync,
{
    fn emit(&self, name: &str, event: &SinkEvent) {
        (self.0)(name, event)
    }
}
