//! Date-rotating file sink for one channel.
//!
//! Files live in the channel directory and are named
//! `{prefix}-{YYYY-MM-DD}.log`. When a file reaches the size cap the same day
//! continues in `{prefix}-{YYYY-MM-DD}.1.log`, `.2.log`, and so on. Files are
//! opened lazily on the first accepted write, so a channel that never writes
//! never leaves an empty file behind.
//!
//! ```text
//! logs/
//! ├── app-2026-01-21.log
//! ├── app-2026-01-21.1.log        # same day, after the size cap
//! ├── audit/
//! │   └── audit-app-2026-01-21.log
//! └── error/
//!     └── error-app-2026-01-21.log
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use regex::Regex;
use tracing::{debug, warn};

use crate::clock::{system_clock, Clock, TimeZoneSetting};
use crate::error::{LogError, LogResult};
use crate::events::{EventEmitter, SinkEvent, SinkEventKind};
use crate::retention::{RetentionPolicy, Sweep, SweepReport};
use crate::router::SeverityMask;
use crate::severity::Severity;

/// Default size cap of one file: 20 MiB.
pub const DEFAULT_MAX_SIZE: u64 = 20 * 1024 * 1024;

/// Name of the channel that gets its own `error/` folder and `error-` prefix.
pub const ERROR_CHANNEL: &str = "error";

/// Name of the channel that writes straight into the base directory.
pub const INFO_CHANNEL: &str = "info";

/// Everything needed to build one channel sink.
#[derive(Clone)]
pub struct FileSinkConfig {
    pub channel: String,
    /// Base log directory; the channel folder is derived from it
    pub base_dir: PathBuf,
    pub file_prefix: String,
    pub max_size: u64,
    pub retention: RetentionPolicy,
    pub time_zone: TimeZoneSetting,
    pub mask: SeverityMask,
}

impl FileSinkConfig {
    pub fn new(channel: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            channel: channel.into(),
            base_dir: base_dir.into(),
            file_prefix: "log".to_string(),
            max_size: DEFAULT_MAX_SIZE,
            retention: RetentionPolicy::default(),
            time_zone: TimeZoneSetting::Utc,
            mask: SeverityMask::empty(),
        }
    }

    /// Directory holding this channel's files: the base directory for `info`,
    /// a sub-folder named after the channel otherwise.
    pub fn dir(&self) -> PathBuf {
        if self.channel == INFO_CHANNEL {
            self.base_dir.clone()
        } else {
            self.base_dir.join(&self.channel)
        }
    }

    /// File name stem without the date: `app`, `error-app`, `audit-app`.
    pub fn base_name(&self) -> String {
        if self.channel == INFO_CHANNEL {
            self.file_prefix.clone()
        } else {
            format!("{}-{}", self.channel, self.file_prefix)
        }
    }

    /// Pattern matching every file this channel can produce; group 1 is the date.
    pub fn file_pattern(&self) -> LogResult<Regex> {
        let re = format!(
            r"^{}-(\d{{4}}-\d{{2}}-\d{{2}})(?:\.\d+)?\.log$",
            regex::escape(&self.base_name())
        );
        Ok(Regex::new(&re)?)
    }
}

struct ActiveFile {
    path: PathBuf,
    date: String,
    index: u32,
    size: u64,
    writer: BufWriter<File>,
}

#[derive(Default)]
struct SinkState {
    active: Option<ActiveFile>,
    closed: bool,
}

/// Rotating file writer for one channel.
///
/// A sink whose mask is empty, or whose directory could not be created, is
/// inert: every write is discarded.
pub struct FileSink {
    channel: String,
    dir: PathBuf,
    base_name: String,
    mask: SeverityMask,
    pattern: Option<Regex>,
    retention: RetentionPolicy,
    max_size: u64,
    time_zone: TimeZoneSetting,
    emitter: Option<Arc<dyn EventEmitter>>,
    clock: Clock,
    state: Mutex<SinkState>,
}

impl FileSink {
    /// Build a sink. Never fails: misconfiguration yields an inert sink and a
    /// warning.
    pub fn create(config: FileSinkConfig, emitter: Option<Arc<dyn EventEmitter>>) -> Self {
        Self::with_clock(config, emitter, system_clock())
    }

    /// Build a sink that reads time from `clock`.
    pub fn with_clock(
        config: FileSinkConfig,
        emitter: Option<Arc<dyn EventEmitter>>,
        clock: Clock,
    ) -> Self {
        let dir = config.dir();
        let mut sink = Self {
            channel: config.channel.clone(),
            base_name: config.base_name(),
            mask: config.mask,
            pattern: None,
            retention: config.retention,
            max_size: config.max_size.max(1),
            time_zone: config.time_zone,
            emitter,
            clock,
            state: Mutex::new(SinkState::default()),
            dir,
        };

        if sink.mask.is_empty() {
            warn!(channel = %sink.channel, "File channel receives no severities; it stays inert");
            return sink;
        }

        match sink.prepare(&config) {
            Ok(pattern) => {
                sink.pattern = Some(pattern);
                sink.remove_empty_logs();
            }
            Err(e) => {
                warn!(channel = %sink.channel, error = %e, "File channel disabled");
                sink.mask = SeverityMask::empty();
            }
        }
        sink
    }

    fn prepare(&self, config: &FileSinkConfig) -> LogResult<Regex> {
        fs::create_dir_all(&self.dir).map_err(|source| LogError::CreateDirectory {
            path: self.dir.clone(),
            source,
        })?;
        config.file_pattern()
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn mask(&self) -> SeverityMask {
        self.mask
    }

    pub fn min_size(&self) -> u64 {
        self.retention.min_size
    }

    /// Whether writes can ever reach disk.
    pub fn is_active(&self) -> bool {
        !self.mask.is_empty()
    }

    #[inline]
    pub fn accepts(&self, severity: Severity) -> bool {
        self.mask.contains(severity)
    }

    /// File currently open for writing, if any.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.state.lock().active.as_ref().map(|a| a.path.clone())
    }

    /// Write one line. Dropped if the channel does not accept `severity`.
    /// I/O failures are logged and never returned.
    pub fn write(&self, severity: Severity, message: &str) {
        if !self.accepts(severity) {
            return;
        }
        let now = (self.clock)();
        let line = format!(
            "{}\t{}\t{}\n",
            self.time_zone.timestamp(now),
            severity.label(),
            message
        );
        let date = self.time_zone.file_date(now);

        // Events are dispatched after the lock is released so that sweeping
        // and emitter callbacks never run while holding the file.
        let events = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            match self.write_locked(&mut state, &date, line.as_bytes()) {
                Ok(events) => events,
                Err(e) => {
                    warn!(channel = %self.channel, error = %e, "Failed to write log line");
                    state.active = None;
                    Vec::new()
                }
            }
        };
        for event in events {
            self.dispatch(&event);
        }
    }

    fn write_locked(
        &self,
        state: &mut SinkState,
        date: &str,
        line: &[u8],
    ) -> std::io::Result<Vec<SinkEvent>> {
        let mut events = Vec::new();
        let len = line.len() as u64;

        let needs_switch = match &state.active {
            None => true,
            Some(active) => active.date != date || (active.size > 0 && active.size + len > self.max_size),
        };

        if needs_switch {
            let previous = state.active.take();
            let start_index = match &previous {
                Some(prev) if prev.date == date => prev.index + 1,
                _ => 0,
            };
            let previous_path = match previous {
                Some(mut prev) => {
                    prev.writer.flush()?;
                    Some(prev.path)
                }
                None => None,
            };
            let (next, created) = self.open(date, start_index, len)?;
            if let Some(prev_path) = previous_path {
                events.push(self.event(SinkEventKind::Rotate, Some(&next.path), Some(prev_path)));
            }
            if created {
                events.push(self.event(SinkEventKind::New, Some(&next.path), None));
            }
            state.active = Some(next);
        }

        if let Some(active) = state.active.as_mut() {
            active.writer.write_all(line)?;
            active.writer.flush()?;
            active.size += len;
        }
        Ok(events)
    }

    /// Open the first file for `date` at or after `index` that has room for
    /// `incoming` bytes (an empty file always has room).
    fn open(&self, date: &str, mut index: u32, incoming: u64) -> std::io::Result<(ActiveFile, bool)> {
        loop {
            let path = self.dir.join(self.file_name(date, index));
            let existing = match fs::metadata(&path) {
                Ok(meta) => Some(meta.len()),
                Err(_) => None,
            };
            if let Some(size) = existing {
                if size > 0 && size + incoming > self.max_size {
                    index += 1;
                    continue;
                }
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            debug!(channel = %self.channel, path = %path.display(), "Opened log file");
            let active = ActiveFile {
                path,
                date: date.to_string(),
                index,
                size: existing.unwrap_or(0),
                writer: BufWriter::new(file),
            };
            return Ok((active, existing.is_none()));
        }
    }

    fn file_name(&self, date: &str, index: u32) -> String {
        if index == 0 {
            format!("{}-{}.log", self.base_name, date)
        } else {
            format!("{}-{}.{}.log", self.base_name, date, index)
        }
    }

    fn event(&self, kind: SinkEventKind, path: Option<&Path>, previous: Option<PathBuf>) -> SinkEvent {
        SinkEvent {
            channel: self.channel.clone(),
            kind,
            path: path.map(Path::to_path_buf),
            previous,
        }
    }

    fn dispatch(&self, event: &SinkEvent) {
        if let Some(emitter) = &self.emitter {
            emitter.emit(&event.name(), event);
        }
        if matches!(event.kind, SinkEventKind::New | SinkEventKind::Rotate) {
            self.remove_empty_logs();
        }
    }

    /// Run the retention sweep over this channel's directory, skipping the
    /// file currently open. Ages are measured against the sink's clock.
    pub fn remove_empty_logs(&self) -> SweepReport {
        self.remove_empty_logs_at(SystemTime::from((self.clock)()))
    }

    /// Sweep as if the current time were `now`.
    pub fn remove_empty_logs_at(&self, now: SystemTime) -> SweepReport {
        let Some(pattern) = &self.pattern else {
            return SweepReport::default();
        };
        let current = self.current_path();
        Sweep::new(&self.dir, pattern, self.retention)
            .excluding(current.as_deref())
            .run_at(now)
    }

    /// Flush buffered bytes without closing.
    pub fn flush(&self) -> LogResult<()> {
        if let Some(active) = self.state.lock().active.as_mut() {
            active.writer.flush()?;
        }
        Ok(())
    }

    /// Flush and close the current file. Later writes are discarded. Emits a
    /// `finish` event once the file is closed.
    pub fn close(&self) -> LogResult<()> {
        let last_path = {
            let mut state = self.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            match state.active.take() {
                Some(mut active) => {
                    active.writer.flush()?;
                    active.writer.get_ref().sync_all()?;
                    Some(active.path)
                }
                None => None,
            }
        };
        debug!(channel = %self.channel, "Closed file channel");
        let event = self.event(SinkEventKind::Finish, last_path.as_deref(), None);
        if let Some(emitter) = &self.emitter {
            emitter.emit(&event.name(), &event);
        }
        Ok(())
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink")
            .field("channel", &self.channel)
            .field("dir", &self.dir)
            .field("mask", &self.mask)
            .finish()
    }
}
