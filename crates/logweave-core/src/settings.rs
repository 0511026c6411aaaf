//! Logger settings and log directory resolution.
//!
//! Settings are plain data. Every field has a default, so a partial config
//! (from a file, or built in code with `..Default::default()`) is merged over
//! the defaults.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::clock::TimeZoneSetting;
use crate::error::LogError;
use crate::retention::RetentionPolicy;
use crate::router::{is_valid_channel_name, ChannelTargets};
use crate::severity::Severity;
use crate::sink::{DEFAULT_MAX_SIZE, DEFAULT_TEMPLATE, ERROR_CHANNEL, INFO_CHANNEL};
use crate::trace::DEFAULT_COLOR_CACHE;

/// A byte count that can be written as a number or as `"512k"`, `"20m"`, `"1g"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteSize(pub u64);

impl FromStr for ByteSize {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_ascii_lowercase();
        let (digits, multiplier) = match trimmed.chars().last() {
            Some('k') => (&trimmed[..trimmed.len() - 1], 1024),
            Some('m') => (&trimmed[..trimmed.len() - 1], 1024 * 1024),
            Some('g') => (&trimmed[..trimmed.len() - 1], 1024 * 1024 * 1024),
            _ => (trimmed.as_str(), 1),
        };
        let value: u64 = digits
            .trim()
            .parse()
            .map_err(|_| LogError::InvalidSize(s.to_string()))?;
        value
            .checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| LogError::InvalidSize(s.to_string()))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(ByteSize(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Per-channel overrides of the global size and lifetime settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelOverrides {
    pub min_size: Option<u64>,
    pub max_size: Option<ByteSize>,
    pub max_lifetime_secs: Option<u64>,
}

/// Resolved per-channel file parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelParams {
    pub max_size: u64,
    pub retention: RetentionPolicy,
}

/// Complete logger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerSettings {
    /// Logger name, shown on the console and used as the default file prefix
    pub name: String,
    /// Show `[name]` on console lines
    pub display_name: bool,
    /// Least severe level that is emitted at all
    pub min_level: Severity,
    /// Write console lines
    pub console: bool,
    /// Base log directory; defaults to `{app_root}/../logs`
    pub log_dir: Option<PathBuf>,
    /// Directory relative paths are resolved against; defaults to the
    /// working directory
    pub app_root: Option<PathBuf>,
    pub file_prefix: Option<String>,
    pub max_size: ByteSize,
    /// Rotated files at or below this size are removed
    pub min_log_size: u64,
    /// Error-channel override of `min_log_size`; `0` falls back to it
    pub min_error_log_size: Option<u64>,
    /// Rotated files older than this are removed
    pub max_lifetime_secs: Option<u64>,
    pub time_zone: TimeZoneSetting,
    pub pretty_template: String,
    /// Severity name → color name overrides for the console
    pub level_colors: BTreeMap<String, String>,
    /// Severity name → channel name(s)
    pub channel_map: BTreeMap<String, ChannelTargets>,
    pub channels: BTreeMap<String, ChannelOverrides>,
    /// Capacity of the trace-id color cache
    pub trace_color_cache: usize,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            name: "log".to_string(),
            display_name: false,
            min_level: Severity::Silly,
            console: true,
            log_dir: None,
            app_root: None,
            file_prefix: None,
            max_size: ByteSize(DEFAULT_MAX_SIZE),
            min_log_size: 0,
            min_error_log_size: None,
            max_lifetime_secs: None,
            time_zone: TimeZoneSetting::Utc,
            pretty_template: DEFAULT_TEMPLATE.to_string(),
            level_colors: BTreeMap::new(),
            channel_map: BTreeMap::new(),
            channels: BTreeMap::new(),
            trace_color_cache: DEFAULT_COLOR_CACHE,
        }
    }
}

impl LoggerSettings {
    /// Convenience constructor for a named logger.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Route `severity` to `channel` (adds to any existing targets).
    pub fn route(mut self, severity: Severity, channel: &str) -> Self {
        let key = severity.as_str().to_string();
        let targets = match self.channel_map.remove(&key) {
            None => ChannelTargets::One(channel.to_string()),
            Some(ChannelTargets::One(existing)) if existing == channel => ChannelTargets::One(existing),
            Some(ChannelTargets::One(existing)) => ChannelTargets::Many(vec![existing, channel.to_string()]),
            Some(ChannelTargets::Many(mut names)) => {
                if !names.iter().any(|n| n == channel) {
                    names.push(channel.to_string());
                }
                ChannelTargets::Many(names)
            }
        };
        self.channel_map.insert(key, targets);
        self
    }

    /// Prefix of file names; defaults to the logger name.
    pub fn file_prefix(&self) -> &str {
        self.file_prefix
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.name)
    }

    /// Directory relative paths are resolved against.
    pub fn app_root(&self) -> PathBuf {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        match &self.app_root {
            Some(root) => absolutize(&cwd, root),
            None => cwd,
        }
    }

    /// Absolute, normalized base log directory.
    pub fn resolve_log_dir(&self) -> PathBuf {
        let root = self.app_root();
        match self.log_dir.as_deref().filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => normalize_path(&absolutize(&root, dir)),
            None => normalize_path(&root.join("../logs")),
        }
    }

    /// Every file channel to build: `info` and `error` always, plus any
    /// channel named in the map or the overrides.
    pub fn channel_names(&self) -> Vec<String> {
        let mut names = vec![INFO_CHANNEL.to_string(), ERROR_CHANNEL.to_string()];
        let extra = self
            .channel_map
            .values()
            .flat_map(|t| t.names())
            .map(|n| n.trim())
            .chain(self.channels.keys().map(String::as_str));
        for name in extra {
            if is_valid_channel_name(name) && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Size cap and retention for one channel.
    pub fn channel_params(&self, channel: &str) -> ChannelParams {
        let overrides = self.channels.get(channel).cloned().unwrap_or_default();
        let global_min = if channel == ERROR_CHANNEL {
            self.min_error_log_size
                .filter(|v| *v > 0)
                .unwrap_or(self.min_log_size)
        } else {
            self.min_log_size
        };
        let lifetime = overrides.max_lifetime_secs.or(self.max_lifetime_secs);
        ChannelParams {
            max_size: overrides.max_size.unwrap_or(self.max_size).0,
            retention: RetentionPolicy {
                min_size: overrides.min_size.unwrap_or(global_min),
                max_lifetime: lifetime.filter(|s| *s > 0).map(Duration::from_secs),
            },
        }
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Lexically resolve `.` and `..` and use forward slashes. The path does not
/// need to exist.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    PathBuf::from(out.to_string_lossy().replace('\\', "/"))
}
