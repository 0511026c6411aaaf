//! Time source and zone handling for timestamps and file dates.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Shared time source. Sinks and the facade take one so tests can move time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The wall clock.
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// A clock that always returns `at`.
pub fn fixed_clock(at: DateTime<Utc>) -> Clock {
    Arc::new(move || at)
}

/// Date format of rotated file names.
pub const FILE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Timestamp format of file lines and console output.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Zone used to render timestamps and pick the calendar day of a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeZoneSetting {
    #[default]
    Utc,
    Local,
}

impl TimeZoneSetting {
    pub fn format(self, at: DateTime<Utc>, fmt: &str) -> String {
        match self {
            TimeZoneSetting::Utc => at.format(fmt).to_string(),
            TimeZoneSetting::Local => at.with_timezone(&Local).format(fmt).to_string(),
        }
    }

    /// Calendar day of `at`, as used in file names.
    pub fn file_date(self, at: DateTime<Utc>) -> String {
        self.format(at, FILE_DATE_FORMAT)
    }

    pub fn timestamp(self, at: DateTime<Utc>) -> String {
        self.format(at, TIMESTAMP_FORMAT)
    }
}
