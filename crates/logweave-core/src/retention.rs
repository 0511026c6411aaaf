//! Retention sweep: reclaim disk space from stale or undersized log files.
//!
//! A file is a deletion candidate when its name matches the channel's file
//! pattern, it is at least [`MIN_FILE_AGE`] old, and either its size is at or
//! below the channel's minimum size or it has outlived the channel's maximum
//! lifetime. The file a sink currently has open is never a candidate.
//!
//! Sweeps never fail: listing and deletion errors are logged and skipped.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use regex::Regex;
use tracing::{debug, info, warn};

/// Files younger than this are never deleted.
pub const MIN_FILE_AGE: Duration = Duration::from_secs(60);

/// Size-or-age deletion policy of one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Files at or below this size (bytes) are removed
    pub min_size: u64,
    /// Files older than this are removed regardless of size
    pub max_lifetime: Option<Duration>,
}

impl RetentionPolicy {
    /// Whether a file of `size` bytes and `age` should be removed.
    pub fn is_expired(&self, size: u64, age: Duration) -> bool {
        if age < MIN_FILE_AGE {
            return false;
        }
        size <= self.min_size || self.max_lifetime.is_some_and(|max| age > max)
    }
}

/// A regular file found in a log directory.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub created: SystemTime,
}

/// Immediate non-directory entries of `dir`. A missing directory yields an
/// empty list.
pub fn list_files(dir: &Path) -> std::io::Result<Vec<FileInfo>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = match entry.metadata() {
            Ok(m) => m,
            // Removed between listing and stat
            Err(_) => continue,
        };
        if metadata.is_dir() {
            continue;
        }
        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .unwrap_or_else(|_| SystemTime::now());
        files.push(FileInfo {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
            size: metadata.len(),
            created,
        });
    }
    Ok(files)
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// One sweep over a directory.
pub struct Sweep<'a> {
    dir: &'a Path,
    pattern: &'a Regex,
    policy: RetentionPolicy,
    exclude: Option<&'a Path>,
}

impl<'a> Sweep<'a> {
    pub fn new(dir: &'a Path, pattern: &'a Regex, policy: RetentionPolicy) -> Self {
        Self {
            dir,
            pattern,
            policy,
            exclude: None,
        }
    }

    /// Never touch this file (the one a sink is writing).
    pub fn excluding(mut self, path: Option<&'a Path>) -> Self {
        self.exclude = path;
        self
    }

    /// Run against the wall clock.
    pub fn run(&self) -> SweepReport {
        self.run_at(SystemTime::now())
    }

    /// Run as if the current time were `now`.
    pub fn run_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();
        let files = match list_files(self.dir) {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Failed to list log directory");
                return report;
            }
        };

        for file in files {
            if !self.pattern.is_match(&file.name) {
                continue;
            }
            if self.exclude.is_some_and(|ex| ex == file.path) {
                continue;
            }
            // A creation time in the future counts as brand new
            let age = now.duration_since(file.created).unwrap_or_default();
            if !self.policy.is_expired(file.size, age) {
                continue;
            }
            match fs::remove_file(&file.path) {
                Ok(()) => {
                    info!(path = %file.path.display(), size = file.size, "Removed log file");
                    report.removed.push(file.path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %file.path.display(), "Log file already gone");
                }
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "Failed to remove log file");
                    report.failed.push(file.path);
                }
            }
        }
        report
    }
}

/// Convenience wrapper: sweep `dir` now.
pub fn sweep(
    dir: &Path,
    pattern: &Regex,
    policy: RetentionPolicy,
    exclude: Option<&Path>,
) -> SweepReport {
    Sweep::new(dir, pattern, policy).excluding(exclude).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pattern() -> Regex {
        Regex::new(r"^app-(\d{4}-\d{2}-\d{2})(?:\.\d+)?\.log$").unwrap()
    }

    fn later() -> SystemTime {
        SystemTime::now() + Duration::from_secs(120)
    }

    #[test]
    fn test_policy_guards_young_files() {
        let policy = RetentionPolicy {
            min_size: 1_000,
            max_lifetime: Some(Duration::from_secs(1)),
        };
        assert!(!policy.is_expired(0, Duration::from_secs(59)));
        assert!(policy.is_expired(0, Duration::from_secs(60)));
    }

    #[test]
    fn test_policy_size_or_lifetime() {
        let policy = RetentionPolicy {
            min_size: 10,
            max_lifetime: Some(Duration::from_secs(3600)),
        };
        let old_enough = Duration::from_secs(120);
        assert!(policy.is_expired(10, old_enough));
        assert!(!policy.is_expired(11, old_enough));
        assert!(policy.is_expired(11, Duration::from_secs(3601)));
        let no_lifetime = RetentionPolicy::default();
        assert!(!no_lifetime.is_expired(1, Duration::from_secs(1_000_000)));
        assert!(no_lifetime.is_expired(0, Duration::from_secs(61)));
    }

    #[test]
    fn test_list_files_skips_directories() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.log"), "abc").unwrap();
        fs::create_dir(temp.path().join("error")).unwrap();
        let files = list_files(temp.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "a.log");
        assert_eq!(files[0].size, 3);
    }

    #[test]
    fn test_list_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(list_files(&temp.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn test_sweep_removes_only_matching_undersized_files() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        fs::write(dir.join("app-2024-01-01.log"), "").unwrap();
        fs::write(dir.join("app-2024-01-02.1.log"), "").unwrap();
        fs::write(dir.join("app-2024-01-03.log"), "kept because non-empty").unwrap();
        fs::write(dir.join("notes.txt"), "").unwrap();

        let re = pattern();
        let report = Sweep::new(dir, &re, RetentionPolicy::default()).run_at(later());

        assert_eq!(report.removed.len(), 2);
        assert!(!dir.join("app-2024-01-01.log").exists());
        assert!(!dir.join("app-2024-01-02.1.log").exists());
        assert!(dir.join("app-2024-01-03.log").exists());
        assert!(dir.join("notes.txt").exists());
    }

    #[test]
    fn test_sweep_never_touches_fresh_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("app-2024-01-01.log"), "").unwrap();
        let re = pattern();
        let report = Sweep::new(temp.path(), &re, RetentionPolicy::default()).run();
        assert!(report.removed.is_empty());
        assert!(temp.path().join("app-2024-01-01.log").exists());
    }

    #[test]
    fn test_sweep_respects_exclusion() {
        let temp = TempDir::new().unwrap();
        let active = temp.path().join("app-2024-01-01.log");
        fs::write(&active, "").unwrap();
        let re = pattern();
        let report = Sweep::new(temp.path(), &re, RetentionPolicy::default())
            .excluding(Some(&active))
            .run_at(later());
        assert!(report.removed.is_empty());
        assert!(active.exists());
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("app-2024-01-01.log"), "").unwrap();
        let re = pattern();
        let sweep = Sweep::new(temp.path(), &re, RetentionPolicy::default());
        assert_eq!(sweep.run_at(later()).removed.len(), 1);
        let second = sweep.run_at(later());
        assert!(second.removed.is_empty());
        assert!(second.failed.is_empty());
    }

    #[test]
    fn test_sweep_missing_directory_is_noop() {
        let temp = TempDir::new().unwrap();
        let re = pattern();
        let report = sweep(&temp.path().join("gone"), &re, RetentionPolicy::default(), None);
        assert_eq!(report, SweepReport::default());
    }
}
