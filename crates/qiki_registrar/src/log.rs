//! The audit log.
//!
//! One JSONL file per day, `memory_YYYY-MM-DD.db`, under the configured
//! backup directory. Rotation happens on the first append of a new day;
//! retention prunes files older than the configured age. A lock file in
//! the directory makes the writer single-flight: a second registrar
//! refuses to start instead of interleaving writes.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use qiki_contracts::event::EventEnvelope;

/// The single-flight lock file name.
const LOCK_FILE: &str = "registrar.lock";

/// Audit log configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory holding the daily files.
    pub backup_dir: PathBuf,
    /// Files older than this are pruned.
    pub retention_days: i64,
}

impl LogConfig {
    /// A config over the given directory with the default 30-day retention.
    #[must_use]
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            retention_days: 30,
        }
    }
}

/// Audit log failure.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// Filesystem failure.
    #[error("audit log i/o: {0}")]
    Io(#[from] std::io::Error),
    /// Another registrar holds the directory lock.
    #[error("backup directory is locked by another registrar")]
    Locked,
    /// The envelope could not be serialised.
    #[error("envelope serialisation failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The appending audit log. Holds the directory lock for its lifetime.
#[derive(Debug)]
pub struct AuditLog {
    config: LogConfig,
    current_date: Option<NaiveDate>,
    file: Option<File>,
    lock_path: PathBuf,
}

impl AuditLog {
    /// Open the log, acquiring the single-flight lock.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Locked`] when another registrar holds the lock,
    /// or [`LogError::Io`] on directory failures.
    pub fn open(config: LogConfig) -> Result<Self, LogError> {
        fs::create_dir_all(&config.backup_dir)?;
        let lock_path = config.backup_dir.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(LogError::Locked);
            }
            Err(err) => return Err(err.into()),
        }
        info!(dir = %config.backup_dir.display(), "audit log opened");
        Ok(Self {
            config,
            current_date: None,
            file: None,
            lock_path,
        })
    }

    /// The file name for a date.
    #[must_use]
    pub fn filename(date: NaiveDate) -> String {
        format!("memory_{}.db", date.format("%Y-%m-%d"))
    }

    /// Append an envelope, dated now.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] on rotation or write failure.
    pub fn append(&mut self, envelope: &EventEnvelope) -> Result<PathBuf, LogError> {
        self.append_at(Utc::now().date_naive(), envelope)
    }

    /// Append an envelope under an explicit date (rotation seam).
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] on rotation or write failure.
    pub fn append_at(
        &mut self,
        date: NaiveDate,
        envelope: &EventEnvelope,
    ) -> Result<PathBuf, LogError> {
        if self.current_date != Some(date) {
            let path = self.config.backup_dir.join(Self::filename(date));
            self.file = Some(OpenOptions::new().create(true).append(true).open(&path)?);
            self.current_date = Some(date);
            info!(file = %path.display(), "audit log rotated");
        }
        let line = serde_json::to_string(envelope)?;
        if let Some(file) = &mut self.file {
            writeln!(file, "{line}")?;
        }
        Ok(self
            .config
            .backup_dir
            .join(Self::filename(date)))
    }

    /// Prune files older than the retention window. Returns what was
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Io`] when the directory cannot be read.
    pub fn prune(&self, today: NaiveDate) -> Result<Vec<PathBuf>, LogError> {
        let mut removed = Vec::new();
        for entry in fs::read_dir(&self.config.backup_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(date) = parse_filename(&name.to_string_lossy()) else {
                continue;
            };
            let age = today.signed_duration_since(date).num_days();
            if age > self.config.retention_days {
                if let Err(err) = fs::remove_file(entry.path()) {
                    warn!(%err, file = %entry.path().display(), "prune failed");
                } else {
                    removed.push(entry.path());
                }
            }
        }
        if !removed.is_empty() {
            info!(count = removed.len(), "audit files pruned");
        }
        Ok(removed)
    }
}

impl Drop for AuditLog {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

/// Parse `memory_YYYY-MM-DD.db` into its date.
fn parse_filename(name: &str) -> Option<NaiveDate> {
    let stem = name.strip_prefix("memory_")?.strip_suffix(".db")?;
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}
