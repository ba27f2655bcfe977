//! Persisted capture session record.
//!
//! The record lives in `recording_status.json` so any process (the one that
//! started the capture, or a later CLI invocation) can stop it or report
//! on it. Every read-modify-write transition runs under an exclusive
//! advisory lock on `recording_status.lock`, and writes go through a temp
//! file in the same directory followed by a rename.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use duocast_common::clock::elapsed_since;
use duocast_common::{DuocastError, DuocastResult};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

pub const RECORD_FILE: &str = "recording_status.json";
pub const LOCK_FILE: &str = "recording_status.lock";

/// The persisted session record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionRecord {
    pub recording: bool,
    pub done: bool,
    pub screen_pid: Option<u32>,
    pub webcam_pid: Option<u32>,
    pub start_time: Option<DateTime<Utc>>,
    /// Seconds, set when the session stops.
    pub duration: Option<f64>,
    pub error: Option<String>,
}

/// How a stopped session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Completed,
    Failed(String),
}

/// Session lifecycle, derived from a [`SessionRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No session, or one that was reset.
    Idle,
    Recording,
    Stopped(StopOutcome),
}

impl SessionRecord {
    /// A freshly started session.
    pub fn started(screen_pid: u32, webcam_pid: u32, start_time: DateTime<Utc>) -> Self {
        Self {
            recording: true,
            done: false,
            screen_pid: Some(screen_pid),
            webcam_pid: Some(webcam_pid),
            start_time: Some(start_time),
            duration: None,
            error: None,
        }
    }

    /// A terminal record for a session that never got going.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn state(&self) -> SessionState {
        if self.recording {
            SessionState::Recording
        } else if let Some(error) = self.error.as_ref().filter(|e| !e.is_empty()) {
            SessionState::Stopped(StopOutcome::Failed(error.clone()))
        } else if self.done {
            SessionState::Stopped(StopOutcome::Completed)
        } else {
            SessionState::Idle
        }
    }

    /// Wall-clock seconds since start while recording, else the final duration.
    pub fn elapsed_secs(&self) -> f64 {
        match (self.recording, self.start_time) {
            (true, Some(start)) => elapsed_since(start),
            _ => self.duration.unwrap_or(0.0),
        }
    }

    pub fn pids(&self) -> impl Iterator<Item = u32> {
        self.screen_pid.into_iter().chain(self.webcam_pid)
    }
}

/// Reads and writes the session record in one directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn record_path(&self) -> PathBuf {
        self.dir.join(RECORD_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    /// Run `op` while holding the exclusive session lock.
    pub fn with_lock<T>(&self, op: impl FnOnce() -> DuocastResult<T>) -> DuocastResult<T> {
        fs::create_dir_all(&self.dir)?;
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;
        lock_file.lock_exclusive()?;

        let result = op();

        if let Err(e) = FileExt::unlock(&lock_file) {
            tracing::warn!(error = %e, "Failed to unlock session lock file");
        }
        result
    }

    /// The current record; `None` if no session was ever started.
    ///
    /// An unreadable record is treated like a missing one so `reset` can
    /// always recover.
    pub fn read(&self) -> DuocastResult<Option<SessionRecord>> {
        let content = match fs::read_to_string(self.record_path()) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(path = %self.record_path().display(), error = %e, "Ignoring corrupt session record");
                Ok(None)
            }
        }
    }

    /// Atomically replace the record.
    pub fn write(&self, record: &SessionRecord) -> DuocastResult<()> {
        fs::create_dir_all(&self.dir)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".recording_status")
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), record)?;
        tmp.as_file_mut().flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.record_path())
            .map_err(|e| DuocastError::Io(e.error))?;
        Ok(())
    }

    /// Write a terminal record. The captures are already gone at this point,
    /// so a failed atomic write is retried and then replaced by a direct
    /// overwrite rather than leaving `recording=true` behind.
    pub fn write_terminal(&self, record: &SessionRecord) -> DuocastResult<()> {
        let err = match self.write(record) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        tracing::error!(error = %err, "Failed to persist terminal session record, retrying");
        if self.write(record).is_ok() {
            return Ok(());
        }
        let json = serde_json::to_vec_pretty(record)?;
        fs::write(self.record_path(), json).map_err(|direct| {
            tracing::error!(error = %direct, "Direct session record write failed");
            err
        })
    }

    /// Remove the record. Failures are logged, never returned.
    pub fn clear(&self) {
        remove_quietly(&self.record_path());
    }
}

/// Delete `path`, logging anything but "already gone".
pub(crate) fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            let err = DuocastError::cleanup(path, e.to_string());
            tracing::debug!(error = %err, "Cleanup skipped");
        }
    }
}
