//! Error types shared across Duocast crates.

use std::path::PathBuf;

/// Top-level error type for Duocast operations.
#[derive(Debug, thiserror::Error)]
pub enum DuocastError {
    /// A capture process could not be started (device busy, binary missing).
    #[error("Capture device unavailable: {message}")]
    DeviceUnavailable { message: String },

    /// A stopped capture produced a missing or undersized output file.
    #[error("Capture validation failed: {message}")]
    CaptureValidation { message: String },

    /// Media metadata could not be read.
    #[error("Probe error: {message}")]
    Probe { message: String },

    /// An ffmpeg transform exited unsuccessfully. The message carries
    /// only the tail of the diagnostic output.
    #[error("Transform failed: {message}")]
    Transform { message: String },

    /// A stale file could not be removed. Never propagated past the
    /// cleanup site; it only exists so the failure can be logged uniformly.
    #[error("Cleanup error for {path}: {message}")]
    Cleanup { path: PathBuf, message: String },

    #[error("A capture session is already recording (started at {started_at})")]
    SessionActive { started_at: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using DuocastError.
pub type DuocastResult<T> = Result<T, DuocastError>;

impl DuocastError {
    pub fn device_unavailable(msg: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            message: msg.into(),
        }
    }

    pub fn capture_validation(msg: impl Into<String>) -> Self {
        Self::CaptureValidation {
            message: msg.into(),
        }
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe {
            message: msg.into(),
        }
    }

    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform {
            message: msg.into(),
        }
    }

    pub fn cleanup(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Cleanup {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_error_displays_tail_only() {
        let err = DuocastError::transform("Conversion failed!");
        assert_eq!(err.to_string(), "Transform failed: Conversion failed!");
    }

    #[test]
    fn io_errors_convert_transparently() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: DuocastError = io.into();
        assert!(matches!(err, DuocastError::Io(_)));
        assert_eq!(err.to_string(), "gone");
    }
}
