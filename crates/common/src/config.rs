//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the local working directory.
pub const DATA_DIR_ENV: &str = "DUOCAST_DATA_DIR";

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Local working directory for raw captures, outputs and bundled
    /// binaries. Should not live on a synced drive.
    pub data_dir: PathBuf,

    /// Directory holding branding assets (mask, ring, watermark PNGs).
    pub assets_dir: PathBuf,

    /// Capture parameters.
    pub recording: RecordingDefaults,

    /// Compositing geometry.
    pub composite: CompositeDefaults,

    /// Thumbnail extraction defaults.
    pub thumbnails: ThumbnailDefaults,

    /// Watermark placement for trims.
    pub watermark: WatermarkDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Capture parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingDefaults {
    /// Screen capture frame rate.
    pub fps: u32,

    /// Smallest raw output (bytes) accepted as a valid capture.
    pub min_output_bytes: u64,

    /// Pause after killing the capture processes before validating output.
    pub flush_delay_ms: u64,

    /// Pin an ffmpeg encoder name instead of probing (e.g. "libx264").
    pub encoder: Option<String>,
}

/// Default compositing geometry, in output pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeDefaults {
    /// Outer diameter of the circular webcam frame.
    pub webcam_size: u32,

    /// Distance of webcam and watermark from the frame edges.
    pub padding: u32,

    /// Watermark width.
    pub logo_size: u32,

    /// Screen capture is scaled down to at most this width.
    pub max_screen_width: u32,
}

/// Thumbnail extraction defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailDefaults {
    /// Seconds between strip thumbnails.
    pub interval_secs: u32,

    /// Strip thumbnail width.
    pub width: u32,

    /// Width of single preview frames.
    pub preview_width: u32,
}

/// Watermark placement for trim operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkDefaults {
    pub size: u32,
    pub padding: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "duocast=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            assets_dir: data_dir.join("assets"),
            data_dir,
            recording: RecordingDefaults::default(),
            composite: CompositeDefaults::default(),
            thumbnails: ThumbnailDefaults::default(),
            watermark: WatermarkDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            fps: 30,
            min_output_bytes: 1024,
            flush_delay_ms: 1500,
            encoder: None,
        }
    }
}

impl Default for CompositeDefaults {
    fn default() -> Self {
        Self {
            webcam_size: 300,
            padding: 30,
            logo_size: 120,
            max_screen_width: 1920,
        }
    }
}

impl Default for ThumbnailDefaults {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            width: 320,
            preview_width: 640,
        }
    }
}

impl Default for WatermarkDefaults {
    fn default() -> Self {
        Self {
            size: 120,
            padding: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    /// `DUOCAST_DATA_DIR` always wins over the stored data directory.
    pub fn load() -> Self {
        let config_path = config_file_path();
        let mut config = Self::default();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(parsed) => config = parsed,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        config
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Scratch directory for raw captures and the session record.
    pub fn temp_dir(&self) -> PathBuf {
        self.data_dir.join("temp")
    }

    /// Directory for finished outputs.
    pub fn output_dir(&self) -> PathBuf {
        self.data_dir.join("output")
    }

    /// Directory searched first for ffmpeg/ffprobe.
    pub fn ffmpeg_dir(&self) -> PathBuf {
        self.data_dir.join("ffmpeg").join("bin")
    }

    /// Directory for strip thumbnails.
    pub fn thumbnails_dir(&self) -> PathBuf {
        self.temp_dir().join("thumbnails")
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));
    base.join("duocast").join("config.json")
}

/// Default local working directory.
fn default_data_dir() -> PathBuf {
    if cfg!(windows) {
        let base = std::env::var("LOCALAPPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home_dir().join("AppData").join("Local"));
        return base.join("Duocast");
    }
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local").join("share"));
    base.join("duocast")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir())
}
