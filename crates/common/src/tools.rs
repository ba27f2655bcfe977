//! ffmpeg/ffprobe binary resolution.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::process::configure_command;

/// Resolved locations of the ffmpeg and ffprobe binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl MediaTools {
    /// Resolve binaries from `local_dir` first, then fall back to `PATH`.
    pub fn resolve(local_dir: &Path) -> Self {
        Self {
            ffmpeg: resolve_binary(local_dir, "ffmpeg"),
            ffprobe: resolve_binary(local_dir, "ffprobe"),
        }
    }

    /// Use whatever `ffmpeg`/`ffprobe` is on `PATH`.
    pub fn from_path() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }

    /// A new `ffmpeg` command with platform flags applied.
    pub fn ffmpeg_command(&self) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        configure_command(&mut cmd);
        cmd
    }

    /// A new `ffprobe` command with platform flags applied.
    pub fn ffprobe_command(&self) -> Command {
        let mut cmd = Command::new(&self.ffprobe);
        configure_command(&mut cmd);
        cmd
    }

    /// Whether `ffmpeg -version` runs successfully.
    pub fn is_available(&self) -> bool {
        self.ffmpeg_command()
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// First line of `ffmpeg -version`, if it runs.
    pub fn version(&self) -> Option<String> {
        let output = self
            .ffmpeg_command()
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
    }
}

fn resolve_binary(local_dir: &Path, name: &str) -> PathBuf {
    let file_name = format!("{name}{}", std::env::consts::EXE_SUFFIX);
    let local = local_dir.join(&file_name);
    if local.is_file() {
        tracing::debug!(binary = name, path = %local.display(), "Using bundled binary");
        return local;
    }
    PathBuf::from(file_name)
}
