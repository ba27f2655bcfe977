//! Capture command construction and spawning.
//!
//! Each stream is one detached ffmpeg process writing Matroska, which stays
//! readable when the process is killed mid-write.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Child;

use duocast_common::process::detach_command;
use duocast_common::{DuocastResult, MediaTools};
use duocast_media_engine::{EncoderId, SpeedProfile};
use duocast_platform_core::{CaptureSources, ScreenTarget};

/// Raw screen capture file name.
pub const SCREEN_RAW_FILE: &str = "screen_raw.mkv";
/// Raw webcam + microphone capture file name.
pub const WEBCAM_RAW_FILE: &str = "webcam_raw.mkv";
/// Composite output file name.
pub const COMPOSITE_FILE: &str = "composite.mp4";

/// The two capture streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Screen,
    Webcam,
}

impl StreamKind {
    /// Name used in user-facing messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Screen => "Screen recording",
            Self::Webcam => "Webcam recording",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Screen => "screen",
            Self::Webcam => "webcam",
        })
    }
}

/// Where a session's files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingPaths {
    pub screen_raw: PathBuf,
    pub webcam_raw: PathBuf,
    pub composite: PathBuf,
}

impl RecordingPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            screen_raw: dir.join(SCREEN_RAW_FILE),
            webcam_raw: dir.join(WEBCAM_RAW_FILE),
            composite: dir.join(COMPOSITE_FILE),
        }
    }

    pub fn raw(&self, kind: StreamKind) -> &Path {
        match kind {
            StreamKind::Screen => &self.screen_raw,
            StreamKind::Webcam => &self.webcam_raw,
        }
    }

    pub fn all(&self) -> [&Path; 3] {
        [&self.screen_raw, &self.webcam_raw, &self.composite]
    }
}

/// ffmpeg arguments for the screen stream.
pub fn screen_capture_args(
    sources: &dyn CaptureSources,
    target: &ScreenTarget,
    fps: u32,
    encoder: EncoderId,
    output: &Path,
) -> DuocastResult<Vec<String>> {
    let mut args = sources.screen_input_args(target, fps)?;
    args.extend(encoder.codec_args(SpeedProfile::Realtime));
    args.push("-y".to_string());
    args.push(output.to_string_lossy().into_owned());
    Ok(args)
}

/// ffmpeg arguments for the webcam + microphone stream.
pub fn webcam_capture_args(
    sources: &dyn CaptureSources,
    video: &str,
    audio: Option<&str>,
    encoder: EncoderId,
    output: &Path,
) -> DuocastResult<Vec<String>> {
    let audio = audio.filter(|a| !a.trim().is_empty());
    let mut args = sources.webcam_input_args(video, audio)?;
    args.extend(encoder.codec_args(SpeedProfile::Realtime));
    if audio.is_some() {
        args.extend(["-c:a".to_string(), "aac".to_string()]);
    }
    args.push("-y".to_string());
    args.push(output.to_string_lossy().into_owned());
    Ok(args)
}

/// Spawn a detached capture process.
pub fn spawn_capture(tools: &MediaTools, args: &[String]) -> std::io::Result<Child> {
    let mut cmd = tools.ffmpeg_command();
    cmd.args(args);
    detach_command(&mut cmd);
    cmd.spawn()
}

/// Check a raw output after capture. Returns a user-facing reason when it is
/// missing or too small to hold any media.
pub fn check_raw_output(kind: StreamKind, path: &Path, min_bytes: u64) -> Result<u64, String> {
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(_) => {
            return Err(match kind {
                StreamKind::Screen => format!("{} not found", kind.label()),
                StreamKind::Webcam => format!(
                    "{} not found; check that the webcam is available",
                    kind.label()
                ),
            })
        }
    };
    if size < min_bytes {
        return Err(match kind {
            StreamKind::Screen => format!("{} is empty or corrupt ({size} bytes)", kind.label()),
            StreamKind::Webcam => format!(
                "{} is empty or corrupt ({size} bytes); the webcam may have been in use",
                kind.label()
            ),
        });
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use duocast_common::DuocastError;
    use duocast_platform_core::Platform;

    struct StaticSources;

    impl CaptureSources for StaticSources {
        fn platform(&self) -> Platform {
            Platform::Unknown
        }
        fn list_video_devices(&self) -> DuocastResult<Vec<String>> {
            Ok(vec!["Cam".into()])
        }
        fn list_audio_devices(&self) -> DuocastResult<Vec<String>> {
            Ok(vec!["Mic".into()])
        }
        fn list_captureable_windows(&self) -> DuocastResult<Vec<String>> {
            Ok(Vec::new())
        }
        fn screen_input_args(&self, target: &ScreenTarget, fps: u32) -> DuocastResult<Vec<String>> {
            match target {
                ScreenTarget::Desktop => Ok(["-f", "gdigrab", "-framerate"]
                    .iter()
                    .map(|s| s.to_string())
                    .chain([fps.to_string(), "-i".into(), "desktop".into()])
                    .collect()),
                ScreenTarget::Window(_) => Err(DuocastError::unsupported("no windows")),
            }
        }
        fn webcam_input_args(&self, video: &str, audio: Option<&str>) -> DuocastResult<Vec<String>> {
            let mut input = format!("video={video}");
            if let Some(audio) = audio {
                input.push_str(&format!(":audio={audio}"));
            }
            Ok(vec!["-f".into(), "dshow".into(), "-i".into(), input])
        }
    }

    #[test]
    fn screen_args_append_realtime_encoder_and_output() {
        let args = screen_capture_args(
            &StaticSources,
            &ScreenTarget::Desktop,
            30,
            EncoderId::Libx264,
            Path::new("screen_raw.mkv"),
        )
        .unwrap();
        assert_eq!(
            args.join(" "),
            "-f gdigrab -framerate 30 -i desktop -c:v libx264 -preset ultrafast -y screen_raw.mkv"
        );
    }

    #[test]
    fn webcam_args_add_aac_only_with_microphone() {
        let with_mic = webcam_capture_args(
            &StaticSources,
            "Cam",
            Some("Mic"),
            EncoderId::Nvenc,
            Path::new("webcam_raw.mkv"),
        )
        .unwrap();
        assert_eq!(
            with_mic.join(" "),
            "-f dshow -i video=Cam:audio=Mic -c:v h264_nvenc -preset p1 -c:a aac -y webcam_raw.mkv"
        );

        let silent = webcam_capture_args(
            &StaticSources,
            "Cam",
            Some("  "),
            EncoderId::Nvenc,
            Path::new("webcam_raw.mkv"),
        )
        .unwrap();
        assert!(!silent.contains(&"-c:a".to_string()));
        assert!(silent.contains(&"video=Cam".to_string()));
    }

    #[test]
    fn raw_output_checks_distinguish_missing_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RecordingPaths::in_dir(dir.path());

        let missing = check_raw_output(StreamKind::Webcam, &paths.webcam_raw, 1024).unwrap_err();
        assert!(missing.starts_with("Webcam recording not found"));

        std::fs::write(&paths.screen_raw, vec![0u8; 10]).unwrap();
        let empty = check_raw_output(StreamKind::Screen, &paths.screen_raw, 1024).unwrap_err();
        assert_eq!(empty, "Screen recording is empty or corrupt (10 bytes)");

        std::fs::write(&paths.screen_raw, vec![0u8; 1024]).unwrap();
        assert_eq!(
            check_raw_output(StreamKind::Screen, &paths.screen_raw, 1024),
            Ok(1024)
        );
    }
}
