//! Windows capture sources.
//!
//! Devices come from ffmpeg's DirectShow listing, windows from
//! `EnumWindows`, and the screen is grabbed through `gdigrab`.

pub mod desktop;

use std::process::Stdio;

use duocast_common::{DuocastError, DuocastResult, MediaTools};
use duocast_platform_core::{Capability, CaptureSources, DeviceList, Platform, ScreenTarget};

pub use desktop::{captureable_titles, enumerate_windows, TopLevelWindow};

/// Capture sources backed by DirectShow and GDI.
#[derive(Debug, Clone)]
pub struct WindowsSources {
    tools: MediaTools,
}

impl WindowsSources {
    pub fn new(tools: MediaTools) -> Self {
        Self { tools }
    }

    fn dshow_listing(&self) -> DuocastResult<DeviceList> {
        let output = self
            .tools
            .ffmpeg_command()
            .args(["-hide_banner", "-list_devices", "true", "-f", "dshow", "-i", "dummy"])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| DuocastError::device_unavailable(format!("ffmpeg not runnable: {e}")))?;
        // ffmpeg exits non-zero here because "dummy" is not a real input.
        Ok(parse_dshow_devices(&String::from_utf8_lossy(&output.stderr)))
    }
}

impl CaptureSources for WindowsSources {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    fn list_video_devices(&self) -> DuocastResult<Vec<String>> {
        Ok(self.dshow_listing()?.video)
    }

    fn list_audio_devices(&self) -> DuocastResult<Vec<String>> {
        Ok(self.dshow_listing()?.audio)
    }

    fn list_devices(&self) -> DuocastResult<DeviceList> {
        self.dshow_listing()
    }

    fn list_captureable_windows(&self) -> DuocastResult<Vec<String>> {
        Ok(captureable_titles(&enumerate_windows()?))
    }

    fn screen_input_args(&self, target: &ScreenTarget, fps: u32) -> DuocastResult<Vec<String>> {
        let input = match target {
            ScreenTarget::Desktop => "desktop".to_string(),
            ScreenTarget::Window(title) => format!("title={title}"),
        };
        Ok(vec![
            "-f".to_string(),
            "gdigrab".to_string(),
            "-framerate".to_string(),
            fps.to_string(),
            "-i".to_string(),
            input,
        ])
    }

    fn webcam_input_args(&self, video: &str, audio: Option<&str>) -> DuocastResult<Vec<String>> {
        Ok(vec![
            "-f".to_string(),
            "dshow".to_string(),
            "-i".to_string(),
            dshow_input(video, audio),
        ])
    }

    fn capabilities(&self) -> Vec<Capability> {
        let ffmpeg = self.tools.is_available();
        let devices = if ffmpeg {
            self.dshow_listing().unwrap_or_default()
        } else {
            DeviceList::default()
        };
        vec![
            Capability {
                name: "ffmpeg".to_string(),
                description: "DirectShow and GDI capture through ffmpeg".to_string(),
                available: ffmpeg,
                required: true,
                fix_instructions: (!ffmpeg)
                    .then(|| "Place ffmpeg.exe in the data directory's ffmpeg\\bin".to_string()),
            },
            Capability {
                name: "Webcam Device".to_string(),
                description: "DirectShow video device for the presenter stream".to_string(),
                available: !devices.video.is_empty(),
                required: true,
                fix_instructions: devices
                    .video
                    .is_empty()
                    .then(|| "Connect a webcam and check it in Device Manager".to_string()),
            },
            Capability {
                name: "Microphone".to_string(),
                description: "DirectShow audio device".to_string(),
                available: !devices.audio.is_empty(),
                required: false,
                fix_instructions: None,
            },
        ]
    }
}

/// `video=<v>[:audio=<a>]`
pub fn dshow_input(video: &str, audio: Option<&str>) -> String {
    match audio.filter(|a| !a.is_empty()) {
        Some(audio) => format!("video={video}:audio={audio}"),
        None => format!("video={video}"),
    }
}

/// Parse the stderr of `ffmpeg -list_devices true -f dshow -i dummy`.
///
/// Recent ffmpeg tags each device line with `(video)`, `(audio)` or
/// `(none)`; older builds print section headers instead. Both are handled.
/// `Alternative name` lines and `(none)` devices are skipped.
pub fn parse_dshow_devices(stderr: &str) -> DeviceList {
    #[derive(Clone, Copy)]
    enum Section {
        Unknown,
        Video,
        Audio,
    }

    let mut devices = DeviceList::default();
    let mut section = Section::Unknown;

    for line in stderr.lines() {
        if line.contains("DirectShow video devices") {
            section = Section::Video;
            continue;
        }
        if line.contains("DirectShow audio devices") {
            section = Section::Audio;
            continue;
        }
        if line.contains("Alternative name") {
            continue;
        }
        let Some(name) = line.split('"').nth(1).filter(|n| !n.is_empty()) else {
            continue;
        };

        let kind = if line.contains("(video)") {
            Section::Video
        } else if line.contains("(audio)") {
            Section::Audio
        } else if line.contains("(none)") {
            continue;
        } else {
            section
        };

        match kind {
            Section::Video => devices.video.push(name.to_string()),
            Section::Audio => devices.audio.push(name.to_string()),
            Section::Unknown => {}
        }
    }

    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_device_lines() {
        let stderr = r#"
[dshow @ 0000021d] "Integrated Webcam" (video)
[dshow @ 0000021d]   Alternative name "@device_pnp_\\?\usb#vid_0c45&pid_6723"
[dshow @ 0000021d] "OBS Virtual Camera" (none)
[dshow @ 0000021d] "Microphone Array (Realtek(R) Audio)" (audio)
[dshow @ 0000021d]   Alternative name "@device_cm_{33D9A762}\wave_{A1B2}"
dummy: Immediate exit requested
"#;
        let devices = parse_dshow_devices(stderr);
        assert_eq!(devices.video, vec!["Integrated Webcam"]);
        assert_eq!(devices.audio, vec!["Microphone Array (Realtek(R) Audio)"]);
    }

    #[test]
    fn parses_sectioned_device_lines() {
        let stderr = r#"
[dshow @ 03c8e0c0] DirectShow video devices (some may be both video and audio devices)
[dshow @ 03c8e0c0]  "HD Pro Webcam C920"
[dshow @ 03c8e0c0]     Alternative name "@device_pnp_\\?\usb#vid_046d"
[dshow @ 03c8e0c0] DirectShow audio devices
[dshow @ 03c8e0c0]  "Microphone (HD Pro Webcam C920)"
"#;
        let devices = parse_dshow_devices(stderr);
        assert_eq!(devices.video, vec!["HD Pro Webcam C920"]);
        assert_eq!(devices.audio, vec!["Microphone (HD Pro Webcam C920)"]);
    }

    #[test]
    fn dshow_input_joins_video_and_audio() {
        assert_eq!(
            dshow_input("Cam", Some("Mic (USB)")),
            "video=Cam:audio=Mic (USB)"
        );
        assert_eq!(dshow_input("Cam", Some("")), "video=Cam");
        assert_eq!(dshow_input("Cam", None), "video=Cam");
    }

    #[test]
    fn window_capture_uses_gdigrab_title() {
        let sources = WindowsSources::new(MediaTools::from_path());
        let args = sources
            .screen_input_args(&ScreenTarget::Window("Slides".to_string()), 30)
            .unwrap();
        assert_eq!(args, vec!["-f", "gdigrab", "-framerate", "30", "-i", "title=Slides"]);
    }
}
