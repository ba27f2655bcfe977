//! macOS capture sources.
//!
//! Everything goes through ffmpeg's AVFoundation input. Single-window
//! capture is not available there, so window listing is always empty.

use std::process::Stdio;

use duocast_common::{DuocastError, DuocastResult, MediaTools};
use duocast_platform_core::{Capability, CaptureSources, DeviceList, Platform, ScreenTarget};

/// AVFoundation names screen inputs "Capture screen N".
const SCREEN_DEVICE_PREFIX: &str = "Capture screen";

/// Camera frame rate requested from AVFoundation.
const WEBCAM_FRAMERATE: u32 = 30;

/// A device as listed by AVFoundation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvDevice {
    pub index: u32,
    pub name: String,
}

/// Parsed AVFoundation listing, screens included among the video devices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvListing {
    pub video: Vec<AvDevice>,
    pub audio: Vec<AvDevice>,
}

impl AvListing {
    /// Video devices that are cameras, not screens.
    pub fn cameras(&self) -> impl Iterator<Item = &AvDevice> {
        self.video
            .iter()
            .filter(|d| !d.name.starts_with(SCREEN_DEVICE_PREFIX))
    }

    /// First screen input.
    pub fn primary_screen(&self) -> Option<&AvDevice> {
        self.video
            .iter()
            .find(|d| d.name.starts_with(SCREEN_DEVICE_PREFIX))
    }
}

/// Capture sources backed by AVFoundation.
#[derive(Debug, Clone)]
pub struct MacSources {
    tools: MediaTools,
}

impl MacSources {
    pub fn new(tools: MediaTools) -> Self {
        Self { tools }
    }

    fn listing(&self) -> DuocastResult<AvListing> {
        let output = self
            .tools
            .ffmpeg_command()
            .args(["-hide_banner", "-f", "avfoundation", "-list_devices", "true", "-i", ""])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| DuocastError::device_unavailable(format!("ffmpeg not runnable: {e}")))?;
        Ok(parse_avfoundation_devices(&String::from_utf8_lossy(
            &output.stderr,
        )))
    }
}

impl CaptureSources for MacSources {
    fn platform(&self) -> Platform {
        Platform::MacOS
    }

    fn list_video_devices(&self) -> DuocastResult<Vec<String>> {
        Ok(self.listing()?.cameras().map(|d| d.name.clone()).collect())
    }

    fn list_audio_devices(&self) -> DuocastResult<Vec<String>> {
        Ok(self.listing()?.audio.into_iter().map(|d| d.name).collect())
    }

    fn list_devices(&self) -> DuocastResult<DeviceList> {
        let listing = self.listing()?;
        Ok(DeviceList {
            video: listing.cameras().map(|d| d.name.clone()).collect(),
            audio: listing.audio.into_iter().map(|d| d.name).collect(),
        })
    }

    fn list_captureable_windows(&self) -> DuocastResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn screen_input_args(&self, target: &ScreenTarget, fps: u32) -> DuocastResult<Vec<String>> {
        if let ScreenTarget::Window(title) = target {
            return Err(DuocastError::unsupported(format!(
                "Window capture is not available on macOS (requested '{title}')"
            )));
        }
        let listing = self.listing()?;
        let screen = listing
            .primary_screen()
            .ok_or_else(|| DuocastError::device_unavailable("No AVFoundation screen input"))?;
        Ok(vec![
            "-f".to_string(),
            "avfoundation".to_string(),
            "-framerate".to_string(),
            fps.to_string(),
            "-capture_cursor".to_string(),
            "1".to_string(),
            "-i".to_string(),
            format!("{}:none", screen.index),
        ])
    }

    fn webcam_input_args(&self, video: &str, audio: Option<&str>) -> DuocastResult<Vec<String>> {
        Ok(vec![
            "-f".to_string(),
            "avfoundation".to_string(),
            "-framerate".to_string(),
            WEBCAM_FRAMERATE.to_string(),
            "-i".to_string(),
            avfoundation_input(video, audio),
        ])
    }

    fn capabilities(&self) -> Vec<Capability> {
        let ffmpeg = self.tools.is_available();
        let listing = if ffmpeg {
            self.listing().unwrap_or_default()
        } else {
            AvListing::default()
        };
        let has_screen = listing.primary_screen().is_some();
        let has_camera = listing.cameras().next().is_some();
        vec![
            Capability {
                name: "ffmpeg".to_string(),
                description: "AVFoundation capture through ffmpeg".to_string(),
                available: ffmpeg,
                required: true,
                fix_instructions: (!ffmpeg).then(|| "brew install ffmpeg".to_string()),
            },
            Capability {
                name: "Screen Recording".to_string(),
                description: "AVFoundation screen input".to_string(),
                available: has_screen,
                required: true,
                fix_instructions: (!has_screen).then(|| {
                    "Grant Screen Recording permission to your terminal in System Settings"
                        .to_string()
                }),
            },
            Capability {
                name: "Webcam Device".to_string(),
                description: "AVFoundation camera for the presenter stream".to_string(),
                available: has_camera,
                required: true,
                fix_instructions: (!has_camera)
                    .then(|| "Grant Camera permission to your terminal".to_string()),
            },
        ]
    }
}

/// `<video>:<audio>`, with `none` for a missing microphone.
pub fn avfoundation_input(video: &str, audio: Option<&str>) -> String {
    let audio = audio.filter(|a| !a.is_empty()).unwrap_or("none");
    format!("{video}:{audio}")
}

/// Parse the stderr of `ffmpeg -f avfoundation -list_devices true -i ""`.
pub fn parse_avfoundation_devices(stderr: &str) -> AvListing {
    let mut listing = AvListing::default();
    let mut in_audio: Option<bool> = None;

    for line in stderr.lines() {
        if line.contains("AVFoundation video devices") {
            in_audio = Some(false);
            continue;
        }
        if line.contains("AVFoundation audio devices") {
            in_audio = Some(true);
            continue;
        }
        let Some(audio) = in_audio else {
            continue;
        };
        let Some(device) = parse_device_line(line) else {
            continue;
        };
        if audio {
            listing.audio.push(device);
        } else {
            listing.video.push(device);
        }
    }

    listing
}

/// `[AVFoundation indev @ 0x7f8] [0] FaceTime HD Camera`
fn parse_device_line(line: &str) -> Option<AvDevice> {
    let (_, rest) = line.split_once("] [")?;
    let (index, name) = rest.split_once("] ")?;
    Some(AvDevice {
        index: index.trim().parse().ok()?,
        name: name.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
[AVFoundation indev @ 0x7f8b4c604a40] AVFoundation video devices:
[AVFoundation indev @ 0x7f8b4c604a40] [0] FaceTime HD Camera
[AVFoundation indev @ 0x7f8b4c604a40] [1] Capture screen 0
[AVFoundation indev @ 0x7f8b4c604a40] AVFoundation audio devices:
[AVFoundation indev @ 0x7f8b4c604a40] [0] MacBook Pro Microphone
[AVFoundation indev @ 0x7f8b4c604a40] [1] ZoomAudioDevice
: Input/output error
";

    #[test]
    fn screens_are_not_cameras() {
        let listing = parse_avfoundation_devices(LISTING);
        let cameras: Vec<_> = listing.cameras().map(|d| d.name.as_str()).collect();
        assert_eq!(cameras, vec!["FaceTime HD Camera"]);
        assert_eq!(listing.primary_screen().map(|d| d.index), Some(1));
        assert_eq!(listing.audio.len(), 2);
        assert_eq!(listing.audio[1].name, "ZoomAudioDevice");
    }

    #[test]
    fn window_capture_is_unsupported() {
        let sources = MacSources::new(MediaTools::from_path());
        let err = sources
            .screen_input_args(&ScreenTarget::Window("Keynote".to_string()), 30)
            .unwrap_err();
        assert!(matches!(err, DuocastError::Unsupported { .. }));
        assert!(sources.list_captureable_windows().unwrap().is_empty());
    }

    #[test]
    fn missing_microphone_maps_to_none() {
        assert_eq!(avfoundation_input("FaceTime HD Camera", None), "FaceTime HD Camera:none");
        assert_eq!(avfoundation_input("Cam", Some("Mic")), "Cam:Mic");
    }
}
