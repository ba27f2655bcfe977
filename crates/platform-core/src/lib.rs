//! Duocast platform core contracts.
//!
//! This crate contains the cross-platform capture source interface used by
//! the capture engine without coupling it to a concrete OS backend. Each
//! `duocast-platform-*` crate provides one [`CaptureSources`] implementation.

use duocast_common::DuocastResult;
use serde::{Deserialize, Serialize};

/// Window titles that are never useful capture targets. Matched as
/// substrings, the way the shell reports them.
pub const NOISE_WINDOW_TITLES: [&str; 3] = ["Program Manager", "Settings", "Microsoft Text Input"];

/// Platform family a capture backend targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Linux,
    Windows,
    MacOS,
    #[default]
    Unknown,
}

/// Video and audio capture devices reported by the OS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceList {
    pub video: Vec<String>,
    pub audio: Vec<String>,
}

/// What the screen capture process records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenTarget {
    /// The whole desktop.
    Desktop,
    /// A single top-level window, by title.
    Window(String),
}

impl ScreenTarget {
    /// `Desktop` for a missing or blank title.
    pub fn from_title(title: Option<&str>) -> Self {
        match title.map(str::trim) {
            Some(t) if !t.is_empty() => Self::Window(t.to_string()),
            _ => Self::Desktop,
        }
    }
}

/// A platform requirement and whether it is satisfied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub description: String,
    pub available: bool,
    pub required: bool,
    pub fix_instructions: Option<String>,
}

/// OS capture sources: device and window enumeration plus the ffmpeg input
/// arguments that open them.
pub trait CaptureSources: Send + Sync {
    /// Platform this implementation targets.
    fn platform(&self) -> Platform;

    /// Camera devices, by the name ffmpeg expects.
    fn list_video_devices(&self) -> DuocastResult<Vec<String>>;

    /// Microphones, by the name ffmpeg expects.
    fn list_audio_devices(&self) -> DuocastResult<Vec<String>>;

    /// Both device lists.
    fn list_devices(&self) -> DuocastResult<DeviceList> {
        Ok(DeviceList {
            video: self.list_video_devices()?,
            audio: self.list_audio_devices()?,
        })
    }

    /// Visible window titles, already passed through [`filter_window_titles`].
    fn list_captureable_windows(&self) -> DuocastResult<Vec<String>>;

    /// ffmpeg input arguments (format, rate and `-i`) for screen capture.
    fn screen_input_args(&self, target: &ScreenTarget, fps: u32) -> DuocastResult<Vec<String>>;

    /// ffmpeg input arguments for the webcam and, when given, the microphone.
    fn webcam_input_args(&self, video: &str, audio: Option<&str>) -> DuocastResult<Vec<String>>;

    /// Requirements the host must meet for capture to work.
    fn capabilities(&self) -> Vec<Capability> {
        Vec::new()
    }
}

/// Drop empty and noise titles, then sort and de-duplicate.
pub fn filter_window_titles<I, S>(titles: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = titles
        .into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| !NOISE_WINDOW_TITLES.iter().any(|noise| t.contains(noise)))
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Print a user-friendly capability report.
pub fn print_capability_report(capabilities: &[Capability]) {
    for cap in capabilities {
        let status = if cap.available {
            "[OK]"
        } else if cap.required {
            "[MISSING - REQUIRED]"
        } else {
            "[MISSING - OPTIONAL]"
        };

        println!("  {} {}: {}", status, cap.name, cap.description);

        if let Some(ref fix) = cap.fix_instructions {
            println!("    Fix: {fix}");
        }
    }
}

/// Whether every required capability is available.
pub fn all_required_available(capabilities: &[Capability]) -> bool {
    capabilities.iter().all(|c| c.available || !c.required)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_filter_drops_noise_and_sorts() {
        let titles = [
            "Zoom Meeting",
            "Program Manager",
            "",
            "   ",
            "Settings",
            "Visual Studio Code",
            "Zoom Meeting",
            "Microsoft Text Input Application",
            "Browser",
        ];
        assert_eq!(
            filter_window_titles(titles),
            vec!["Browser", "Visual Studio Code", "Zoom Meeting"]
        );
    }

    #[test]
    fn screen_target_from_blank_title_is_desktop() {
        assert_eq!(ScreenTarget::from_title(None), ScreenTarget::Desktop);
        assert_eq!(ScreenTarget::from_title(Some("  ")), ScreenTarget::Desktop);
        assert_eq!(
            ScreenTarget::from_title(Some(" Slides ")),
            ScreenTarget::Window("Slides".to_string())
        );
    }

    #[test]
    fn optional_capabilities_do_not_block() {
        let caps = vec![
            Capability {
                name: "ffmpeg".to_string(),
                description: "encoder".to_string(),
                available: true,
                required: true,
                fix_instructions: None,
            },
            Capability {
                name: "wmctrl".to_string(),
                description: "window listing".to_string(),
                available: false,
                required: false,
                fix_instructions: Some("install wmctrl".to_string()),
            },
        ];
        assert!(all_required_available(&caps));
    }
}
