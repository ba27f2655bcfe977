//! Duocast Linux Platform Integration
//!
//! Capture sources for Linux desktops:
//! - **V4L2:** camera enumeration via sysfs
//! - **PulseAudio/PipeWire:** microphone enumeration via `pactl`
//! - **X11:** `x11grab` screen capture and `wmctrl` window listing
//! - **Permissions:** capability detection and user guidance

pub mod devices;
pub mod permissions;
pub mod windows;

use std::path::PathBuf;

use duocast_common::{DuocastError, DuocastResult};
use duocast_platform_core::{
    filter_window_titles, Capability, CaptureSources, Platform, ScreenTarget,
};

pub use devices::{parse_pactl_sources, V4l2Device};
pub use windows::{parse_wmctrl_list, X11Window};

/// Default sysfs directory listing V4L2 nodes.
pub const V4L2_SYSFS_ROOT: &str = "/sys/class/video4linux";

/// Capture sources backed by V4L2, PulseAudio and X11.
#[derive(Debug, Clone)]
pub struct LinuxSources {
    sysfs_root: PathBuf,
}

impl Default for LinuxSources {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxSources {
    pub fn new() -> Self {
        Self::with_sysfs_root(V4L2_SYSFS_ROOT)
    }

    /// Read V4L2 nodes from a different sysfs directory.
    pub fn with_sysfs_root(root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: root.into(),
        }
    }

    fn display() -> String {
        std::env::var("DISPLAY").unwrap_or_else(|_| ":0.0".to_string())
    }
}

impl CaptureSources for LinuxSources {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    fn list_video_devices(&self) -> DuocastResult<Vec<String>> {
        Ok(devices::scan_v4l2(&self.sysfs_root)?
            .into_iter()
            .map(|d| d.name)
            .collect())
    }

    fn list_audio_devices(&self) -> DuocastResult<Vec<String>> {
        devices::list_pulse_sources()
    }

    fn list_captureable_windows(&self) -> DuocastResult<Vec<String>> {
        let windows = windows::list_x11_windows()?;
        Ok(filter_window_titles(windows.iter().map(|w| w.title.as_str())))
    }

    fn screen_input_args(&self, target: &ScreenTarget, fps: u32) -> DuocastResult<Vec<String>> {
        let mut args = vec![
            "-f".to_string(),
            "x11grab".to_string(),
            "-framerate".to_string(),
            fps.to_string(),
        ];
        if let ScreenTarget::Window(title) = target {
            let windows = windows::list_x11_windows()?;
            let window = windows::find_window(&windows, title).ok_or_else(|| {
                DuocastError::device_unavailable(format!("No window titled '{title}'"))
            })?;
            args.push("-window_id".to_string());
            args.push(window.id.clone());
        }
        args.push("-i".to_string());
        args.push(Self::display());
        Ok(args)
    }

    fn webcam_input_args(&self, video: &str, audio: Option<&str>) -> DuocastResult<Vec<String>> {
        let node = devices::resolve_video_node(&self.sysfs_root, video)?;
        let mut args = vec![
            "-f".to_string(),
            "v4l2".to_string(),
            "-i".to_string(),
            node,
        ];
        if let Some(source) = audio.filter(|a| !a.is_empty()) {
            args.extend(["-f".to_string(), "pulse".to_string(), "-i".to_string()]);
            args.push(source.to_string());
        }
        Ok(args)
    }

    fn capabilities(&self) -> Vec<Capability> {
        permissions::check_capabilities(&self.sysfs_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_sysfs() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (node, name, index) in [
            ("video0", "Integrated Camera", "0"),
            ("video1", "Integrated Camera", "1"),
        ] {
            let path = dir.path().join(node);
            std::fs::create_dir_all(&path).unwrap();
            std::fs::write(path.join("name"), format!("{name}\n")).unwrap();
            std::fs::write(path.join("index"), format!("{index}\n")).unwrap();
        }
        dir
    }

    #[test]
    fn webcam_args_resolve_name_to_node_and_add_pulse() {
        let sysfs = fake_sysfs();
        let sources = LinuxSources::with_sysfs_root(sysfs.path());

        let args = sources
            .webcam_input_args("Integrated Camera", Some("alsa_input.usb-mic"))
            .unwrap();
        assert_eq!(
            args,
            vec![
                "-f",
                "v4l2",
                "-i",
                "/dev/video0",
                "-f",
                "pulse",
                "-i",
                "alsa_input.usb-mic"
            ]
        );
    }

    #[test]
    fn webcam_args_without_microphone() {
        let sysfs = fake_sysfs();
        let sources = LinuxSources::with_sysfs_root(sysfs.path());
        let args = sources.webcam_input_args("/dev/video0", None).unwrap();
        assert_eq!(args, vec!["-f", "v4l2", "-i", "/dev/video0"]);
    }

    #[test]
    fn unknown_camera_is_unavailable() {
        let sysfs = fake_sysfs();
        let sources = LinuxSources::with_sysfs_root(sysfs.path());
        let err = sources.webcam_input_args("Missing Cam", None).unwrap_err();
        assert!(matches!(err, DuocastError::DeviceUnavailable { .. }));
    }

    #[test]
    fn desktop_capture_uses_x11grab() {
        let sources = LinuxSources::new();
        let args = sources.screen_input_args(&ScreenTarget::Desktop, 30).unwrap();
        assert_eq!(&args[..4], &["-f", "x11grab", "-framerate", "30"]);
        assert_eq!(args[4], "-i");
    }

    #[test]
    fn video_listing_uses_capture_nodes_only() {
        let sysfs = fake_sysfs();
        let sources = LinuxSources::with_sysfs_root(sysfs.path());
        assert_eq!(
            sources.list_video_devices().unwrap(),
            vec!["Integrated Camera"]
        );
    }
}
