//! Capability detection and guidance for Linux.
//!
//! Screen capture goes through `x11grab`, so a pure Wayland session only
//! records XWayland surfaces.

use std::path::Path;
use std::process::{Command, Stdio};

use duocast_platform_core::Capability;

use crate::devices::scan_v4l2;

/// Check all capabilities and report status.
pub fn check_capabilities(sysfs_root: &Path) -> Vec<Capability> {
    vec![
        check_x11_display(),
        check_webcam_access(sysfs_root),
        check_tool(
            "PulseAudio Sources",
            "pactl for microphone enumeration",
            "pactl",
            &["--version"],
            "Install pulseaudio-utils (or pipewire-pulse)",
        ),
        check_tool(
            "Window Listing",
            "wmctrl for single-window capture",
            "wmctrl",
            &["-m"],
            "Install wmctrl: sudo apt install wmctrl",
        ),
    ]
}

fn check_x11_display() -> Capability {
    let available = std::env::var("DISPLAY").is_ok();
    let wayland_only = !available && std::env::var("WAYLAND_DISPLAY").is_ok();

    Capability {
        name: "X11 Display".to_string(),
        description: "x11grab screen capture on $DISPLAY".to_string(),
        available,
        required: true,
        fix_instructions: if available {
            None
        } else if wayland_only {
            Some("Enable XWayland or log into an X11 session".to_string())
        } else {
            Some("Run inside a graphical desktop session".to_string())
        },
    }
}

fn check_webcam_access(sysfs_root: &Path) -> Capability {
    let has_webcam = scan_v4l2(sysfs_root)
        .map(|devices| !devices.is_empty())
        .unwrap_or(false);

    Capability {
        name: "Webcam Device".to_string(),
        description: "Video4Linux camera for the presenter stream".to_string(),
        available: has_webcam,
        required: true,
        fix_instructions: if has_webcam {
            None
        } else {
            Some(
                "Connect a webcam and verify /dev/video* exists (v4l2-ctl --list-devices)"
                    .to_string(),
            )
        },
    }
}

fn check_tool(name: &str, description: &str, binary: &str, args: &[&str], fix: &str) -> Capability {
    let available = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok();

    Capability {
        name: name.to_string(),
        description: description.to_string(),
        available,
        required: false,
        fix_instructions: (!available).then(|| fix.to_string()),
    }
}
