//! V4L2 camera and PulseAudio/PipeWire microphone enumeration.

use std::path::Path;
use std::process::Command;

use duocast_common::{DuocastError, DuocastResult};

/// A V4L2 capture node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V4l2Device {
    /// Human-readable name from sysfs.
    pub name: String,
    /// Device node, e.g. `/dev/video0`.
    pub node: String,
    pub number: u32,
}

/// Enumerate V4L2 capture nodes under `sysfs_root`.
///
/// A UVC camera registers several nodes (capture plus metadata); only the
/// node with `index` 0 is a capture interface. A missing `index` file is
/// treated as 0. A missing sysfs directory yields an empty list.
pub fn scan_v4l2(sysfs_root: &Path) -> DuocastResult<Vec<V4l2Device>> {
    let entries = match std::fs::read_dir(sysfs_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut devices = Vec::new();
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(number) = file_name
            .to_str()
            .and_then(|n| n.strip_prefix("video"))
            .and_then(|n| n.parse::<u32>().ok())
        else {
            continue;
        };

        let dir = entry.path();
        let index = std::fs::read_to_string(dir.join("index"))
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
            .unwrap_or(0);
        if index != 0 {
            tracing::debug!(node = number, index, "Skipping non-capture V4L2 node");
            continue;
        }

        let name = std::fs::read_to_string(dir.join("name"))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let node = format!("/dev/video{number}");
        devices.push(V4l2Device {
            name: if name.is_empty() { node.clone() } else { name },
            node,
            number,
        });
    }

    devices.sort_by_key(|d| d.number);
    Ok(devices)
}

/// Map a camera name (or an explicit `/dev/video*` path) to its device node.
pub fn resolve_video_node(sysfs_root: &Path, video: &str) -> DuocastResult<String> {
    if video.starts_with("/dev/") {
        return Ok(video.to_string());
    }
    scan_v4l2(sysfs_root)?
        .into_iter()
        .find(|d| d.name == video)
        .map(|d| d.node)
        .ok_or_else(|| DuocastError::device_unavailable(format!("No camera named '{video}'")))
}

/// List microphone sources known to the PulseAudio (or pipewire-pulse) server.
pub fn list_pulse_sources() -> DuocastResult<Vec<String>> {
    let output = match Command::new("pactl")
        .args(["list", "short", "sources"])
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(error = %e, "pactl not available; no microphones listed");
            return Ok(Vec::new());
        }
    };
    if !output.status.success() {
        return Err(DuocastError::device_unavailable(format!(
            "pactl exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(parse_pactl_sources(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse `pactl list short sources`, skipping monitors of output sinks.
pub fn parse_pactl_sources(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split('\t').nth(1))
        .map(str::trim)
        .filter(|name| !name.is_empty() && !name.ends_with(".monitor"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pactl_monitors_are_excluded() {
        let output = "\
0\talsa_output.pci-0000_00_1f.3.analog-stereo.monitor\tmodule-alsa-card.c\ts16le 2ch 48000Hz\tSUSPENDED
1\talsa_input.pci-0000_00_1f.3.analog-stereo\tmodule-alsa-card.c\ts16le 2ch 48000Hz\tRUNNING
2\talsa_input.usb-Blue_Yeti-00.analog-stereo\tmodule-alsa-card.c\ts16le 2ch 48000Hz\tIDLE
";
        assert_eq!(
            parse_pactl_sources(output),
            vec![
                "alsa_input.pci-0000_00_1f.3.analog-stereo",
                "alsa_input.usb-Blue_Yeti-00.analog-stereo"
            ]
        );
    }

    #[test]
    fn missing_sysfs_root_lists_nothing() {
        let devices = scan_v4l2(Path::new("/nonexistent/duocast/video4linux")).unwrap();
        assert!(devices.is_empty());
    }

    #[test]
    fn scan_sorts_numerically_and_skips_metadata_nodes() {
        let dir = tempfile::tempdir().unwrap();
        for (node, name, index) in [
            ("video10", "USB Capture", Some("0")),
            ("video2", "HD Webcam", Some("0")),
            ("video3", "HD Webcam", Some("1")),
            ("video4", "", None),
        ] {
            let path = dir.path().join(node);
            std::fs::create_dir_all(&path).unwrap();
            std::fs::write(path.join("name"), name).unwrap();
            if let Some(index) = index {
                std::fs::write(path.join("index"), index).unwrap();
            }
        }
        std::fs::create_dir_all(dir.path().join("v4l-subdev0")).unwrap();

        let devices = scan_v4l2(dir.path()).unwrap();
        let nodes: Vec<_> = devices.iter().map(|d| d.node.as_str()).collect();
        assert_eq!(nodes, vec!["/dev/video2", "/dev/video4", "/dev/video10"]);
        assert_eq!(devices[1].name, "/dev/video4");
    }
}
