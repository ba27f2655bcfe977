//! Media metadata via `ffprobe`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use duocast_common::{DuocastError, DuocastResult, MediaTools};
use serde::{Deserialize, Serialize};

/// Metadata derived from one ffprobe run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    /// From the first video stream's `r_frame_rate`.
    pub fps: f64,
    /// Codec of the first video stream.
    pub video_codec: Option<String>,
    /// Codec of the first audio stream.
    pub audio_codec: Option<String>,
    pub audio_streams: usize,
    pub size_bytes: u64,
}

impl MediaMetadata {
    pub fn has_video(&self) -> bool {
        self.video_codec.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio_streams > 0
    }
}

/// A file and its metadata at the time it was probed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub path: PathBuf,
    pub metadata: MediaMetadata,
}

impl MediaAsset {
    /// Probe `path` now. Nothing is cached between calls.
    pub fn probe(tools: &MediaTools, path: impl Into<PathBuf>) -> DuocastResult<Self> {
        let path = path.into();
        let metadata = probe_media(tools, &path)?;
        Ok(Self { path, metadata })
    }
}

/// Run ffprobe on `path`.
pub fn probe_media(tools: &MediaTools, path: &Path) -> DuocastResult<MediaMetadata> {
    if !path.exists() {
        return Err(DuocastError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let output = tools
        .ffprobe_command()
        .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| DuocastError::probe(format!("Failed to start ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(DuocastError::probe(format!(
            "ffprobe failed for {} ({}): {}",
            path.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let mut metadata = parse_ffprobe_json(&String::from_utf8_lossy(&output.stdout))?;
    if metadata.size_bytes == 0 {
        metadata.size_bytes = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    }
    tracing::debug!(
        path = %path.display(),
        duration_secs = metadata.duration_secs,
        width = metadata.width,
        height = metadata.height,
        "Probed media"
    );
    Ok(metadata)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_ffprobe_json(json: &str) -> DuocastResult<MediaMetadata> {
    let parsed: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| DuocastError::probe(format!("Unparseable ffprobe output: {e}")))?;

    if parsed.format.is_none() && parsed.streams.is_empty() {
        return Err(DuocastError::probe(
            "ffprobe returned no container or stream information",
        ));
    }

    let mut metadata = MediaMetadata::default();
    if let Some(format) = &parsed.format {
        metadata.duration_secs = format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);
        metadata.size_bytes = format
            .size
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
    }

    for stream in &parsed.streams {
        match stream.codec_type.as_deref() {
            Some("video") if metadata.video_codec.is_none() => {
                metadata.video_codec = Some(stream.codec_name.clone().unwrap_or_default());
                metadata.width = stream.width.unwrap_or(0);
                metadata.height = stream.height.unwrap_or(0);
                metadata.fps = stream
                    .r_frame_rate
                    .as_deref()
                    .map(parse_frame_rate)
                    .unwrap_or(0.0);
            }
            Some("audio") => {
                if metadata.audio_codec.is_none() {
                    metadata.audio_codec = Some(stream.codec_name.clone().unwrap_or_default());
                }
                metadata.audio_streams += 1;
            }
            _ => {}
        }
    }

    Ok(metadata)
}

/// `"30000/1001"` to frames per second; malformed or zero denominators give 0.
pub fn parse_frame_rate(rate: &str) -> f64 {
    let Some((num, den)) = rate.split_once('/') else {
        return rate.trim().parse().unwrap_or(0.0);
    };
    match (num.trim().parse::<f64>(), den.trim().parse::<f64>()) {
        (Ok(num), Ok(den)) if den > 0.0 => num / den,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPOSITE_PROBE: &str = r#"{
        "streams": [
            {"index": 0, "codec_name": "h264", "codec_type": "video", "width": 1920, "height": 1080, "r_frame_rate": "30000/1001"},
            {"index": 1, "codec_name": "aac", "codec_type": "audio", "sample_rate": "48000"}
        ],
        "format": {"filename": "composite.mp4", "duration": "12.480000", "size": "2456789"}
    }"#;

    #[test]
    fn parses_first_streams_and_format() {
        let meta = parse_ffprobe_json(COMPOSITE_PROBE).unwrap();
        assert!((meta.duration_secs - 12.48).abs() < 1e-9);
        assert_eq!((meta.width, meta.height), (1920, 1080));
        assert!((meta.fps - 29.97).abs() < 0.01);
        assert_eq!(meta.video_codec.as_deref(), Some("h264"));
        assert_eq!(meta.audio_codec.as_deref(), Some("aac"));
        assert_eq!(meta.audio_streams, 1);
        assert_eq!(meta.size_bytes, 2_456_789);
    }

    #[test]
    fn empty_probe_is_an_error() {
        let err = parse_ffprobe_json("{}").unwrap_err();
        assert!(matches!(err, DuocastError::Probe { .. }));
        assert!(parse_ffprobe_json("not json").is_err());
    }

    #[test]
    fn audio_only_file_has_no_video() {
        let meta = parse_ffprobe_json(
            r#"{"streams": [{"codec_type": "audio", "codec_name": "aac"}, {"codec_type": "audio", "codec_name": "opus"}]}"#,
        )
        .unwrap();
        assert!(!meta.has_video());
        assert_eq!(meta.audio_streams, 2);
        assert_eq!(meta.audio_codec.as_deref(), Some("aac"));
        assert_eq!(meta.duration_secs, 0.0);
    }

    #[test]
    fn frame_rate_fractions() {
        assert_eq!(parse_frame_rate("30/1"), 30.0);
        assert_eq!(parse_frame_rate("0/0"), 0.0);
        assert_eq!(parse_frame_rate("25"), 25.0);
        assert_eq!(parse_frame_rate("x/y"), 0.0);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = probe_media(
            &MediaTools::from_path(),
            Path::new("/nonexistent/duocast/clip.mp4"),
        )
        .unwrap_err();
        assert!(matches!(err, DuocastError::FileNotFound { .. }));
    }
}
