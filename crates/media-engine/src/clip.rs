//! Generic clip operations: probe, thumbnails, trim and concatenation.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use duocast_common::clock::ffmpeg_timestamp;
use duocast_common::{DuocastError, DuocastResult, MediaTools};
use serde::{Deserialize, Serialize};

use crate::encoder::{EncoderId, EncoderProbe, SpeedProfile};
use crate::probe::{probe_media, MediaAsset, MediaMetadata};
use crate::runner::{FfmpegRunner, ProgressCallback};

/// Prefix and extension of strip thumbnails.
const THUMB_PREFIX: &str = "thumb_";
const THUMB_EXT: &str = "jpg";

/// Pixels removed from each edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropRect {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl CropRect {
    pub fn is_empty(&self) -> bool {
        self.top == 0 && self.bottom == 0 && self.left == 0 && self.right == 0
    }

    /// The `crop` filter, or `None` when nothing is removed.
    pub fn filter(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(format!(
            "crop=in_w-{}-{}:in_h-{}-{}:{}:{}",
            self.left, self.right, self.top, self.bottom, self.left, self.top
        ))
    }
}

/// A logo burned into the top-right corner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkSpec {
    pub path: PathBuf,
    /// Logo width in output pixels.
    pub size: u32,
    /// Distance from the top and right edges.
    pub padding: u32,
}

/// A cut of `[start_secs, end_secs)` from `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimRequest {
    pub source: PathBuf,
    pub output: PathBuf,
    pub start_secs: f64,
    pub end_secs: f64,
    /// Re-encode for frame accuracy instead of cutting on keyframes.
    pub accurate: bool,
    pub crop: Option<CropRect>,
    pub watermark: Option<WatermarkSpec>,
}

impl TrimRequest {
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>, start: f64, end: f64) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            start_secs: start,
            end_secs: end,
            accurate: false,
            crop: None,
            watermark: None,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    fn crop_filter(&self) -> Option<String> {
        self.crop.as_ref().and_then(CropRect::filter)
    }

    /// Whether the cut must be re-encoded rather than stream-copied.
    pub fn needs_reencode(&self) -> bool {
        self.accurate || self.crop_filter().is_some() || self.watermark.is_some()
    }

    pub fn validate(&self) -> DuocastResult<()> {
        if !self.start_secs.is_finite() || !self.end_secs.is_finite() {
            return Err(DuocastError::invalid_input("Trim bounds must be finite"));
        }
        if self.start_secs < 0.0 {
            return Err(DuocastError::invalid_input(format!(
                "Trim start {} is negative",
                self.start_secs
            )));
        }
        if self.end_secs <= self.start_secs {
            return Err(DuocastError::invalid_input(format!(
                "Trim end {} must be after start {}",
                self.end_secs, self.start_secs
            )));
        }
        Ok(())
    }
}

/// ffmpeg arguments for a trim.
pub fn trim_args(request: &TrimRequest, encoder: EncoderId) -> Vec<String> {
    let start = ffmpeg_timestamp(request.start_secs);
    let duration = ffmpeg_timestamp(request.duration_secs());
    let mut args: Vec<String> = vec!["-ss".into(), start];

    if !request.needs_reencode() {
        args.extend(["-t".into(), duration, "-i".into()]);
        args.push(path_arg(&request.source));
        args.extend(
            ["-c", "copy", "-avoid_negative_ts", "make_zero", "-y"]
                .map(String::from),
        );
        args.push(path_arg(&request.output));
        return args;
    }

    args.push("-i".into());
    args.push(path_arg(&request.source));
    if let Some(watermark) = &request.watermark {
        args.push("-i".into());
        args.push(path_arg(&watermark.path));
    }
    args.extend(["-t".into(), duration]);

    let crop = request.crop_filter();
    match (&request.watermark, crop) {
        (Some(wm), crop) => {
            let (base, prefix) = match crop {
                Some(crop) => ("[cropped]", format!("[0:v]{crop}[cropped];")),
                None => ("[0:v]", String::new()),
            };
            let graph = format!(
                "{prefix}[1:v]scale={}:-1,format=rgba[logo];\
                 {base}[logo]overlay=main_w-overlay_w-{pad}:{pad}",
                wm.size,
                pad = wm.padding
            );
            args.extend(["-filter_complex".into(), graph]);
        }
        (None, Some(crop)) => args.extend(["-vf".into(), crop]),
        (None, None) => {}
    }

    args.extend(encoder.codec_args(SpeedProfile::Fast));
    args.extend(["-pix_fmt", "yuv420p", "-c:a", "aac", "-y"].map(String::from));
    args.push(path_arg(&request.output));
    args
}

/// Concat demuxer manifest: one `file '<path>'` line per input.
pub fn concat_manifest(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| {
            let escaped = p.to_string_lossy().replace('\'', "'\\''");
            format!("file '{escaped}'\n")
        })
        .collect()
}

/// ffmpeg arguments for strip thumbnails into `output_dir`.
pub fn thumbnail_strip_args(source: &Path, output_dir: &Path, interval_secs: u32, width: u32) -> Vec<String> {
    vec![
        "-i".into(),
        path_arg(source),
        "-vf".into(),
        format!("fps=1/{interval_secs},scale={width}:-2"),
        "-q:v".into(),
        "3".into(),
        "-y".into(),
        path_arg(&output_dir.join(format!("{THUMB_PREFIX}%04d.{THUMB_EXT}"))),
    ]
}

/// ffmpeg arguments for one frame at `timestamp_secs`.
pub fn single_thumbnail_args(source: &Path, timestamp_secs: f64, output: &Path, width: u32) -> Vec<String> {
    vec![
        "-ss".into(),
        ffmpeg_timestamp(timestamp_secs),
        "-i".into(),
        path_arg(source),
        "-frames:v".into(),
        "1".into(),
        "-vf".into(),
        format!("scale={width}:-2"),
        "-q:v".into(),
        "2".into(),
        "-y".into(),
        path_arg(output),
    ]
}

/// Clip operations sharing one ffmpeg installation and encoder choice.
#[derive(Debug, Clone)]
pub struct ClipProcessor {
    runner: FfmpegRunner,
    encoder: Arc<EncoderProbe>,
}

impl ClipProcessor {
    pub fn new(tools: MediaTools, encoder: Arc<EncoderProbe>) -> Self {
        Self {
            runner: FfmpegRunner::new(tools),
            encoder,
        }
    }

    fn tools(&self) -> &MediaTools {
        self.runner.tools()
    }

    /// Metadata for `path`.
    pub fn probe(&self, path: &Path) -> DuocastResult<MediaMetadata> {
        probe_media(self.tools(), path)
    }

    /// One frame every `interval_secs`, as `thumb_0001.jpg ...` in
    /// `output_dir`. Earlier thumbnails in that directory are removed first.
    pub fn thumbnails(
        &self,
        path: &Path,
        output_dir: &Path,
        interval_secs: u32,
        width: u32,
        progress: Option<ProgressCallback>,
    ) -> DuocastResult<Vec<PathBuf>> {
        if interval_secs == 0 || width == 0 {
            return Err(DuocastError::invalid_input(
                "Thumbnail interval and width must be positive",
            ));
        }
        require_file(path)?;
        std::fs::create_dir_all(output_dir)?;
        remove_thumbnails(output_dir)?;

        let duration = probe_media(self.tools(), path)
            .map(|m| m.duration_secs)
            .unwrap_or(0.0);
        self.runner.run(
            &thumbnail_strip_args(path, output_dir, interval_secs, width),
            duration,
            progress,
        )?;

        let thumbs = list_thumbnails(output_dir)?;
        tracing::info!(count = thumbs.len(), dir = %output_dir.display(), "Thumbnails extracted");
        Ok(thumbs)
    }

    /// Exactly one frame at `timestamp_secs`.
    pub fn single_thumbnail(
        &self,
        path: &Path,
        timestamp_secs: f64,
        output: &Path,
        width: u32,
    ) -> DuocastResult<PathBuf> {
        if !timestamp_secs.is_finite() || timestamp_secs < 0.0 {
            return Err(DuocastError::invalid_input(format!(
                "Invalid thumbnail timestamp {timestamp_secs}"
            )));
        }
        if width == 0 {
            return Err(DuocastError::invalid_input("Thumbnail width must be positive"));
        }
        require_file(path)?;
        ensure_parent(output)?;

        self.runner.run(
            &single_thumbnail_args(path, timestamp_secs, output, width),
            0.0,
            None,
        )?;
        if !output.exists() {
            return Err(DuocastError::transform(format!(
                "No frame at {} in {}",
                ffmpeg_timestamp(timestamp_secs),
                path.display()
            )));
        }
        Ok(output.to_path_buf())
    }

    /// Cut a clip, stream-copying when nothing requires a re-encode.
    pub fn trim(
        &self,
        request: &TrimRequest,
        progress: Option<ProgressCallback>,
    ) -> DuocastResult<MediaAsset> {
        request.validate()?;
        require_file(&request.source)?;
        if let Some(watermark) = &request.watermark {
            require_file(&watermark.path)?;
        }
        ensure_parent(&request.output)?;

        let encoder = if request.needs_reencode() {
            self.encoder.probe()
        } else {
            EncoderId::Libx264
        };
        tracing::info!(
            source = %request.source.display(),
            start_secs = request.start_secs,
            end_secs = request.end_secs,
            reencode = request.needs_reencode(),
            "Trimming clip"
        );
        self.runner.run(
            &trim_args(request, encoder),
            request.duration_secs(),
            progress,
        )?;
        MediaAsset::probe(self.tools(), &request.output)
    }

    /// Join clips with the concat demuxer (stream copy). Inputs must share
    /// codecs and resolution.
    pub fn concat(
        &self,
        paths: &[PathBuf],
        output: &Path,
        progress: Option<ProgressCallback>,
    ) -> DuocastResult<MediaAsset> {
        if paths.is_empty() {
            return Err(DuocastError::invalid_input("Nothing to concatenate"));
        }
        let mut inputs = Vec::with_capacity(paths.len());
        for path in paths {
            require_file(path)?;
            inputs.push(std::fs::canonicalize(path)?);
        }
        let parent = ensure_parent(output)?;

        let expected: f64 = inputs
            .iter()
            .filter_map(|p| probe_media(self.tools(), p).ok())
            .map(|m| m.duration_secs)
            .sum();

        // Removed on drop, whichever way the transform ends.
        let mut manifest = tempfile::Builder::new()
            .prefix(".concat_")
            .suffix(".txt")
            .tempfile_in(&parent)?;
        manifest.write_all(concat_manifest(&inputs).as_bytes())?;
        manifest.flush()?;

        let mut args: Vec<String> = ["-f", "concat", "-safe", "0", "-i"]
            .map(String::from)
            .to_vec();
        args.push(path_arg(manifest.path()));
        args.extend(["-c", "copy", "-y"].map(String::from));
        args.push(path_arg(output));

        tracing::info!(inputs = inputs.len(), output = %output.display(), "Concatenating clips");
        let result = self.runner.run(&args, expected, progress);
        if let Err(e) = manifest.close() {
            tracing::debug!(error = %e, "Failed to remove concat manifest");
        }
        result?;
        MediaAsset::probe(self.tools(), output)
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn require_file(path: &Path) -> DuocastResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(DuocastError::FileNotFound {
            path: path.to_path_buf(),
        })
    }
}

/// Create the output's parent directory and return it.
fn ensure_parent(output: &Path) -> DuocastResult<PathBuf> {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;
    Ok(parent)
}

fn is_thumbnail(path: &Path) -> bool {
    let name_ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(THUMB_PREFIX));
    let ext_ok = path.extension().and_then(|e| e.to_str()) == Some(THUMB_EXT);
    name_ok && ext_ok
}

fn list_thumbnails(dir: &Path) -> DuocastResult<Vec<PathBuf>> {
    let mut thumbs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| is_thumbnail(p))
        .collect();
    thumbs.sort();
    Ok(thumbs)
}

fn remove_thumbnails(dir: &Path) -> DuocastResult<()> {
    for old in list_thumbnails(dir)? {
        if let Err(e) = std::fs::remove_file(&old) {
            let err = DuocastError::cleanup(&old, e.to_string());
            tracing::warn!(error = %err, "Stale thumbnail left behind");
        }
    }
    Ok(())
}
