//! Screen + webcam compositing.
//!
//! The webcam is masked into a circle and framed by a ring on a small
//! square canvas first, then that canvas is laid over the (downscaled)
//! screen once. An optional watermark goes top-right.
//!
//! ```text
//! screen_raw.mkv ── scale ≤ max width ─────────────────┐
//!                                                      ├── overlay (bottom-left) ── [logo overlay] ── out
//! webcam_raw.mkv ── scale/crop/pad ── alphamerge ── ring overlay
//!                                        │               │
//!                                      mask            ring
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use duocast_common::config::CompositeDefaults;
use duocast_common::{DuocastError, DuocastResult, MediaTools};
use serde::{Deserialize, Serialize};

use crate::encoder::{EncoderProbe, SpeedProfile};
use crate::probe::{probe_media, MediaAsset};
use crate::runner::{FfmpegRunner, ProgressCallback};

/// Circular mask asset (white disc on black, 400x400 reference).
pub const MASK_FILE: &str = "webcam-mask.png";
/// Decorative ring asset (transparent outside the ring).
pub const RING_FILE: &str = "webcam-frame.png";
/// Watermark asset.
pub const LOGO_FILE: &str = "watermark-logo.png";

/// Ring colour, `#FBBA00`.
pub const RING_RGB: (u8, u8, u8) = (0xFB, 0xBA, 0x00);

/// Branding assets are drawn on a 400px reference frame.
const REFERENCE_FRAME: u32 = 400;
const INNER_DIAMETER_REF: u32 = 344;
const MASK_RADIUS_REF: f64 = 172.0;
const RING_OUTER_RADIUS_REF: f64 = 190.0;

const MIN_WEBCAM_SIZE: u32 = 16;

/// Compositing geometry, in output pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterGraphSpec {
    /// Outer diameter of the circular webcam frame.
    pub webcam_size: u32,
    /// Distance of webcam and watermark from the frame edges.
    pub padding: u32,
    /// Watermark width.
    pub logo_size: u32,
    /// The screen is scaled down to at most this width, never up.
    pub max_screen_width: u32,
}

impl Default for FilterGraphSpec {
    fn default() -> Self {
        CompositeDefaults::default().into()
    }
}

impl From<CompositeDefaults> for FilterGraphSpec {
    fn from(d: CompositeDefaults) -> Self {
        Self {
            webcam_size: d.webcam_size,
            padding: d.padding,
            logo_size: d.logo_size,
            max_screen_width: d.max_screen_width,
        }
    }
}

impl FilterGraphSpec {
    pub fn validate(&self) -> DuocastResult<()> {
        if self.webcam_size < MIN_WEBCAM_SIZE {
            return Err(DuocastError::invalid_input(format!(
                "Webcam size {} is below {MIN_WEBCAM_SIZE}px",
                self.webcam_size
            )));
        }
        if self.max_screen_width < 2 {
            return Err(DuocastError::invalid_input("Screen width must be at least 2px"));
        }
        if self.logo_size == 0 {
            return Err(DuocastError::invalid_input("Logo size must be positive"));
        }
        Ok(())
    }

    /// Diameter the webcam picture is scaled to inside the ring.
    pub fn inner_diameter(&self) -> u32 {
        self.webcam_size * INNER_DIAMETER_REF / REFERENCE_FRAME
    }

    /// Offset that centres the inner picture on the square canvas.
    pub fn pad_offset(&self) -> u32 {
        (self.webcam_size - self.inner_diameter()) / 2
    }

    pub fn mask_radius(&self) -> f64 {
        self.scaled(MASK_RADIUS_REF)
    }

    /// Inner and outer radius of the ring.
    pub fn ring_radii(&self) -> (f64, f64) {
        (self.scaled(MASK_RADIUS_REF), self.scaled(RING_OUTER_RADIUS_REF))
    }

    fn scaled(&self, reference: f64) -> f64 {
        self.webcam_size as f64 * reference / REFERENCE_FRAME as f64
    }
}

/// Branding PNGs found on disk. Missing mask or ring is synthesized in the
/// filter graph; a missing logo means no watermark.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrandingAssets {
    pub mask: Option<PathBuf>,
    pub ring: Option<PathBuf>,
    pub logo: Option<PathBuf>,
}

impl BrandingAssets {
    /// Pick up whichever standard asset files exist in `dir`.
    pub fn discover(dir: &Path) -> Self {
        let existing = |name: &str| {
            let path = dir.join(name);
            path.is_file().then_some(path)
        };
        let assets = Self {
            mask: existing(MASK_FILE),
            ring: existing(RING_FILE),
            logo: existing(LOGO_FILE),
        };
        tracing::debug!(
            dir = %dir.display(),
            mask = assets.mask.is_some(),
            ring = assets.ring.is_some(),
            logo = assets.logo.is_some(),
            "Branding assets discovered"
        );
        assets
    }
}

/// Raw captures and the composite destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeInputs {
    pub screen: PathBuf,
    pub webcam: PathBuf,
    pub output: PathBuf,
}

/// A filter graph plus the image inputs it expects after the two captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGraph {
    pub graph: String,
    /// Inputs 2.. in order.
    pub extra_inputs: Vec<PathBuf>,
}

/// Build the compositing graph. Input 0 is the screen, input 1 the webcam.
pub fn build_filter_graph(spec: &FilterGraphSpec, assets: &BrandingAssets) -> FilterGraph {
    let size = spec.webcam_size;
    let inner = spec.inner_diameter();
    let offset = spec.pad_offset();
    let pad = spec.padding;
    let mut extra_inputs: Vec<PathBuf> = Vec::new();
    // Image inputs follow the two captures.
    let mut stage = |path: &Option<PathBuf>| {
        path.as_ref().map(|p| {
            extra_inputs.push(p.clone());
            extra_inputs.len() + 1
        })
    };

    let mask_index = stage(&assets.mask);
    let ring_index = stage(&assets.ring);
    let logo_index = stage(&assets.logo);

    let mut chains = vec![
        format!(
            "[0:v]scale='trunc(min({max},iw)/2)*2':-2[screen]",
            max = spec.max_screen_width
        ),
        format!(
            "[1:v]scale={inner}:{inner}:force_original_aspect_ratio=increase,\
             crop={inner}:{inner},setsar=1,\
             pad={size}:{size}:{offset}:{offset}:color=black@0.0,format=rgba[wc]"
        ),
    ];

    chains.push(match mask_index {
        Some(i) => format!("[{i}:v]scale={size}:{size},format=gray[mask]"),
        None => synthesized_mask(spec),
    });
    chains.push("[wc][mask]alphamerge[wc_masked]".to_string());

    chains.push(match ring_index {
        Some(i) => format!("[{i}:v]scale={size}:{size},format=rgba[ring]"),
        None => synthesized_ring(spec),
    });
    chains.push("[wc_masked][ring]overlay=0:0[wc_final]".to_string());

    let placed = format!("[screen][wc_final]overlay={pad}:main_h-overlay_h-{pad}:shortest=1");
    match logo_index {
        Some(i) => {
            chains.push(format!("{placed}[with_wc]"));
            chains.push(format!(
                "[{i}:v]scale={logo}:-1,format=rgba[logo]",
                logo = spec.logo_size
            ));
            chains.push(format!(
                "[with_wc][logo]overlay=main_w-overlay_w-{pad}:{pad}[out]"
            ));
        }
        None => chains.push(format!("{placed}[out]")),
    }

    FilterGraph {
        graph: chains.join(";"),
        extra_inputs,
    }
}

/// A one-frame white disc on black, matching the mask asset.
fn synthesized_mask(spec: &FilterGraphSpec) -> String {
    let size = spec.webcam_size;
    let centre = size as f64 / 2.0;
    format!(
        "color=c=black:s={size}x{size}:r=1:d=1,format=gray,\
         geq=lum='if(lte(hypot(X-{centre:.2},Y-{centre:.2}),{radius:.2}),255,0)'[mask]",
        radius = spec.mask_radius()
    )
}

/// A one-frame ring in [`RING_RGB`], transparent elsewhere.
fn synthesized_ring(spec: &FilterGraphSpec) -> String {
    let size = spec.webcam_size;
    let centre = size as f64 / 2.0;
    let (r_in, r_out) = spec.ring_radii();
    let (r, g, b) = RING_RGB;
    format!(
        "color=c=black:s={size}x{size}:r=1:d=1,format=rgba,\
         geq=r='{r}':g='{g}':b='{b}':\
         a='if(between(hypot(X-{centre:.2},Y-{centre:.2}),{r_in:.2},{r_out:.2}),255,0)'[ring]"
    )
}

/// Runs the compositing pipeline.
#[derive(Debug, Clone)]
pub struct Compositor {
    runner: FfmpegRunner,
    encoder: Arc<EncoderProbe>,
    assets: BrandingAssets,
}

impl Compositor {
    pub fn new(tools: MediaTools, encoder: Arc<EncoderProbe>, assets: BrandingAssets) -> Self {
        Self {
            runner: FfmpegRunner::new(tools),
            encoder,
            assets,
        }
    }

    pub fn assets(&self) -> &BrandingAssets {
        &self.assets
    }

    /// Full ffmpeg argument list for a composite.
    pub fn composite_args(&self, inputs: &CompositeInputs, spec: &FilterGraphSpec) -> Vec<String> {
        let graph = build_filter_graph(spec, &self.assets);
        let mut args = vec![
            "-i".to_string(),
            inputs.screen.to_string_lossy().into_owned(),
            "-i".to_string(),
            inputs.webcam.to_string_lossy().into_owned(),
        ];
        for extra in &graph.extra_inputs {
            args.push("-i".to_string());
            args.push(extra.to_string_lossy().into_owned());
        }
        args.extend([
            "-filter_complex".to_string(),
            graph.graph,
            "-map".to_string(),
            "[out]".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
        ]);
        args.extend(self.encoder.probe().codec_args(SpeedProfile::Realtime));
        args.extend(
            [
                "-pix_fmt",
                "yuv420p",
                "-c:a",
                "aac",
                "-threads",
                "0",
                "-shortest",
                "-movflags",
                "+faststart",
                "-y",
            ]
            .map(String::from),
        );
        args.push(inputs.output.to_string_lossy().into_owned());
        args
    }

    /// Merge the two raw captures into one branded video.
    pub fn composite(
        &self,
        inputs: &CompositeInputs,
        spec: &FilterGraphSpec,
        progress: Option<ProgressCallback>,
    ) -> DuocastResult<MediaAsset> {
        spec.validate()?;
        for path in [&inputs.screen, &inputs.webcam] {
            if !path.is_file() {
                return Err(DuocastError::FileNotFound { path: path.clone() });
            }
        }
        if let Some(parent) = inputs.output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let screen = probe_media(self.runner.tools(), &inputs.screen).ok();
        let webcam = probe_media(self.runner.tools(), &inputs.webcam).ok();
        if let Some(webcam) = &webcam {
            if !webcam.has_audio() {
                return Err(DuocastError::capture_validation(format!(
                    "Webcam capture {} has no audio stream; record with a microphone",
                    inputs.webcam.display()
                )));
            }
        }
        let expected = [screen, webcam]
            .into_iter()
            .flatten()
            .map(|m| m.duration_secs)
            .filter(|d| *d > 0.0)
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.min(d))))
            .unwrap_or(0.0);

        let args = self.composite_args(inputs, spec);
        tracing::info!(
            output = %inputs.output.display(),
            encoder = %self.encoder.probe(),
            expected_secs = expected,
            "Compositing captures"
        );
        self.runner.run(&args, expected, progress)?;
        MediaAsset::probe(self.runner.tools(), &inputs.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncoderId;
    use proptest::prelude::*;

    fn spec() -> FilterGraphSpec {
        FilterGraphSpec::default()
    }

    #[test]
    fn default_geometry() {
        let spec = spec();
        assert_eq!(spec.inner_diameter(), 258);
        assert_eq!(spec.pad_offset(), 21);
        assert!((spec.mask_radius() - 129.0).abs() < 1e-9);
        assert_eq!(spec.ring_radii(), (129.0, 142.5));
    }

    #[test]
    fn graph_with_all_assets_uses_png_inputs() {
        let assets = BrandingAssets {
            mask: Some(PathBuf::from("mask.png")),
            ring: Some(PathBuf::from("ring.png")),
            logo: Some(PathBuf::from("logo.png")),
        };
        let graph = build_filter_graph(&spec(), &assets);
        assert_eq!(
            graph.extra_inputs,
            vec![
                PathBuf::from("mask.png"),
                PathBuf::from("ring.png"),
                PathBuf::from("logo.png")
            ]
        );
        assert!(graph.graph.contains("[2:v]scale=300:300,format=gray[mask]"));
        assert!(graph.graph.contains("[3:v]scale=300:300,format=rgba[ring]"));
        assert!(graph.graph.contains("[4:v]scale=120:-1,format=rgba[logo]"));
        assert!(graph
            .graph
            .contains("[screen][wc_final]overlay=30:main_h-overlay_h-30:shortest=1[with_wc]"));
        assert!(graph
            .graph
            .ends_with("[with_wc][logo]overlay=main_w-overlay_w-30:30[out]"));
    }

    #[test]
    fn graph_without_assets_synthesizes_mask_and_ring() {
        let graph = build_filter_graph(&spec(), &BrandingAssets::default());
        assert!(graph.extra_inputs.is_empty());
        assert!(graph
            .graph
            .contains("geq=lum='if(lte(hypot(X-150.00,Y-150.00),129.00),255,0)'[mask]"));
        assert!(graph.graph.contains("geq=r='251':g='186':b='0'"));
        assert!(graph.graph.contains("129.00,142.50"));
        assert!(graph.graph.ends_with("shortest=1[out]"));
        assert!(!graph.graph.contains("[logo]"));
    }

    #[test]
    fn screen_is_never_upscaled() {
        let graph = build_filter_graph(&spec(), &BrandingAssets::default());
        assert!(graph
            .graph
            .starts_with("[0:v]scale='trunc(min(1920,iw)/2)*2':-2[screen]"));
    }

    #[test]
    fn logo_takes_next_free_input_when_mask_missing() {
        let assets = BrandingAssets {
            mask: None,
            ring: Some(PathBuf::from("ring.png")),
            logo: Some(PathBuf::from("logo.png")),
        };
        let graph = build_filter_graph(&spec(), &assets);
        assert!(graph.graph.contains("[2:v]scale=300:300,format=rgba[ring]"));
        assert!(graph.graph.contains("[3:v]scale=120:-1"));
    }

    #[test]
    fn composite_args_map_webcam_audio_only() {
        let compositor = Compositor::new(
            MediaTools::from_path(),
            Arc::new(EncoderProbe::fixed(EncoderId::Libx264)),
            BrandingAssets::default(),
        );
        let inputs = CompositeInputs {
            screen: PathBuf::from("screen_raw.mkv"),
            webcam: PathBuf::from("webcam_raw.mkv"),
            output: PathBuf::from("composite.mp4"),
        };
        let args = compositor.composite_args(&inputs, &spec()).join(" ");
        assert!(args.starts_with("-i screen_raw.mkv -i webcam_raw.mkv -filter_complex "));
        assert!(args.contains("-map [out] -map 1:a:0 -c:v libx264 -preset ultrafast"));
        assert!(args.contains("-c:a aac -threads 0 -shortest"));
        assert!(args.ends_with("-y composite.mp4"));
    }

    #[test]
    fn tiny_webcam_is_rejected() {
        let spec = FilterGraphSpec {
            webcam_size: 4,
            ..spec()
        };
        assert!(matches!(
            spec.validate(),
            Err(DuocastError::InvalidInput { .. })
        ));
    }

    #[test]
    fn discover_only_reports_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LOGO_FILE), b"png").unwrap();
        let assets = BrandingAssets::discover(dir.path());
        assert!(assets.mask.is_none());
        assert!(assets.ring.is_none());
        assert_eq!(assets.logo, Some(dir.path().join(LOGO_FILE)));
    }

    proptest! {
        #[test]
        fn inner_picture_fits_inside_ring(size in MIN_WEBCAM_SIZE..4000u32) {
            let spec = FilterGraphSpec { webcam_size: size, ..FilterGraphSpec::default() };
            let inner = spec.inner_diameter();
            let offset = spec.pad_offset();
            prop_assert!(inner < size);
            prop_assert!(offset * 2 + inner <= size);
            prop_assert!(size - (offset * 2 + inner) <= 1);
            let (r_in, r_out) = spec.ring_radii();
            prop_assert!(r_in < r_out);
            prop_assert!(r_out <= size as f64 / 2.0);
            prop_assert!(inner as f64 / 2.0 <= r_in + 0.5);
        }
    }
}
