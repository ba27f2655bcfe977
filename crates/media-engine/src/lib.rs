//! Duocast Media Engine
//!
//! Everything that runs ffmpeg after capture:
//!
//! ```text
//! screen_raw.mkv ──┐
//!                  ├── Compositor (mask, ring, watermark) ── composite.mp4
//! webcam_raw.mkv ──┘                                             │
//!                                                                ├── ClipProcessor::trim
//!                                                                ├── ClipProcessor::concat
//!                                                                └── thumbnails / probe
//! ```
//!
//! One [`EncoderProbe`] is created at startup and shared by every consumer.

pub mod clip;
pub mod compositor;
pub mod encoder;
pub mod probe;
pub mod runner;

pub use clip::{ClipProcessor, CropRect, TrimRequest, WatermarkSpec};
pub use compositor::{BrandingAssets, CompositeInputs, Compositor, FilterGraphSpec};
pub use encoder::{EncoderId, EncoderProbe, SpeedProfile};
pub use probe::{MediaAsset, MediaMetadata};
pub use runner::{FfmpegRunner, ProgressCallback, TransformProgress};
