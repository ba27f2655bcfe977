//! Duocast Capture Engine
//!
//! Records the screen and the webcam (with microphone) as two independent
//! ffmpeg processes and tracks them through a persisted session record.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │              CaptureOrchestrator               │
//! │  ┌──────────────┐        ┌──────────────────┐ │
//! │  │ screen ffmpeg│        │ webcam+mic ffmpeg│ │
//! │  └──────┬───────┘        └────────┬─────────┘ │
//! │         ▼                         ▼           │
//! │   screen_raw.mkv           webcam_raw.mkv     │
//! │                                               │
//! │   recording_status.json  (+ .lock)            │
//! └───────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod orchestrator;
pub mod pipeline;
pub mod session;

pub use backend::get_sources;
pub use orchestrator::{CaptureOrchestrator, CaptureSettings, StartRequest};
pub use pipeline::{RecordingPaths, StreamKind};
pub use session::{SessionRecord, SessionState, SessionStore, StopOutcome};
