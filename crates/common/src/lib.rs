//! Duocast Common Utilities
//!
//! Shared infrastructure for all Duocast crates:
//! - Error types and result aliases
//! - Wall-clock and ffmpeg timestamp helpers
//! - Tracing/logging initialization
//! - Configuration loading
//! - ffmpeg/ffprobe binary resolution and process spawning helpers

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod process;
pub mod tools;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use tools::MediaTools;
