//! H.264 encoder selection.
//!
//! Hardware encoders are tried in a fixed order by encoding a tiny synthetic
//! clip to the null muxer. The first that works wins; `libx264` is the
//! fallback and is never an error. The result is memoized per
//! [`EncoderProbe`] instance, which callers share through an `Arc`.

use std::fmt;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use duocast_common::{DuocastError, DuocastResult, MediaTools};
use serde::{Deserialize, Serialize};

/// Upper bound for a single candidate's test encode.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const PROBE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Synthetic input for test encodes. Large enough for every hardware
/// encoder's minimum frame size.
const PROBE_SOURCE: &str = "color=black:s=256x256:d=0.1";

/// A usable H.264 encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderId {
    Nvenc,
    Qsv,
    Amf,
    Libx264,
}

/// How much quality an encode may trade for speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedProfile {
    /// Live capture and compositing.
    Realtime,
    /// Offline trims.
    Fast,
}

impl EncoderId {
    /// Hardware candidates in probing order.
    pub const HARDWARE_CANDIDATES: [EncoderId; 3] = [Self::Nvenc, Self::Qsv, Self::Amf];

    /// Name passed to ffmpeg's `-c:v`.
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            Self::Nvenc => "h264_nvenc",
            Self::Qsv => "h264_qsv",
            Self::Amf => "h264_amf",
            Self::Libx264 => "libx264",
        }
    }

    pub fn from_ffmpeg_name(name: &str) -> Option<Self> {
        match name.trim() {
            "h264_nvenc" => Some(Self::Nvenc),
            "h264_qsv" => Some(Self::Qsv),
            "h264_amf" => Some(Self::Amf),
            "libx264" => Some(Self::Libx264),
            _ => None,
        }
    }

    pub fn is_hardware(self) -> bool {
        self != Self::Libx264
    }

    /// Speed-tuning arguments for this encoder.
    pub fn speed_args(self, profile: SpeedProfile) -> Vec<String> {
        let args: [&str; 2] = match (self, profile) {
            (Self::Libx264, SpeedProfile::Realtime) => ["-preset", "ultrafast"],
            (Self::Libx264, SpeedProfile::Fast) => ["-preset", "fast"],
            (Self::Nvenc, _) => ["-preset", "p1"],
            (Self::Qsv, _) => ["-preset", "veryfast"],
            (Self::Amf, _) => ["-quality", "speed"],
        };
        args.iter().map(|s| s.to_string()).collect()
    }

    /// `-c:v <name>` followed by the speed arguments.
    pub fn codec_args(self, profile: SpeedProfile) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), self.ffmpeg_name().to_string()];
        args.extend(self.speed_args(profile));
        args
    }
}

impl fmt::Display for EncoderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ffmpeg_name())
    }
}

/// Runs a single candidate's test encode.
pub trait EncoderTester: Send + Sync {
    /// Whether `encoder` completed a test encode successfully.
    fn test(&self, encoder: EncoderId) -> bool;
}

/// Test encodes through the real ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegEncoderTester {
    tools: MediaTools,
    timeout: Duration,
}

impl FfmpegEncoderTester {
    pub fn new(tools: MediaTools) -> Self {
        Self {
            tools,
            timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl EncoderTester for FfmpegEncoderTester {
    fn test(&self, encoder: EncoderId) -> bool {
        let mut cmd = self.tools.ffmpeg_command();
        cmd.args(["-hide_banner", "-loglevel", "error", "-f", "lavfi", "-i", PROBE_SOURCE])
            .args(["-c:v", encoder.ffmpeg_name(), "-f", "null", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(encoder = %encoder, error = %e, "Encoder test could not start");
                return false;
            }
        };

        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return status.success(),
                Ok(None) if started.elapsed() >= self.timeout => {
                    tracing::warn!(
                        encoder = %encoder,
                        timeout_secs = self.timeout.as_secs_f64(),
                        "Encoder test timed out"
                    );
                    let _ = child.kill();
                    let _ = child.wait();
                    return false;
                }
                Ok(None) => std::thread::sleep(PROBE_POLL_INTERVAL),
                Err(e) => {
                    tracing::debug!(encoder = %encoder, error = %e, "Encoder test wait failed");
                    let _ = child.kill();
                    return false;
                }
            }
        }
    }
}

/// Memoized encoder choice.
pub struct EncoderProbe {
    tester: Box<dyn EncoderTester>,
    selected: OnceLock<EncoderId>,
}

impl fmt::Debug for EncoderProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderProbe")
            .field("selected", &self.selected.get())
            .finish_non_exhaustive()
    }
}

impl EncoderProbe {
    /// Probe with the real ffmpeg binary.
    pub fn new(tools: MediaTools) -> Self {
        Self::with_tester(FfmpegEncoderTester::new(tools))
    }

    pub fn with_tester(tester: impl EncoderTester + 'static) -> Self {
        Self {
            tester: Box::new(tester),
            selected: OnceLock::new(),
        }
    }

    /// Skip probing and always use `encoder`.
    pub fn fixed(encoder: EncoderId) -> Self {
        let selected = OnceLock::new();
        let _ = selected.set(encoder);
        Self {
            tester: Box::new(NoHardware),
            selected,
        }
    }

    /// Honour a configured encoder name, otherwise probe.
    pub fn from_config(tools: MediaTools, pinned: Option<&str>) -> DuocastResult<Self> {
        match pinned.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => EncoderId::from_ffmpeg_name(name)
                .map(Self::fixed)
                .ok_or_else(|| DuocastError::config(format!("Unknown encoder '{name}'"))),
            None => Ok(Self::new(tools)),
        }
    }

    /// The fastest working encoder. Probes on first call only.
    pub fn probe(&self) -> EncoderId {
        *self.selected.get_or_init(|| {
            for candidate in EncoderId::HARDWARE_CANDIDATES {
                if self.tester.test(candidate) {
                    tracing::info!(encoder = %candidate, "Hardware encoder selected");
                    return candidate;
                }
                tracing::debug!(encoder = %candidate, "Hardware encoder unavailable");
            }
            tracing::info!("No hardware encoder available, using libx264");
            EncoderId::Libx264
        })
    }

    /// The memoized choice, if probing already happened.
    pub fn cached(&self) -> Option<EncoderId> {
        self.selected.get().copied()
    }
}

struct NoHardware;

impl EncoderTester for NoHardware {
    fn test(&self, _encoder: EncoderId) -> bool {
        false
    }
}
