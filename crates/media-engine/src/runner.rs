//! ffmpeg transform execution with progress streaming.
//!
//! Every transform runs with `-progress pipe:1`, so stdout carries a
//! line-oriented `key=value` stream. stderr is drained on its own thread so
//! ffmpeg never blocks on a full pipe; only its last [`DIAGNOSTIC_TAIL_BYTES`]
//! are kept for error reporting.

use std::io::{BufRead, BufReader, Read};
use std::process::Stdio;
use std::time::Instant;

use duocast_common::{DuocastError, DuocastResult, MediaTools};

/// How much of ffmpeg's stderr survives into a [`DuocastError::Transform`].
pub const DIAGNOSTIC_TAIL_BYTES: usize = 800;

/// Progress callback for transforms.
pub type ProgressCallback = Box<dyn Fn(TransformProgress) + Send>;

/// One progress report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformProgress {
    /// Completion in `[0.0, 1.0]`.
    pub fraction: f64,

    /// Output timestamp reached so far.
    pub out_time_secs: f64,

    /// Estimated seconds remaining.
    pub eta_secs: f64,

    /// ffmpeg reported `progress=end`.
    pub complete: bool,
}

/// Runs ffmpeg transforms.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    tools: MediaTools,
}

impl FfmpegRunner {
    pub fn new(tools: MediaTools) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &MediaTools {
        &self.tools
    }

    /// Run ffmpeg with `args` to completion.
    ///
    /// `expected_duration_secs` scales progress; zero or less means the
    /// fraction stays at 0 until completion.
    pub fn run(
        &self,
        args: &[String],
        expected_duration_secs: f64,
        progress: Option<ProgressCallback>,
    ) -> DuocastResult<()> {
        tracing::debug!(args = ?args, "Running ffmpeg");
        let mut cmd = self.tools.ffmpeg_command();
        cmd.args(["-hide_banner", "-nostats", "-progress", "pipe:1"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| DuocastError::transform(format!("Failed to start ffmpeg: {e}")))?;

        tracing::debug!(pid = child.id(), args_len = args.len(), "ffmpeg process started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DuocastError::transform("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DuocastError::transform("Failed to capture ffmpeg stderr"))?;

        let stderr_task = std::thread::spawn(move || drain_tail(stderr, DIAGNOSTIC_TAIL_BYTES));

        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        let mut state = ProgressState::default();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "Failed reading ffmpeg progress");
                    break;
                }
            }

            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            state.update(key, value);
            if key == "progress" {
                if let Some(cb) = &progress {
                    cb(progress_report(
                        &state,
                        expected_duration_secs,
                        start.elapsed().as_secs_f64(),
                    ));
                }
            }
        }

        let status = child
            .wait()
            .map_err(|e| DuocastError::transform(format!("Failed to wait on ffmpeg: {e}")))?;

        let tail = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            tracing::warn!(%status, elapsed_secs = start.elapsed().as_secs_f64(), "ffmpeg failed");
            let tail = tail.trim();
            return Err(DuocastError::transform(if tail.is_empty() {
                format!("ffmpeg exited with {status}")
            } else {
                tail.to_string()
            }));
        }

        tracing::debug!(elapsed_secs = start.elapsed().as_secs_f64(), "ffmpeg finished");
        Ok(())
    }
}

/// Read `reader` to the end, keeping only its last `cap` bytes.
pub fn drain_tail(mut reader: impl Read, cap: usize) -> String {
    let mut tail = TailBuffer::new(cap);
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => tail.push(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(error = %e, "Stopped reading ffmpeg stderr");
                break;
            }
        }
    }
    tail.into_string()
}

/// Fixed-capacity byte buffer that keeps the most recent bytes.
#[derive(Debug)]
struct TailBuffer {
    cap: usize,
    buf: Vec<u8>,
}

impl TailBuffer {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            buf: Vec::with_capacity(cap * 2),
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        if bytes.len() >= self.cap {
            self.buf.clear();
            self.buf.extend_from_slice(&bytes[bytes.len() - self.cap..]);
            return;
        }
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > self.cap {
            let excess = self.buf.len() - self.cap;
            self.buf.drain(..excess);
        }
    }

    fn into_string(self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both names.
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.trim().parse::<f64>() {
                    self.out_time_secs = (us / 1_000_000.0).max(0.0);
                }
            }
            "progress" => {
                self.complete = value.trim() == "end";
            }
            _ => {}
        }
    }
}

fn progress_report(
    state: &ProgressState,
    expected_duration_secs: f64,
    elapsed_secs: f64,
) -> TransformProgress {
    let fraction = if state.complete {
        1.0
    } else if expected_duration_secs <= 0.0 {
        0.0
    } else {
        (state.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
    };

    let eta_secs = if fraction > 0.0 {
        (elapsed_secs / fraction) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    TransformProgress {
        fraction,
        out_time_secs: state.out_time_secs,
        eta_secs,
        complete: state.complete,
    }
}
