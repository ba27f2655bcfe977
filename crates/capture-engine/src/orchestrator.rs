//! Dual-process capture orchestration.
//!
//! `start` spawns the screen and webcam captures detached and returns; the
//! caller polls the persisted record while they run. `stop` kills both
//! process trees, waits for the files to flush and validates them. The
//! record is always terminal after `stop`.

use std::path::Path;
use std::process::Child;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use duocast_common::clock::elapsed_since;
use duocast_common::config::{AppConfig, RecordingDefaults};
use duocast_common::process::{kill_process_tree, process_exists};
use duocast_common::{DuocastError, DuocastResult, MediaTools};
use duocast_media_engine::{CompositeInputs, EncoderProbe};
use duocast_platform_core::{CaptureSources, DeviceList, ScreenTarget};

use crate::pipeline::{
    check_raw_output, screen_capture_args, spawn_capture, webcam_capture_args, RecordingPaths,
    StreamKind,
};
use crate::session::{remove_quietly, SessionRecord, SessionState, SessionStore};

/// Timing and validation parameters for a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    pub fps: u32,
    /// Smallest raw output accepted as a valid capture.
    pub min_output_bytes: u64,
    /// Pause between killing the captures and validating their files.
    pub flush_delay: Duration,
    /// Pause between spawning and the immediate-exit check.
    pub spawn_check_delay: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from(&RecordingDefaults::default())
    }
}

impl From<&RecordingDefaults> for CaptureSettings {
    fn from(defaults: &RecordingDefaults) -> Self {
        Self {
            fps: defaults.fps,
            min_output_bytes: defaults.min_output_bytes,
            flush_delay: Duration::from_millis(defaults.flush_delay_ms),
            spawn_check_delay: Duration::from_millis(300),
        }
    }
}

/// What to record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub video_device: String,
    pub audio_device: Option<String>,
    /// Window title; `None` records the whole desktop.
    pub window_title: Option<String>,
}

impl StartRequest {
    pub fn new(video_device: impl Into<String>) -> Self {
        Self {
            video_device: video_device.into(),
            audio_device: None,
            window_title: None,
        }
    }

    pub fn with_audio(mut self, audio: impl Into<String>) -> Self {
        self.audio_device = Some(audio.into());
        self
    }

    pub fn with_window(mut self, title: impl Into<String>) -> Self {
        self.window_title = Some(title.into());
        self
    }
}

/// Owns the capture processes and the persisted session record.
pub struct CaptureOrchestrator {
    sources: Arc<dyn CaptureSources>,
    tools: MediaTools,
    encoder: Arc<EncoderProbe>,
    store: SessionStore,
    paths: RecordingPaths,
    settings: CaptureSettings,
    /// Handles of captures spawned by this process, reaped on stop.
    children: Mutex<Vec<Child>>,
}

impl std::fmt::Debug for CaptureOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureOrchestrator")
            .field("platform", &self.sources.platform())
            .field("paths", &self.paths)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CaptureOrchestrator {
    /// Orchestrator working in `config.temp_dir()`.
    pub fn new(
        config: &AppConfig,
        tools: MediaTools,
        encoder: Arc<EncoderProbe>,
        sources: Arc<dyn CaptureSources>,
    ) -> Self {
        Self::with_settings(
            &config.temp_dir(),
            CaptureSettings::from(&config.recording),
            tools,
            encoder,
            sources,
        )
    }

    pub fn with_settings(
        work_dir: &Path,
        settings: CaptureSettings,
        tools: MediaTools,
        encoder: Arc<EncoderProbe>,
        sources: Arc<dyn CaptureSources>,
    ) -> Self {
        Self {
            sources,
            tools,
            encoder,
            store: SessionStore::new(work_dir),
            paths: RecordingPaths::in_dir(work_dir),
            settings,
            children: Mutex::new(Vec::new()),
        }
    }

    pub fn raw_outputs(&self) -> &RecordingPaths {
        &self.paths
    }

    /// Inputs for compositing this session's captures.
    pub fn composite_inputs(&self) -> CompositeInputs {
        CompositeInputs {
            screen: self.paths.screen_raw.clone(),
            webcam: self.paths.webcam_raw.clone(),
            output: self.paths.composite.clone(),
        }
    }

    pub fn list_devices(&self) -> DuocastResult<DeviceList> {
        self.sources.list_devices()
    }

    pub fn list_captureable_windows(&self) -> DuocastResult<Vec<String>> {
        self.sources.list_captureable_windows()
    }

    /// Launch both captures and return once they are running.
    pub fn start(&self, request: &StartRequest) -> DuocastResult<SessionRecord> {
        if request.video_device.trim().is_empty() {
            return Err(DuocastError::invalid_input("A video device is required"));
        }

        self.store.with_lock(|| {
            if let Some(current) = self.store.read()? {
                if current.recording {
                    return Err(DuocastError::SessionActive {
                        started_at: current
                            .start_time
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_else(|| "unknown".to_string()),
                    });
                }
            }

            for path in self.paths.all() {
                remove_quietly(path);
            }

            let target = ScreenTarget::from_title(request.window_title.as_deref());
            let encoder = self.encoder.probe();
            let screen_args = screen_capture_args(
                self.sources.as_ref(),
                &target,
                self.settings.fps,
                encoder,
                &self.paths.screen_raw,
            )?;
            let webcam_args = webcam_capture_args(
                self.sources.as_ref(),
                &request.video_device,
                request.audio_device.as_deref(),
                encoder,
                &self.paths.webcam_raw,
            )?;
            tracing::debug!(args = ?screen_args, "Screen capture command");
            tracing::debug!(args = ?webcam_args, "Webcam capture command");

            let mut screen = match spawn_capture(&self.tools, &screen_args) {
                Ok(child) => child,
                Err(e) => {
                    return Err(self.abort_start(
                        StreamKind::Screen,
                        format!("could not start ({e})"),
                        &mut [],
                    ))
                }
            };
            let start_time = Utc::now();
            let mut webcam = match spawn_capture(&self.tools, &webcam_args) {
                Ok(child) => child,
                Err(e) => {
                    return Err(self.abort_start(
                        StreamKind::Webcam,
                        format!("could not start ({e})"),
                        &mut [&mut screen],
                    ))
                }
            };
            tracing::info!(
                screen_pid = screen.id(),
                webcam_pid = webcam.id(),
                encoder = %encoder,
                screen_target = ?target,
                "Capture processes started"
            );

            if !self.settings.spawn_check_delay.is_zero() {
                std::thread::sleep(self.settings.spawn_check_delay);
            }
            for kind in [StreamKind::Screen, StreamKind::Webcam] {
                let child = match kind {
                    StreamKind::Screen => &mut screen,
                    StreamKind::Webcam => &mut webcam,
                };
                if let Ok(Some(status)) = child.try_wait() {
                    let reason = format!("exited immediately ({status}); the device may be busy");
                    return Err(self.abort_start(kind, reason, &mut [&mut screen, &mut webcam]));
                }
            }

            let record = SessionRecord::started(screen.id(), webcam.id(), start_time);
            self.store.write(&record)?;
            self.hold_children([screen, webcam]);
            Ok(record)
        })
    }

    /// Kill `spawned`, persist a terminal failure and build the error.
    /// Runs under the session lock.
    fn abort_start(
        &self,
        kind: StreamKind,
        reason: String,
        spawned: &mut [&mut Child],
    ) -> DuocastError {
        for child in spawned.iter_mut() {
            kill_process_tree(child.id());
            let _ = child.wait();
        }
        let message = format!("{} {reason}", kind.label());
        tracing::error!(stream = %kind, %message, "Capture failed to start");
        if let Err(e) = self.store.write(&SessionRecord::failed(message.clone())) {
            tracing::warn!(error = %e, "Failed to persist capture failure");
        }
        DuocastError::device_unavailable(message)
    }

    fn hold_children(&self, spawned: [Child; 2]) {
        match self.children.lock() {
            Ok(mut children) => children.extend(spawned),
            Err(poisoned) => poisoned.into_inner().extend(spawned),
        }
    }

    fn reap_children(&self) {
        let mut children = match self.children.lock() {
            Ok(children) => children,
            Err(poisoned) => poisoned.into_inner(),
        };
        for mut child in children.drain(..) {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    /// Stop the active capture. A no-op returning the current snapshot when
    /// nothing is recording.
    pub fn stop(&self) -> DuocastResult<SessionRecord> {
        self.store.with_lock(|| {
            let current = self.store.read()?.unwrap_or_default();
            if !current.recording {
                return Ok(current);
            }

            for pid in current.pids() {
                let killed = kill_process_tree(pid);
                tracing::debug!(pid, killed, "Capture process killed");
            }
            let duration = current.start_time.map(elapsed_since).unwrap_or(0.0);
            self.reap_children();

            if !self.settings.flush_delay.is_zero() {
                std::thread::sleep(self.settings.flush_delay);
            }
            for pid in current.pids().filter(|pid| process_exists(*pid)) {
                tracing::warn!(pid, "Capture process still running after kill");
            }

            let failures: Vec<String> = [StreamKind::Screen, StreamKind::Webcam]
                .into_iter()
                .filter_map(|kind| {
                    check_raw_output(kind, self.paths.raw(kind), self.settings.min_output_bytes)
                        .map(|size| tracing::debug!(stream = %kind, size, "Capture output valid"))
                        .err()
                })
                .collect();
            let error = (!failures.is_empty()).then(|| failures.join("; "));

            let record = SessionRecord {
                recording: false,
                done: error.is_none(),
                duration: Some(duration),
                error,
                ..current
            };
            self.store.write_terminal(&record)?;

            match &record.error {
                None => tracing::info!(duration_secs = duration, "Capture stopped"),
                Some(message) => {
                    let error = DuocastError::capture_validation(message.clone());
                    tracing::warn!(duration_secs = duration, %error, "Capture stopped")
                }
            }
            Ok(record)
        })
    }

    /// Snapshot of the record; `None` if no session was ever started.
    pub fn status(&self) -> DuocastResult<Option<SessionRecord>> {
        self.store.read()
    }

    pub fn state(&self) -> DuocastResult<SessionState> {
        Ok(self.snapshot()?.state())
    }

    pub fn is_recording(&self) -> DuocastResult<bool> {
        Ok(self.snapshot()?.recording)
    }

    pub fn is_done(&self) -> DuocastResult<bool> {
        Ok(self.snapshot()?.done)
    }

    pub fn elapsed_secs(&self) -> DuocastResult<f64> {
        Ok(self.snapshot()?.elapsed_secs())
    }

    pub fn error(&self) -> DuocastResult<Option<String>> {
        Ok(self.snapshot()?.error)
    }

    fn snapshot(&self) -> DuocastResult<SessionRecord> {
        Ok(self.store.read()?.unwrap_or_default())
    }

    /// Return to a clean slate: stop any active capture, kill anything the
    /// record still points at and delete every session file.
    pub fn reset(&self) -> DuocastResult<()> {
        if let Err(e) = self.stop() {
            tracing::debug!(error = %e, "Stop during reset failed");
        }

        let cleanup = || -> DuocastResult<()> {
            if let Some(record) = self.store.read()? {
                for pid in record.pids() {
                    if kill_process_tree(pid) {
                        tracing::debug!(pid, "Killed lingering capture process");
                    }
                }
            }
            self.reap_children();
            for path in self.paths.all() {
                remove_quietly(path);
            }
            self.store.clear();
            Ok(())
        };

        match self.store.with_lock(cleanup) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::debug!(error = %e, "Session lock unavailable, resetting without it");
                cleanup()
            }
        }
    }
}
