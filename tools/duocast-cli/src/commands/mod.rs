pub mod check;
pub mod composite;
pub mod devices;
pub mod probe;
pub mod record;
pub mod session;
pub mod thumbnails;
pub mod trim;

use std::io::Write;
use std::sync::Arc;

use duocast_capture_engine::{get_sources, CaptureOrchestrator, SessionRecord, SessionState};
use duocast_common::{format_duration, AppConfig, MediaTools};
use duocast_media_engine::{
    BrandingAssets, ClipProcessor, Compositor, EncoderProbe, MediaAsset, ProgressCallback,
    TransformProgress,
};
use duocast_platform_core::CaptureSources;

/// Everything a command needs, built once from the loaded config.
pub struct Context {
    pub config: AppConfig,
    pub tools: MediaTools,
    pub encoder: Arc<EncoderProbe>,
}

impl Context {
    pub fn load() -> anyhow::Result<Self> {
        let config = AppConfig::load();
        let tools = MediaTools::resolve(&config.ffmpeg_dir());
        let encoder =
            EncoderProbe::from_config(tools.clone(), config.recording.encoder.as_deref())?;
        Ok(Self {
            config,
            tools,
            encoder: Arc::new(encoder),
        })
    }

    pub fn sources(&self) -> Arc<dyn CaptureSources> {
        get_sources(&self.tools)
    }

    pub fn orchestrator(&self) -> CaptureOrchestrator {
        CaptureOrchestrator::new(
            &self.config,
            self.tools.clone(),
            Arc::clone(&self.encoder),
            self.sources(),
        )
    }

    pub fn clips(&self) -> ClipProcessor {
        ClipProcessor::new(self.tools.clone(), Arc::clone(&self.encoder))
    }

    pub fn compositor(&self) -> Compositor {
        Compositor::new(
            self.tools.clone(),
            Arc::clone(&self.encoder),
            BrandingAssets::discover(&self.config.assets_dir),
        )
    }
}

/// Prints a single updating progress line.
pub fn progress_printer() -> ProgressCallback {
    Box::new(|p: TransformProgress| {
        print!(
            "\r  Progress: {:.1}% ({} done, ETA: {:.0}s)  ",
            p.fraction * 100.0,
            format_duration(p.out_time_secs),
            p.eta_secs,
        );
        let _ = std::io::stdout().flush();
    })
}

pub fn print_asset(asset: &MediaAsset) {
    let m = &asset.metadata;
    println!("{}", asset.path.display());
    println!("  Duration: {}", format_duration(m.duration_secs));
    if m.has_video() {
        println!(
            "  Video: {}x{} @ {:.2}fps ({})",
            m.width,
            m.height,
            m.fps,
            m.video_codec.as_deref().unwrap_or("unknown")
        );
    }
    if m.has_audio() {
        println!(
            "  Audio: {} ({} stream{})",
            m.audio_codec.as_deref().unwrap_or("unknown"),
            m.audio_streams,
            if m.audio_streams == 1 { "" } else { "s" }
        );
    }
    println!("  Size: {}", duocast_common::format_filesize(m.size_bytes));
}

pub fn print_record(record: &SessionRecord) {
    match record.state() {
        SessionState::Idle => println!("No capture session."),
        SessionState::Recording => {
            println!("Recording: {}", format_duration(record.elapsed_secs()));
            if let Some(start) = record.start_time {
                println!("  Started: {}", start.to_rfc3339());
            }
            for (label, pid) in [("Screen", record.screen_pid), ("Webcam", record.webcam_pid)] {
                if let Some(pid) = pid {
                    println!("  {label} PID: {pid}");
                }
            }
        }
        SessionState::Stopped(_) => {
            let status = if record.done { "Completed" } else { "Failed" };
            println!("{status}: {}", format_duration(record.elapsed_secs()));
            if let Some(error) = &record.error {
                println!("  Error: {error}");
            }
        }
    }
}
