//! Record in the foreground.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use duocast_capture_engine::StartRequest;
use duocast_common::format_duration;
use duocast_media_engine::FilterGraphSpec;

use super::{print_asset, print_record, progress_printer, Context};

/// What to capture.
#[derive(clap::Args, Debug)]
pub struct SourceArgs {
    /// Camera name as listed by `duocast devices`
    #[arg(long)]
    pub camera: String,

    /// Microphone name; compositing needs the audio it records
    #[arg(long)]
    pub mic: Option<String>,

    /// Record a single window instead of the desktop
    #[arg(long)]
    pub window: Option<String>,
}

impl SourceArgs {
    pub fn into_request(self) -> StartRequest {
        let mut request = StartRequest::new(self.camera);
        if let Some(mic) = self.mic {
            request = request.with_audio(mic);
        }
        if let Some(window) = self.window {
            request = request.with_window(window);
        }
        request
    }
}

pub async fn run(
    ctx: Context,
    source: SourceArgs,
    duration: Option<f64>,
    composite: bool,
) -> anyhow::Result<()> {
    if let Some(secs) = duration {
        if !secs.is_finite() || secs <= 0.0 {
            anyhow::bail!("Duration must be a positive number of seconds, got {secs}");
        }
    }

    let orchestrator = Arc::new(ctx.orchestrator());
    let request = source.into_request();
    println!("Starting capture");
    println!("  Camera: {}", request.video_device);
    println!("  Microphone: {}", request.audio_device.as_deref().unwrap_or("(none)"));
    println!("  Screen: {}", request.window_title.as_deref().unwrap_or("desktop"));
    println!("  Encoder: {}", ctx.encoder.probe());
    println!();

    let record = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::task::spawn_blocking(move || orchestrator.start(&request)).await??
    };
    tracing::debug!(?record, "Capture started");

    match duration {
        Some(secs) => println!("Recording for {secs:.1}s (Ctrl+C stops early)..."),
        None => println!("Press Ctrl+C to stop recording..."),
    }

    let deadline = duration.map(|secs| tokio::time::Instant::now() + Duration::from_secs_f64(secs));
    let stop_at = async move {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    };
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(stop_at, ctrl_c);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                break;
            }
            _ = &mut stop_at => break,
            _ = ticker.tick() => {
                print!("\r  Recording: {}  ", format_duration(record.elapsed_secs()));
                let _ = std::io::stdout().flush();
            }
        }
    }

    println!();
    println!("Stopping...");
    let stopped = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::task::spawn_blocking(move || orchestrator.stop()).await??
    };
    print_record(&stopped);
    if let Some(error) = stopped.error {
        anyhow::bail!("Capture failed: {error}");
    }

    if composite {
        let inputs = orchestrator.composite_inputs();
        let spec = FilterGraphSpec::from(ctx.config.composite);
        println!();
        println!("Compositing to {}", inputs.output.display());
        let compositor = ctx.compositor();
        let asset = tokio::task::spawn_blocking(move || {
            compositor.composite(&inputs, &spec, Some(progress_printer()))
        })
        .await??;
        println!();
        print_asset(&asset);
    } else {
        let paths = orchestrator.raw_outputs();
        println!("Screen: {}", paths.screen_raw.display());
        println!("Webcam: {}", paths.webcam_raw.display());
    }

    Ok(())
}
