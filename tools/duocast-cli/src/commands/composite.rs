//! Composite the two captures.

use std::path::PathBuf;

use duocast_media_engine::FilterGraphSpec;

use super::{print_asset, progress_printer, Context};

pub fn run(
    ctx: &Context,
    screen: Option<PathBuf>,
    webcam: Option<PathBuf>,
    output: Option<PathBuf>,
    webcam_size: Option<u32>,
    max_width: Option<u32>,
) -> anyhow::Result<()> {
    let mut inputs = ctx.orchestrator().composite_inputs();
    if let Some(screen) = screen {
        inputs.screen = screen;
    }
    if let Some(webcam) = webcam {
        inputs.webcam = webcam;
    }
    if let Some(output) = output {
        inputs.output = output;
    }

    let mut spec = FilterGraphSpec::from(ctx.config.composite);
    if let Some(size) = webcam_size {
        spec.webcam_size = size;
    }
    if let Some(width) = max_width {
        spec.max_screen_width = width;
    }

    let compositor = ctx.compositor();
    println!("Compositing:");
    println!("  Screen: {}", inputs.screen.display());
    println!("  Webcam: {}", inputs.webcam.display());
    println!("  Output: {}", inputs.output.display());
    if compositor.assets().logo.is_none() {
        println!("  Watermark: none (no logo in {})", ctx.config.assets_dir.display());
    }

    match compositor.composite(&inputs, &spec, Some(progress_printer())) {
        Ok(asset) => {
            println!("\nComposite complete:");
            print_asset(&asset);
            Ok(())
        }
        Err(e) => {
            println!();
            Err(anyhow::anyhow!("Composite failed: {e}"))
        }
    }
}
