//! Trim and concatenate clips.

use std::path::PathBuf;

use duocast_common::{estimate_trimmed_size, format_filesize};
use duocast_media_engine::{CropRect, TrimRequest, WatermarkSpec};

use super::{print_asset, progress_printer, Context};

#[derive(clap::Args, Debug)]
pub struct TrimArgs {
    pub source: PathBuf,
    pub output: PathBuf,

    /// Start offset in seconds
    #[arg(long)]
    pub start: f64,

    /// End offset in seconds
    #[arg(long)]
    pub end: f64,

    /// Re-encode for a frame-accurate cut
    #[arg(long)]
    pub accurate: bool,

    /// Pixels to crop as TOP,BOTTOM,LEFT,RIGHT
    #[arg(long, value_parser = parse_crop)]
    pub crop: Option<CropRect>,

    /// Overlay this image at the top-right corner
    #[arg(long)]
    pub watermark: Option<PathBuf>,
}

/// Parse `TOP,BOTTOM,LEFT,RIGHT` pixel counts.
pub fn parse_crop(value: &str) -> Result<CropRect, String> {
    let edges: Vec<u32> = value
        .split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid crop '{value}': {e}"))?;
    match edges[..] {
        [top, bottom, left, right] => Ok(CropRect {
            top,
            bottom,
            left,
            right,
        }),
        _ => Err(format!(
            "invalid crop '{value}': expected TOP,BOTTOM,LEFT,RIGHT"
        )),
    }
}

pub fn run(ctx: &Context, args: TrimArgs) -> anyhow::Result<()> {
    let mut request = TrimRequest::new(args.source, args.output, args.start, args.end);
    request.accurate = args.accurate;
    request.crop = args.crop;
    request.watermark = args.watermark.map(|path| WatermarkSpec {
        path,
        size: ctx.config.watermark.size,
        padding: ctx.config.watermark.padding,
    });
    request.validate()?;

    let clips = ctx.clips();
    if let Ok(source) = clips.probe(&request.source) {
        println!(
            "Trimming {} ({:.1}s of {:.1}s, about {})",
            request.source.display(),
            request.duration_secs(),
            source.duration_secs,
            format_filesize(estimate_trimmed_size(
                source.size_bytes,
                source.duration_secs,
                request.duration_secs()
            ))
        );
    }
    if request.needs_reencode() {
        println!("  Re-encoding with {}", ctx.encoder.probe());
    } else {
        println!("  Stream copy (cut lands on the nearest keyframe)");
    }

    let asset = clips.trim(&request, Some(progress_printer()))?;
    println!("\nTrim complete:");
    print_asset(&asset);
    Ok(())
}

pub fn concat(ctx: &Context, inputs: Vec<PathBuf>, output: PathBuf) -> anyhow::Result<()> {
    println!("Joining {} clips into {}", inputs.len(), output.display());
    let asset = ctx
        .clips()
        .concat(&inputs, &output, Some(progress_printer()))?;
    println!("\nConcat complete:");
    print_asset(&asset);
    Ok(())
}
