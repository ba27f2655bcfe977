//! Thumbnail extraction.

use std::path::PathBuf;

use super::{progress_printer, Context};

pub fn strip(
    ctx: &Context,
    path: PathBuf,
    dir: Option<PathBuf>,
    interval: Option<u32>,
    width: Option<u32>,
) -> anyhow::Result<()> {
    let defaults = &ctx.config.thumbnails;
    let dir = dir.unwrap_or_else(|| ctx.config.thumbnails_dir());
    let thumbs = ctx.clips().thumbnails(
        &path,
        &dir,
        interval.unwrap_or(defaults.interval_secs),
        width.unwrap_or(defaults.width),
        Some(progress_printer()),
    )?;
    println!();
    for thumb in &thumbs {
        println!("{}", thumb.display());
    }
    println!("{} thumbnails in {}", thumbs.len(), dir.display());
    Ok(())
}

pub fn single(
    ctx: &Context,
    path: PathBuf,
    at: f64,
    output: PathBuf,
    width: Option<u32>,
) -> anyhow::Result<()> {
    let width = width.unwrap_or(ctx.config.thumbnails.preview_width);
    let frame = ctx.clips().single_thumbnail(&path, at, &output, width)?;
    println!("{}", frame.display());
    Ok(())
}
