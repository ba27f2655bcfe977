//! Show media metadata.

use std::path::PathBuf;

use duocast_media_engine::MediaAsset;

use super::{print_asset, Context};

pub fn run(ctx: &Context, path: PathBuf, json: bool) -> anyhow::Result<()> {
    let metadata = ctx.clips().probe(&path)?;
    let asset = MediaAsset { path, metadata };
    if json {
        println!("{}", serde_json::to_string_pretty(&asset)?);
    } else {
        print_asset(&asset);
    }
    Ok(())
}
