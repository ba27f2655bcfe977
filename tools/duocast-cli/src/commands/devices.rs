//! Device and window enumeration.

use super::Context;

pub fn devices(ctx: &Context, json: bool) -> anyhow::Result<()> {
    let devices = ctx.sources().list_devices()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    println!("Video devices:");
    if devices.video.is_empty() {
        println!("  (none)");
    }
    for name in &devices.video {
        println!("  {name}");
    }
    println!("Audio devices:");
    if devices.audio.is_empty() {
        println!("  (none)");
    }
    for name in &devices.audio {
        println!("  {name}");
    }
    Ok(())
}

pub fn windows(ctx: &Context) -> anyhow::Result<()> {
    for title in ctx.sources().list_captureable_windows()? {
        println!("{title}");
    }
    Ok(())
}
