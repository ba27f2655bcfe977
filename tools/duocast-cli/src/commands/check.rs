//! Check system capabilities.

use duocast_platform_core::{all_required_available, print_capability_report};

use super::Context;

pub fn run(ctx: &Context) -> anyhow::Result<()> {
    println!("Duocast System Check");
    println!("{}", "=".repeat(50));

    match ctx.tools.version() {
        Some(version) => println!("[OK] ffmpeg: {version}"),
        None => println!(
            "[MISSING - REQUIRED] ffmpeg not found at {} (install it or place it in {})",
            ctx.tools.ffmpeg.display(),
            ctx.config.ffmpeg_dir().display()
        ),
    }
    println!("     ffprobe: {}", ctx.tools.ffprobe.display());
    println!("     Data directory: {}", ctx.config.data_dir.display());

    let sources = ctx.sources();
    println!("     Platform: {:?}", sources.platform());

    let capabilities = sources.capabilities();
    println!();
    print_capability_report(&capabilities);

    let ready = ctx.tools.is_available() && all_required_available(&capabilities);
    if ctx.tools.is_available() {
        println!();
        println!("Encoder: {}", ctx.encoder.probe());
    }

    println!();
    if ready {
        println!("All required capabilities are available. Duocast is ready.");
    } else {
        println!("Some required capabilities are missing. See above for fixes.");
    }

    Ok(())
}

pub fn encoder(ctx: &Context) -> anyhow::Result<()> {
    let encoder = ctx.encoder.probe();
    let kind = if encoder.is_hardware() {
        "hardware"
    } else {
        "software"
    };
    println!("{} ({kind})", encoder.ffmpeg_name());
    Ok(())
}

pub fn config(ctx: &Context, save: bool) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&ctx.config)?);
    if save {
        ctx.config.save()?;
        tracing::info!("Configuration saved");
    }
    Ok(())
}
