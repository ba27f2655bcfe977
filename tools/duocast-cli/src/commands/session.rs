//! Background capture control across invocations.

use super::record::SourceArgs;
use super::{print_record, Context};

pub fn start(ctx: &Context, source: SourceArgs) -> anyhow::Result<()> {
    let record = ctx.orchestrator().start(&source.into_request())?;
    print_record(&record);
    println!("Run `duocast stop` to finish.");
    Ok(())
}

pub fn stop(ctx: &Context) -> anyhow::Result<()> {
    let record = ctx.orchestrator().stop()?;
    print_record(&record);
    if let Some(error) = record.error {
        anyhow::bail!("Capture failed: {error}");
    }
    Ok(())
}

pub fn status(ctx: &Context, json: bool) -> anyhow::Result<()> {
    let record = ctx.orchestrator().status()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }
    print_record(&record.unwrap_or_default());
    Ok(())
}

pub fn reset(ctx: &Context) -> anyhow::Result<()> {
    ctx.orchestrator().reset()?;
    println!("Session files removed.");
    Ok(())
}
