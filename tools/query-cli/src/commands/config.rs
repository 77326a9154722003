//! Configuration display.

use anyhow::Result;

use super::ConfigArgs;
use crate::context::Context;
use crate::output::format_millis;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    if args.check {
        ctx.config.validate()?;
    }

    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }

    ctx.output.info("");
    ctx.output.info("[cache]");
    ctx.output.kv(
        "default_ttl",
        &format_millis(ctx.config.cache.default_ttl_ms as u128),
    );

    ctx.output.info("");
    ctx.output.info("[log]");
    ctx.output.kv("level", &ctx.config.log.level);
    ctx.output.kv("format", &format!("{:?}", ctx.config.log.format).to_lowercase());

    if args.check {
        ctx.output.success("Configuration is valid");
    }

    Ok(())
}
