//! Configuration commands.

use anyhow::{bail, Context as _, Result};
use hmr_client::prelude::HmrConfig;

use super::ConfigArgs;
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    if args.init {
        init_config(args.force, ctx).await
    } else {
        show_config(ctx)
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    match &ctx.config_path {
        Some(path) => ctx.output.debug(&format!("Loaded {}", path.display())),
        None => ctx.output.debug("No config file found, using defaults"),
    }

    ctx.output.header("Current Configuration");
    ctx.output.raw(&ctx.config.to_toml_string()?);
    Ok(())
}

async fn init_config(force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join("hmr.toml");

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let content = HmrConfig::default().to_toml_string()?;
    tokio::fs::write(&config_path, content)
        .await
        .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::output::Output;

    fn context_in(dir: &Path) -> Context {
        Context {
            config: HmrConfig::default(),
            config_path: None,
            output: Output::new(false, true),
            cwd: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_init_writes_default_config() {
        let dir = std::env::temp_dir().join(format!("hmr-cli-init-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let ctx = context_in(&dir);

        run(ConfigArgs { init: true, force: false }, &ctx).await.unwrap();
        let written = HmrConfig::load(dir.join("hmr.toml").to_str().unwrap()).unwrap();
        assert_eq!(written, HmrConfig::default());

        let again = run(ConfigArgs { init: true, force: false }, &ctx).await;
        assert!(again.unwrap_err().to_string().contains("already exists"));
        run(ConfigArgs { init: true, force: true }, &ctx).await.unwrap();

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_show_config_succeeds_without_file() {
        let ctx = context_in(&std::env::temp_dir());

        run(ConfigArgs { init: false, force: false }, &ctx).await.unwrap();
    }
}
