//! CLI execution context.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use hmr_client::prelude::HmrConfig;

use crate::output::Output;

/// Config file names looked up from the working directory upwards.
pub const CONFIG_NAMES: [&str; 3] = ["hmr.toml", ".hmr.toml", "hmr.json"];

/// Execution context for CLI commands.
pub struct Context {
    /// Effective client configuration.
    pub config: HmrConfig,
    /// Where the configuration came from, if not the defaults.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Context {
    /// Load context from config file.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let (config, config_path) = match config_path {
            Some(path) => {
                let config = HmrConfig::load(path)
                    .with_context(|| format!("Failed to load config file: {}", path))?;
                (config, Some(PathBuf::from(path)))
            }
            None => match Self::find_config(&cwd) {
                Some((config, path)) => (config, Some(path)),
                None => (HmrConfig::default(), None),
            },
        };

        Ok(Self {
            config,
            config_path,
            output,
            cwd,
        })
    }

    /// Find config file in directory tree.
    fn find_config(start: &Path) -> Option<(HmrConfig, PathBuf)> {
        let mut current = start.to_path_buf();
        loop {
            for name in CONFIG_NAMES {
                let config_path = current.join(name);
                if config_path.exists() {
                    if let Ok(config) = HmrConfig::load(config_path.to_str()?) {
                        return Some((config, config_path));
                    }
                }
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Resolve a path relative to the working directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}
