//! CLI command implementations.

pub mod config;
pub mod replay;

use std::path::PathBuf;

use clap::Args;

/// Arguments for the replay command.
#[derive(Args)]
pub struct ReplayArgs {
    /// Recording to replay: one JSON value per line, either a raw update
    /// payload or `{"event": "...", "data": "..."}`.
    pub file: PathBuf,

    /// Register a handler that declines updates for this module id.
    #[arg(long, value_name = "MODULE")]
    pub decline: Vec<String>,

    /// Fail imports whose specifier contains this text.
    #[arg(long, value_name = "MODULE")]
    pub fail_import: Vec<String>,

    /// Fail replacement stylesheets whose href contains this text.
    #[arg(long, value_name = "STYLESHEET")]
    pub broken_style: Vec<String>,

    /// Stylesheet link present on the page before the first update.
    #[arg(long, value_name = "HREF")]
    pub stylesheet: Vec<String>,

    /// Fail unless the replay ends with these counters, given as
    /// `{"hotUpdates": N, "reloadFallbacks": N}`.
    #[arg(long, value_name = "JSON")]
    pub expect_stats: Option<String>,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    /// Write a default hmr.toml in the working directory.
    #[arg(long)]
    pub init: bool,

    /// Overwrite an existing hmr.toml.
    #[arg(short, long, requires = "init")]
    pub force: bool,
}
