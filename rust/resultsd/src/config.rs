//! Runtime configuration loaded from environment variables (and `.env` when present).

use anyhow::Context;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Workspace directory opened at startup, before any `workspace.select`.
pub const WORKSPACE_VAR: &str = "RESULTSD_WORKSPACE";
/// `tracing` filter directive, e.g. `info` or `resultsd=debug`.
pub const LOG_VAR: &str = "RESULTSD_LOG";

pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let workspace = lookup(WORKSPACE_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let log_filter = lookup(LOG_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        EnvFilter::try_new(&log_filter)
            .with_context(|| format!("{} is not a valid log filter: {}", LOG_VAR, log_filter))?;

        Ok(Self {
            workspace,
            log_filter,
        })
    }

    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.log_filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    }
}
