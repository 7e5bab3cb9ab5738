use crate::{
    DEFAULT_AWAIT_TIMEOUT, DEFAULT_CHECK_INTERVAL, DEFAULT_POLL_INTERVAL, DEFAULT_STALE_AFTER,
};
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Settings shared by the MCP server and the host bridge. Every field is
/// optional; both processes must agree on `bridge_dir`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    pub bridge_dir: Option<String>,
    pub stale_after_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub await_timeout_ms: Option<u64>,
    pub check_interval_ms: Option<u64>,
    pub auto_run: Option<bool>,
}

/// Resolved timings after defaults are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub stale_after: Duration,
    pub poll_interval: Duration,
    pub await_timeout: Duration,
    pub check_interval: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            stale_after: DEFAULT_STALE_AFTER,
            poll_interval: DEFAULT_POLL_INTERVAL,
            await_timeout: DEFAULT_AWAIT_TIMEOUT,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

impl BridgeConfig {
    pub fn timings(&self) -> Timings {
        let defaults = Timings::default();
        Timings {
            stale_after: self
                .stale_after_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.stale_after),
            poll_interval: self
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            await_timeout: self
                .await_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.await_timeout),
            check_interval: self
                .check_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.check_interval),
        }
    }

    pub fn auto_run(&self) -> bool {
        self.auto_run.unwrap_or(true)
    }
}

fn validate_bridge_config(config: &BridgeConfig) -> anyhow::Result<()> {
    let checks = [
        ("stale_after_secs", config.stale_after_secs),
        ("poll_interval_ms", config.poll_interval_ms),
        ("await_timeout_ms", config.await_timeout_ms),
        ("check_interval_ms", config.check_interval_ms),
    ];
    for (name, value) in checks {
        if value == Some(0) {
            anyhow::bail!("{name} must be greater than zero");
        }
    }
    if let Some(dir) = config.bridge_dir.as_deref() {
        if dir.trim().is_empty() {
            anyhow::bail!("bridge_dir cannot be empty");
        }
    }
    let timings = config.timings();
    if timings.poll_interval > timings.await_timeout {
        anyhow::bail!("poll_interval_ms must not exceed await_timeout_ms");
    }
    Ok(())
}

pub fn parse_bridge_config(raw: &str) -> anyhow::Result<BridgeConfig> {
    let config: BridgeConfig = toml::from_str(raw)?;
    validate_bridge_config(&config)?;
    Ok(config)
}

pub fn load_bridge_config(path: &Path) -> anyhow::Result<BridgeConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_bridge_config(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}
