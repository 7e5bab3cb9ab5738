mod cli;
mod help;
mod mcp;
mod prompts;
mod tools;

use anyhow::Context;
use clap::Parser;
use cli::Args;
use exchange::{resolve_bridge_dir, BridgeClient, FsStore};
use mcp::BridgeHandler;
use protocol::config::{load_bridge_config, BridgeConfig, Timings};
use rmcp::ServiceExt;
use std::io;
use std::time::Duration;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_bridge_config(path)?,
        None => BridgeConfig::default(),
    };
    let timings = resolve_timings(&args, &config)?;
    let bridge_dir = resolve_bridge_dir(args.bridge_dir.as_deref(), config.bridge_dir.as_deref())?;
    let store = FsStore::open(&bridge_dir)?;
    tracing::info!(
        bridge_dir = %bridge_dir.display(),
        await_timeout_ms = timings.await_timeout.as_millis() as u64,
        poll_interval_ms = timings.poll_interval.as_millis() as u64,
        "After Effects MCP server starting"
    );

    let client = BridgeClient::with_system_clock(store).with_stale_after(timings.stale_after);
    let handler = BridgeHandler::new(client, timings, mcp::server_info());
    let service = handler
        .serve(rmcp::transport::stdio())
        .await
        .context("failed to start MCP stdio service")?;
    let reason = service.waiting().await?;
    tracing::info!(reason = ?reason, "After Effects MCP server stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);
    tracing_subscriber::registry().with(filter).with(layer).init();
}

/// Config timings with command-line overrides on top.
fn resolve_timings(args: &Args, config: &BridgeConfig) -> anyhow::Result<Timings> {
    let mut timings = config.timings();
    if let Some(ms) = args.await_timeout_ms {
        timings.await_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = args.poll_interval_ms {
        timings.poll_interval = Duration::from_millis(ms);
    }
    if let Some(secs) = args.stale_after_secs {
        timings.stale_after = Duration::from_secs(secs);
    }
    if timings.await_timeout.is_zero() || timings.poll_interval.is_zero() || timings.stale_after.is_zero()
    {
        anyhow::bail!("timeouts and intervals must be greater than zero");
    }
    if timings.poll_interval > timings.await_timeout {
        anyhow::bail!("poll interval must not exceed the await timeout");
    }
    Ok(timings)
}
