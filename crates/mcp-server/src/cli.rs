use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ae-mcp-server",
    version,
    about = "MCP stdio server driving After Effects through a shared bridge directory"
)]
pub(crate) struct Args {
    /// TOML file shared with ae-bridge-host.
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
    #[arg(long)]
    pub(crate) bridge_dir: Option<String>,
    /// How long tools that wait for a result keep polling.
    #[arg(long)]
    pub(crate) await_timeout_ms: Option<u64>,
    #[arg(long)]
    pub(crate) poll_interval_ms: Option<u64>,
    /// Results older than this are reported as stale by get-results.
    #[arg(long)]
    pub(crate) stale_after_secs: Option<u64>,
}
