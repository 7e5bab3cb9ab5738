use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ae-bridge-host",
    version,
    about = "Host-side command poller for the After Effects MCP bridge"
)]
pub(crate) struct Args {
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
    #[arg(long)]
    pub(crate) bridge_dir: Option<String>,
    /// Milliseconds between command checks.
    #[arg(long)]
    pub(crate) interval_ms: Option<u64>,
    #[arg(long, default_value = "~/.ae-mcp-bridge/logs")]
    pub(crate) log_dir: String,
    /// Skip the log file and log to stderr only.
    #[arg(long, default_value_t = false)]
    pub(crate) no_log_file: bool,
    #[arg(long, default_value_t = false)]
    pub(crate) log_to_stderr: bool,
    /// Start from a sample project instead of an empty one.
    #[arg(long, default_value_t = false)]
    pub(crate) demo: bool,
    #[arg(long, default_value_t = false)]
    pub(crate) no_auto_run: bool,
    /// Read panel commands (check, auto on|off, status) from stdin.
    #[arg(long, default_value_t = false)]
    pub(crate) interactive: bool,
}
