mod cli;
mod handlers;
mod logging;
mod project;
mod templates;

use crate::cli::Args;
use crate::handlers::SimulatedHost;
use crate::project::Project;
use clap::Parser;
use exchange::{expand_tilde, resolve_bridge_dir, FsStore, Poller, SystemClock};
use protocol::config::{load_bridge_config, BridgeConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

type HostPoller = Poller<FsStore, SimulatedHost, SystemClock>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let log_dir = (!args.no_log_file).then(|| expand_tilde(&args.log_dir));
    let _log_guard = logging::init_tracing(log_dir.as_deref(), args.log_to_stderr)?;

    let config = match &args.config {
        Some(path) => load_bridge_config(path)?,
        None => BridgeConfig::default(),
    };
    let bridge_dir = resolve_bridge_dir(args.bridge_dir.as_deref(), config.bridge_dir.as_deref())?;
    let store = FsStore::open(&bridge_dir)?;
    let interval = args
        .interval_ms
        .map(Duration::from_millis)
        .unwrap_or(config.timings().check_interval);
    if interval.is_zero() {
        anyhow::bail!("--interval-ms must be greater than zero");
    }

    let project = if args.demo {
        Project::demo()
    } else {
        Project::default()
    };
    let poller: Arc<HostPoller> = Arc::new(Poller::new(store, SimulatedHost::new(project), SystemClock));
    poller.set_auto_run(config.auto_run() && !args.no_auto_run);
    tracing::info!(
        bridge_dir = %bridge_dir.display(),
        interval_ms = interval.as_millis() as u64,
        auto_run = poller.auto_run(),
        demo = args.demo,
        "ae-bridge-host started"
    );

    let shutdown = CancellationToken::new();
    spawn_shutdown_handler(shutdown.clone());
    if args.interactive {
        spawn_panel_commands(Arc::clone(&poller), shutdown.clone());
    }
    poller.run(interval, shutdown).await;
    tracing::info!("ae-bridge-host shutting down");
    Ok(())
}

fn spawn_shutdown_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        (Err(err), _) | (_, Err(err)) => {
            tracing::warn!(error = %err, "failed to register signal handlers; falling back to ctrl-c");
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            return;
        }
    };
    tokio::select! {
        _ = sigint.recv() => tracing::info!("received SIGINT, stopping"),
        _ = sigterm.recv() => tracing::info!("received SIGTERM, stopping"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PanelCommand {
    Check,
    AutoRun(bool),
    Status,
}

fn parse_panel_command(line: &str) -> Option<PanelCommand> {
    let mut words = line.split_whitespace();
    let command = match (words.next()?, words.next()) {
        ("check", None) => PanelCommand::Check,
        ("status", None) => PanelCommand::Status,
        ("auto", Some("on")) => PanelCommand::AutoRun(true),
        ("auto", Some("off")) => PanelCommand::AutoRun(false),
        _ => return None,
    };
    words.next().is_none().then_some(command)
}

/// Stdin stand-in for the panel's "check now" button and auto-run checkbox.
fn spawn_panel_commands(poller: Arc<HostPoller>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => break,
                line = lines.next_line() => line,
            };
            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to read panel command");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_panel_command(&line) {
                Some(PanelCommand::Check) => {
                    let outcome = poller.check_now();
                    tracing::info!(outcome = ?outcome, "manual check finished");
                }
                Some(PanelCommand::AutoRun(enabled)) => poller.set_auto_run(enabled),
                Some(PanelCommand::Status) => {
                    tracing::info!(auto_run = poller.auto_run(), "bridge status");
                }
                None => {
                    tracing::warn!(input = %line.trim(), "unknown panel command; expected check, status, auto on|off");
                }
            }
        }
    });
}
