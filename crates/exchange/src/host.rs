//! Host-side half of the exchange: the poller that picks up pending commands,
//! dispatches them and writes the packaged result.

use crate::clock::{Clock, SystemClock};
use crate::store::{CommandSlot, ExchangeStore, ResultSlot};
use protocol::operation::{Operation, OperationError};
use protocol::{
    dispatch_error_result, package_result, unknown_command_result, CommandRecord, CommandStatus,
    HandlerOutput,
};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, TryLockError};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// The registry of named operations. Arguments arrive already decoded and
/// validated; an `Err` is reported as a dispatch failure.
pub trait OperationHandler: Send {
    fn handle(&mut self, operation: Operation) -> anyhow::Result<HandlerOutput>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Auto-run is switched off.
    Disabled,
    /// Another check is still executing a command.
    Busy,
    /// No readable command in the slot.
    Idle,
    /// The command in the slot is not pending.
    Skipped(CommandStatus),
    Executed {
        command: String,
        status: CommandStatus,
    },
}

pub struct Poller<S, H, C = SystemClock> {
    store: S,
    clock: C,
    handler: Mutex<H>,
    auto_run: AtomicBool,
}

impl<S, H, C> Poller<S, H, C>
where
    S: ExchangeStore,
    H: OperationHandler,
    C: Clock,
{
    pub fn new(store: S, handler: H, clock: C) -> Self {
        Self {
            store,
            clock,
            handler: Mutex::new(handler),
            auto_run: AtomicBool::new(true),
        }
    }

    pub fn set_auto_run(&self, enabled: bool) {
        self.auto_run.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "auto-run toggled");
    }

    pub fn auto_run(&self) -> bool {
        self.auto_run.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// One scheduled check. Does nothing while auto-run is off.
    pub fn tick(&self) -> TickOutcome {
        if !self.auto_run() {
            return TickOutcome::Disabled;
        }
        self.check()
    }

    /// A manual check, run regardless of the auto-run flag.
    pub fn check_now(&self) -> TickOutcome {
        tracing::info!("manually checking for commands");
        self.check()
    }

    fn check(&self) -> TickOutcome {
        let mut handler = match self.handler.try_lock() {
            Ok(handler) => handler,
            Err(TryLockError::WouldBlock) => {
                tracing::debug!("previous check still running; skipping");
                return TickOutcome::Busy;
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let slot = CommandSlot::new(&self.store);
        let record = match slot.load() {
            Ok(Some(record)) => record,
            Ok(None) => return TickOutcome::Idle,
            Err(err) => {
                tracing::warn!(error = %err, "error checking for commands");
                return TickOutcome::Idle;
            }
        };
        if record.status != CommandStatus::Pending {
            return TickOutcome::Skipped(record.status);
        }

        // Claim the command before running it so no later check re-runs it.
        match slot.transition(&record, CommandStatus::Running) {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(command = %record.command, "command replaced before it was claimed");
                return TickOutcome::Idle;
            }
            Err(err) => {
                tracing::warn!(command = %record.command, error = %err, "error updating command status");
            }
        }

        let status = self.execute(&mut *handler, &record);
        match slot.transition(&record, status) {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    command = %record.command,
                    "command slot was replaced while running; status not updated"
                );
            }
            Err(err) => {
                tracing::warn!(command = %record.command, error = %err, "error updating command status");
            }
        }
        TickOutcome::Executed {
            command: record.command,
            status,
        }
    }

    fn execute(&self, handler: &mut H, record: &CommandRecord) -> CommandStatus {
        let command = record.command.as_str();
        tracing::info!(command, "executing command");

        let outcome = match Operation::parse(command, Value::Object(record.args_object())) {
            Ok(operation) => run_handler(handler, operation),
            Err(OperationError::Unknown(name)) => {
                tracing::warn!(command = %name, "unknown command");
                Ok(HandlerOutput::Json(unknown_command_result(&name)))
            }
            Err(err @ OperationError::InvalidArgs { .. }) => Err(err.to_string()),
        };

        let failure = match outcome {
            Ok(output) => match self.finalize(&output, command) {
                Ok(()) => {
                    tracing::info!(command, "command completed");
                    return CommandStatus::Completed;
                }
                Err(err) => format!("failed to write result file: {err}"),
            },
            Err(message) => message,
        };

        tracing::error!(command, error = %failure, "command failed");
        let error = HandlerOutput::Json(dispatch_error_result(command, &failure));
        if let Err(err) = self.finalize(&error, command) {
            tracing::error!(command, error = %err, "failed to write error result");
        }
        CommandStatus::Error
    }

    /// Packages `output` for `command` and writes it to the result slot.
    pub fn finalize(&self, output: &HandlerOutput, command: &str) -> std::io::Result<()> {
        let slot = ResultSlot::new(&self.store);
        let packaged = package_result(output, command, self.clock.now());
        slot.save(&packaged)?;
        tracing::debug!(command, path = %slot.location(), "result written");
        Ok(())
    }

    /// Checks the command slot every `interval` until `shutdown` fires.
    pub async fn run(&self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let outcome = self.tick();
                    if let TickOutcome::Executed { command, status } = outcome {
                        tracing::info!(%command, %status, "tick executed command");
                    }
                }
            }
        }
        tracing::info!("command poller stopped");
    }
}

fn run_handler<H: OperationHandler>(handler: &mut H, operation: Operation) -> Result<HandlerOutput, String> {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(operation))) {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) => Err(format!("{err:#}")),
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(format!("handler panicked: {detail}"))
        }
    }
}
