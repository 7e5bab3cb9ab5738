//! Server-side half of the exchange: writes commands, reads and waits for
//! results. Nothing here returns an error to the caller; protocol failures
//! come back as JSON payloads an agent can always parse.

use crate::clock::{Clock, SystemClock};
use crate::store::{CommandSlot, ExchangeStore, ResultSlot};
use protocol::{
    executed_command, format_timestamp, to_pretty, waiting_placeholder, CommandRecord,
    DEFAULT_STALE_AFTER,
};
use serde_json::{json, Value};
use std::time::Duration;

pub struct BridgeClient<S, C = SystemClock> {
    store: S,
    clock: C,
    stale_after: Duration,
}

impl<S: ExchangeStore> BridgeClient<S, SystemClock> {
    pub fn with_system_clock(store: S) -> Self {
        Self::new(store, SystemClock)
    }
}

impl<S: ExchangeStore, C: Clock> BridgeClient<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Overwrites the command slot with a pending record. Whatever was in the
    /// slot before, running or not, is gone.
    pub fn enqueue(&self, command: &str, args: Value) {
        let slot = CommandSlot::new(&self.store);
        let record = CommandRecord::pending(command, args, self.clock.now());
        match slot.save(&record) {
            Ok(()) => {
                tracing::info!(command, path = %slot.location(), "command queued");
            }
            Err(err) => {
                tracing::error!(
                    command,
                    path = %slot.location(),
                    error = %err,
                    "error attempting to persist command"
                );
            }
        }
    }

    /// Replaces the result slot with a "waiting" placeholder so a leftover
    /// result cannot be mistaken for the next one.
    pub fn reset_result(&self) {
        let slot = ResultSlot::new(&self.store);
        let placeholder = to_pretty(&waiting_placeholder(self.clock.now()));
        match slot.save(&placeholder) {
            Ok(()) => tracing::debug!(path = %slot.location(), "result slot reset"),
            Err(err) => {
                tracing::error!(path = %slot.location(), error = %err, "failed to reset result slot");
            }
        }
    }

    pub fn read_latest(&self) -> String {
        let slot = ResultSlot::new(&self.store);
        let snapshot = match slot.snapshot() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::warn!(path = %slot.location(), "result file not found");
                return json!({
                    "error": "No results file found. Please run a script in After Effects first."
                })
                .to_string();
            }
            Err(err) => {
                tracing::error!(path = %slot.location(), error = %err, "failed to read result file");
                return json!({ "error": format!("Failed to read results: {err}") }).to_string();
            }
        };

        let age = self
            .clock
            .now()
            .duration_since(snapshot.modified)
            .unwrap_or_default();
        tracing::debug!(
            path = %slot.location(),
            bytes = snapshot.content.len(),
            age_ms = age.as_millis() as u64,
            "read result file"
        );
        if age > self.stale_after {
            tracing::warn!(
                age_secs = age.as_secs(),
                "result file is stale; the host panel may not be running"
            );
            return json!({
                "warning": "Result file appears to be stale (not recently updated).",
                "message": "This could indicate After Effects is not properly writing results or the MCP Bridge Auto panel isn't running.",
                "lastModified": format_timestamp(snapshot.modified),
                "originalContent": snapshot.content,
            })
            .to_string();
        }
        snapshot.content
    }

    /// Polls the result slot until a fresh result shows up. A result counts
    /// when its content differs from the last content looked at, it parses as
    /// JSON, and, when `expected` is set, it was tagged with that command.
    /// Gives up after `timeout`; returns no later than `timeout + poll`.
    pub async fn await_result(
        &self,
        expected: Option<&str>,
        timeout: Duration,
        poll: Duration,
    ) -> String {
        let slot = ResultSlot::new(&self.store);
        let started = self.clock.now();
        let mut last_seen: Option<String> = None;

        loop {
            let elapsed = self.clock.now().duration_since(started).unwrap_or_default();
            if elapsed >= timeout {
                break;
            }
            match slot.snapshot() {
                Ok(Some(snapshot))
                    if !snapshot.content.is_empty()
                        && last_seen.as_deref() != Some(snapshot.content.as_str()) =>
                {
                    match serde_json::from_str::<Value>(&snapshot.content) {
                        Ok(value) => {
                            let matches = match expected {
                                Some(expected) => executed_command(&value) == Some(expected),
                                None => true,
                            };
                            if matches {
                                tracing::debug!(
                                    expected = expected.unwrap_or("*"),
                                    waited_ms = elapsed.as_millis() as u64,
                                    "fresh result observed"
                                );
                                return snapshot.content;
                            }
                        }
                        Err(err) => {
                            tracing::trace!(error = %err, "result not parseable yet");
                        }
                    }
                    last_seen = Some(snapshot.content);
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(error = %err, "transient result read failure");
                }
            }
            self.clock.sleep(poll).await;
        }

        let waited = self.clock.now().duration_since(started).unwrap_or_default();
        tracing::warn!(
            expected = expected.unwrap_or("*"),
            waited_ms = waited.as_millis() as u64,
            "timed out waiting for bridge result"
        );
        let error = match expected {
            Some(command) => {
                format!("Timed out waiting for bridge result for command '{command}'.")
            }
            None => "Timed out waiting for bridge result.".to_string(),
        };
        json!({
            "error": error,
            "expectedCommand": expected,
            "waitedMs": waited.as_millis() as u64,
            "lastContent": last_seen,
        })
        .to_string()
    }

    /// Reset, enqueue, then wait for the result tagged with `command`.
    pub async fn submit(
        &self,
        command: &str,
        args: Value,
        timeout: Duration,
        poll: Duration,
    ) -> String {
        self.reset_result();
        self.enqueue(command, args);
        self.await_result(Some(command), timeout, poll).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{MemoryStore, Slot};
    use protocol::{package_result, CommandStatus, HandlerOutput};
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn start() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn fixture() -> (
        Arc<ManualClock>,
        Arc<MemoryStore>,
        BridgeClient<Arc<MemoryStore>, Arc<ManualClock>>,
    ) {
        let clock = Arc::new(ManualClock::new(start()));
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let client = BridgeClient::new(store.clone(), clock.clone());
        (clock, store, client)
    }

    fn tagged(command: &str, at: SystemTime) -> String {
        package_result(
            &HandlerOutput::Json(json!({ "status": "success" })),
            command,
            at,
        )
    }

    #[test]
    fn enqueue_writes_a_pending_record() {
        let (_, store, client) = fixture();
        client.enqueue("listCompositions", json!({}));
        let record = CommandSlot::new(&*store).load().unwrap().expect("record");
        assert_eq!(record.command, "listCompositions");
        assert_eq!(record.status, CommandStatus::Pending);
        assert_eq!(record.timestamp, format_timestamp(start()));
    }

    #[test]
    fn second_enqueue_replaces_the_first() {
        let (_, store, client) = fixture();
        client.enqueue("getProjectInfo", json!({}));
        client.enqueue("getLayerInfo", json!({ "x": 1 }));
        let record = CommandSlot::new(&*store).load().unwrap().expect("record");
        assert_eq!(record.command, "getLayerInfo");
        assert_eq!(record.args, json!({ "x": 1 }));
        assert_eq!(record.status, CommandStatus::Pending);
    }

    #[test]
    fn enqueue_swallows_write_failures() {
        let (_, store, client) = fixture();
        store.fail_writes(true);
        client.enqueue("getProjectInfo", json!({}));
        client.reset_result();
        assert!(store.read(Slot::Command).unwrap().is_none());
    }

    #[test]
    fn read_latest_reports_missing_file() {
        let (_, _, client) = fixture();
        let value: Value = serde_json::from_str(&client.read_latest()).unwrap();
        assert!(value["error"]
            .as_str()
            .unwrap()
            .starts_with("No results file found"));
    }

    #[test]
    fn read_latest_is_a_pure_read() {
        let (_, _, client) = fixture();
        client.store().write(Slot::Result, &tagged("getProjectInfo", start())).unwrap();
        let first = client.read_latest();
        let second = client.read_latest();
        assert_eq!(first, second);
        assert_eq!(first, tagged("getProjectInfo", start()));
    }

    #[test]
    fn read_latest_flags_stale_results() {
        let (clock, store, client) = fixture();
        store.write(Slot::Result, "{\"status\":\"success\"}").unwrap();

        store.set_modified(Slot::Result, clock.now() - Duration::from_secs(29));
        assert_eq!(client.read_latest(), "{\"status\":\"success\"}");

        store.set_modified(Slot::Result, clock.now() - Duration::from_secs(31));
        let value: Value = serde_json::from_str(&client.read_latest()).unwrap();
        assert!(value["warning"].as_str().unwrap().contains("stale"));
        assert_eq!(value["originalContent"], "{\"status\":\"success\"}");
        assert!(value["lastModified"].is_string());
    }

    #[test]
    fn reset_writes_waiting_placeholder() {
        let (_, _, client) = fixture();
        client.reset_result();
        let value: Value = serde_json::from_str(&client.read_latest()).unwrap();
        assert_eq!(value["status"], "waiting");
        assert!(executed_command(&value).is_none());
    }

    #[tokio::test]
    async fn await_returns_matching_result_immediately() {
        let (clock, store, client) = fixture();
        store.write(Slot::Result, &tagged("X", clock.now())).unwrap();
        let content = client
            .await_result(Some("X"), Duration::from_secs(5), Duration::from_millis(250))
            .await;
        assert_eq!(content, tagged("X", start()));
        assert_eq!(clock.now(), start());
    }

    #[tokio::test]
    async fn await_times_out_on_other_commands_result() {
        let (clock, store, client) = fixture();
        store.write(Slot::Result, &tagged("X", clock.now())).unwrap();
        let content = client
            .await_result(Some("Y"), Duration::from_secs(2), Duration::from_millis(250))
            .await;
        let value: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(
            value["error"],
            "Timed out waiting for bridge result for command 'Y'."
        );
        assert_eq!(value["expectedCommand"], "Y");
        let waited = clock.now().duration_since(start()).unwrap();
        assert!(waited >= Duration::from_secs(2));
        assert!(waited <= Duration::from_millis(2250));
    }

    #[tokio::test]
    async fn await_honours_timeout_bound_for_odd_intervals() {
        for (timeout_ms, poll_ms) in [(0, 100), (1000, 300), (999, 1000), (50, 7)] {
            let (clock, _, client) = fixture();
            client
                .await_result(
                    Some("never"),
                    Duration::from_millis(timeout_ms),
                    Duration::from_millis(poll_ms),
                )
                .await;
            let waited = clock.now().duration_since(start()).unwrap();
            assert!(waited <= Duration::from_millis(timeout_ms + poll_ms));
        }
    }

    #[tokio::test]
    async fn await_without_expectation_takes_any_json() {
        let (_, _, client) = fixture();
        client.reset_result();
        let content = client
            .await_result(None, Duration::from_secs(1), Duration::from_millis(100))
            .await;
        let value: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["status"], "waiting");
    }

    #[tokio::test]
    async fn await_skips_partial_writes_until_complete() {
        let (_, store, client) = fixture();
        store.write(Slot::Result, "{\"status\": \"succ").unwrap();
        let writer = async {
            tokio::task::yield_now().await;
            store.write(Slot::Result, &tagged("createComposition", start())).unwrap();
        };
        let (content, ()) = tokio::join!(
            client.await_result(
                Some("createComposition"),
                Duration::from_secs(1),
                Duration::from_millis(100),
            ),
            writer
        );
        let value: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(executed_command(&value), Some("createComposition"));
    }

    #[tokio::test]
    async fn submit_resets_before_enqueue() {
        let (_, store, client) = fixture();
        store.write(Slot::Result, &tagged("listCompositions", start())).unwrap();
        let content = client
            .submit(
                "listCompositions",
                json!({}),
                Duration::from_millis(500),
                Duration::from_millis(100),
            )
            .await;
        // The old tagged result was cleared, so nothing answered.
        let value: Value = serde_json::from_str(&content).unwrap();
        assert!(value["error"].as_str().unwrap().starts_with("Timed out"));
        let record = CommandSlot::new(&*store).load().unwrap().expect("record");
        assert_eq!(record.command, "listCompositions");
    }
}
