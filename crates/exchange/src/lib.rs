//! File-slot exchange between the MCP server and the host bridge.
//!
//! The server enqueues a command record and polls for a result tagged with
//! the command name; the host polls the command slot, runs pending commands
//! and writes back the tagged result.

pub mod client;
pub mod clock;
pub mod host;
pub mod paths;
pub mod store;

pub use client::BridgeClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use host::{OperationHandler, Poller, TickOutcome};
pub use paths::{default_bridge_dir, expand_tilde, resolve_bridge_dir};
pub use store::{CommandSlot, ExchangeStore, FsStore, MemoryStore, ResultSlot, Slot, SlotSnapshot};
