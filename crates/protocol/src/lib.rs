use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::time::{Duration, SystemTime};

pub mod config;
pub mod operation;

/// Directory name under `<home>/Documents` shared by the server and the host panel.
pub const BRIDGE_DIR_NAME: &str = "ae-mcp-bridge";
pub const COMMAND_FILE_NAME: &str = "ae_command.json";
pub const RESULT_FILE_NAME: &str = "ae_mcp_result.json";

/// Injected into every packaged result so a waiter can tell its own result
/// apart from a leftover one at the same path.
pub const COMMAND_EXECUTED_FIELD: &str = "_commandExecuted";
pub const RESPONSE_TIMESTAMP_FIELD: &str = "_responseTimestamp";

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_AWAIT_TIMEOUT: Duration = Duration::from_millis(6000);
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl CommandStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Running => "running",
            CommandStatus::Completed => "completed",
            CommandStatus::Error => "error",
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single command slot. A new record always replaces the previous one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandRecord {
    pub command: String,
    #[serde(default)]
    pub args: Value,
    pub timestamp: String,
    pub status: CommandStatus,
}

impl CommandRecord {
    pub fn pending(command: impl Into<String>, args: Value, at: SystemTime) -> Self {
        Self {
            command: command.into(),
            args,
            timestamp: format_timestamp(at),
            status: CommandStatus::Pending,
        }
    }

    /// Arguments as an object; a missing or non-object payload becomes `{}`.
    pub fn args_object(&self) -> Map<String, Value> {
        match &self.args {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        }
    }
}

/// What an operation handler hands back to the result writer.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    Json(Value),
    Text(String),
}

impl From<Value> for HandlerOutput {
    fn from(value: Value) -> Self {
        HandlerOutput::Json(value)
    }
}

pub fn format_timestamp(time: SystemTime) -> String {
    humantime::format_rfc3339_millis(time).to_string()
}

/// Serializes a handler output for the result slot, tagging JSON objects with
/// the executed command and the response time. Anything that is not a JSON
/// object is written untouched and will never match a freshness check.
pub fn package_result(output: &HandlerOutput, command: &str, at: SystemTime) -> String {
    let value = match output {
        HandlerOutput::Json(value) => value.clone(),
        HandlerOutput::Text(text) => match serde_json::from_str::<Value>(text) {
            Ok(value @ Value::Object(_)) => value,
            _ => return text.clone(),
        },
    };
    let value = match value {
        Value::Object(mut map) => {
            map.insert(
                RESPONSE_TIMESTAMP_FIELD.to_string(),
                Value::String(format_timestamp(at)),
            );
            map.insert(
                COMMAND_EXECUTED_FIELD.to_string(),
                Value::String(command.to_string()),
            );
            Value::Object(map)
        }
        other => other,
    };
    to_pretty(&value)
}

/// Command name a packaged result was produced by, if it carries one.
pub fn executed_command(value: &Value) -> Option<&str> {
    value.get(COMMAND_EXECUTED_FIELD).and_then(Value::as_str)
}

pub fn waiting_placeholder(at: SystemTime) -> Value {
    json!({
        "status": "waiting",
        "message": "Waiting for new result from After Effects...",
        "timestamp": format_timestamp(at),
    })
}

pub fn unknown_command_result(command: &str) -> Value {
    json!({ "error": format!("Unknown command: {command}") })
}

pub fn dispatch_error_result(command: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "command": command,
        "message": message,
    })
}

pub fn to_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
