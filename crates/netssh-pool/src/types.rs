//! Wire types for the batch dispatch interface (§6). These are the external,
//! JSON-shaped request/response records; internally they're translated into
//! `netssh_core::engine::SessionParams` per job.

use netssh_core::engine::CommandResult as EngineCommandResult;
use serde::{Deserialize, Serialize};

fn default_port() -> Option<u16> {
    None
}

/// One device entry within a batch request.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceEntry {
    pub device_ip: String,
    #[serde(default = "default_port")]
    pub device_port: Option<u16>,
    pub device_name: Option<String>,
    pub device_platform: Option<String>,
    #[serde(default)]
    pub collect_protocol: Option<String>,
    pub user_name: String,
    pub password: String,
    pub enable_password: Option<String>,
    pub cli_list: Vec<String>,
    pub device_timeout: Option<u64>,
    /// Typed task-options record (§9) replacing a `map[string]any` metadata
    /// bag: only these two fields are ever recognized.
    #[serde(default)]
    pub enter_config_mode: bool,
    #[serde(default)]
    pub skip_enable: bool,
}

/// A batch dispatch request (§6).
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub task_id: String,
    pub task_name: Option<String>,
    #[serde(default)]
    pub retry_flag: u32,
    pub task_timeout: Option<u64>,
    pub devices: Vec<DeviceEntry>,
}

/// One command's outcome in the external response shape.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome {
    pub command: String,
    pub output: String,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    pub duration_ms: u64,
}

impl From<EngineCommandResult> for CommandOutcome {
    fn from(r: EngineCommandResult) -> Self {
        Self {
            command: r.command,
            output: r.output,
            error: r.error_detail,
            error_kind: r.error_kind.map(|k| k.to_string()),
            duration_ms: r.elapsed_ms,
        }
    }
}

/// One device's outcome in the external response shape.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceOutcome {
    pub device_ip: String,
    pub port: u16,
    pub device_name: Option<String>,
    pub device_platform: Option<String>,
    pub task_id: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub results: Vec<CommandOutcome>,
}

/// Batch-level aggregate code (§4.7 / §9's open question: "all failed" and
/// "partial success" are both reported as `PARTIAL_SUCCESS`, preserved as-is).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchCode {
    Success,
    PartialSuccess,
}

/// The aggregated batch dispatch response (§6).
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub code: BatchCode,
    pub message: String,
    pub total: usize,
    pub data: Vec<DeviceOutcome>,
}
