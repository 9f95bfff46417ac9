//! Errors at the dispatcher/pool boundary. Deliberately narrow: this never
//! leaks `ssh2`/`regex` types into the dispatcher's public surface (§10.2) —
//! anything that happens inside a session stays inside that device's
//! `DeviceOutcome.error`/`error_kind`, never here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("batch request has no devices")]
    EmptyBatch,
    #[error("task_id must not be empty")]
    MissingTaskId,
    #[error("device at index {index} is missing a username")]
    MissingUsername { index: usize },
    #[error("device at index {index} is missing a host/device_ip")]
    MissingHost { index: usize },
    #[error("device at index {index} is missing a password")]
    MissingPassword { index: usize },
    #[error("device at index {index} has an empty command list")]
    EmptyCliList { index: usize },
    #[error("device at index {index} has an out-of-range device_port {port} (must be 1-65535)")]
    InvalidPort { index: usize, port: u16 },
    #[error("task_timeout must not exceed {max}s, got {got}s")]
    TaskTimeoutTooLarge { got: u64, max: u64 },
    #[error("device_timeout must not exceed {max}s, got {got}s")]
    DeviceTimeoutTooLarge { got: u64, max: u64 },
    #[error("dispatch queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
    #[error("worker pool is shutting down")]
    PoolShuttingDown,
}
