use std::io;
use thiserror::Error;

/// Error taxonomy surfaced by the interaction core, corresponding 1:1 with the
/// error kinds a dispatcher maps to the external `error_kind` string (DIAL_FAILED,
/// AUTH_FAILED, CHANNEL_FAILED, NO_PROMPT, ENABLE_FAILED, CONFIG_MODE_FAILED,
/// COMMAND_TIMEOUT, DEVICE_ERROR, CANCELLED, IO_ERROR).
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("SSH error: {0}")]
    SshError(#[from] ssh2::Error),

    #[error("dial failed: could not reach {addr}: {source}")]
    DialFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("auth failed for user {username}: {source}")]
    AuthFailed {
        username: String,
        #[source]
        source: ssh2::Error,
    },

    #[error("channel operation failed: {0}")]
    ChannelOpFailed(String),

    #[error("no prompt seen after {attempts} prompt-inducer attempts")]
    NoPrompt { attempts: u32 },

    #[error("enable escalation failed: {0}")]
    EnableFailed(String),

    #[error("entering config mode failed: {0}")]
    ConfigModeFailed(String),

    #[error("command timed out after {elapsed_ms}ms: {command}")]
    CommandTimeout { command: String, elapsed_ms: u64 },

    #[error("device reported an error for {command}: matched hint {hint:?} in output")]
    DeviceError {
        command: String,
        hint: String,
        output: String,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),
}

// Helper methods for error context
impl CoreError {
    pub fn dial_failed(addr: impl Into<String>, err: io::Error) -> Self {
        Self::DialFailed {
            addr: addr.into(),
            source: err,
        }
    }

    pub fn auth_failed(username: impl Into<String>, err: ssh2::Error) -> Self {
        Self::AuthFailed {
            username: username.into(),
            source: err,
        }
    }

    pub fn channel_op_failed(message: impl Into<String>) -> Self {
        Self::ChannelOpFailed(message.into())
    }

    pub fn no_prompt(attempts: u32) -> Self {
        Self::NoPrompt { attempts }
    }

    pub fn command_timeout(command: impl Into<String>, elapsed_ms: u64) -> Self {
        Self::CommandTimeout {
            command: command.into(),
            elapsed_ms,
        }
    }

    /// Builds a `DeviceError` carrying the matched error-hint and the raw output
    /// captured for the offending command, per §7's DEVICE_ERROR row.
    pub fn command_error_with_output(
        command: impl Into<String>,
        hint: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self::DeviceError {
            command: command.into(),
            hint: hint.into(),
            output: output.into(),
        }
    }

    /// Maps this error onto the external `error_kind` string used at the dispatcher
    /// boundary (§7/§10.2). Errors outside the engine's expected taxonomy are
    /// reported as IO_ERROR, matching "unexpected programming errors ... reported
    /// as IO_ERROR with an identifying message".
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::DialFailed { .. } => "DIAL_FAILED",
            Self::AuthFailed { .. } => "AUTH_FAILED",
            Self::ChannelOpFailed(_) => "CHANNEL_FAILED",
            Self::NoPrompt { .. } => "NO_PROMPT",
            Self::EnableFailed(_) => "ENABLE_FAILED",
            Self::ConfigModeFailed(_) => "CONFIG_MODE_FAILED",
            Self::CommandTimeout { .. } => "COMMAND_TIMEOUT",
            Self::DeviceError { .. } => "DEVICE_ERROR",
            Self::Cancelled => "CANCELLED",
            _ => "IO_ERROR",
        }
    }
}
