use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, error};

/// Global Settings for netssh-rs
/// This file provides a central place to configure all timeout values and other settings
/// that might need to be adjusted for different environments.
///
/// Settings can be loaded from a TOML file, JSON file, or environment variables.
/// Default values are provided for all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Network-related timeouts
    pub network: NetworkSettings,

    /// SSH-related settings
    pub ssh: SshSettings,

    /// Default interaction-engine timing (the `default` platform profile draws its
    /// timing constants from here; vendor profiles may still override with their own
    /// compiled-in deltas per the platform profile design)
    pub engine: EngineSettings,

    /// Logging settings
    pub logging: LoggingSettings,
}

/// Network-related timeout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// TCP connection timeout in seconds (default: 60)
    pub tcp_connect_timeout_secs: u64,

    /// TCP read timeout in seconds (default: 30)
    pub tcp_read_timeout_secs: u64,

    /// TCP write timeout in seconds (default: 30)
    pub tcp_write_timeout_secs: u64,

    /// Default port for SSH connections (default: 22)
    pub default_ssh_port: u16,

    /// Command response timeout in seconds (default: 30)
    /// How long to wait for a response after sending a command
    pub command_response_timeout_secs: u64,

    /// Pattern matching timeout in seconds (default: 20)
    /// How long to wait for a pattern match when reading output
    pub pattern_match_timeout_secs: u64,

    /// Command execution delay in milliseconds (default: 100)
    /// Short delay between sending a command and starting to read the response
    pub command_exec_delay_ms: u64,

    /// Delay between retry attempts in milliseconds (default: 1000)
    pub retry_delay_ms: u64,

    /// Maximum number of retry attempts (default: 3)
    pub max_retry_attempts: u32,

    /// Timeout for device-specific operations (default: 120)
    /// Used for operations that might take longer on certain device types
    pub device_operation_timeout_secs: u64,
}

/// SSH-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSettings {
    /// Timeout for blocking libssh2 function calls in seconds (default: 30)
    /// Set to 0 for no timeout
    pub blocking_timeout_secs: u64,

    /// SSH authentication timeout in seconds (default: 30)
    pub auth_timeout_secs: u64,

    /// SSH keepalive interval in seconds (default: 60)
    /// How often to send keepalive packets
    pub keepalive_interval_secs: u64,

    /// SSH channel open timeout in seconds (default: 20)
    pub channel_open_timeout_secs: u64,
}

/// Default interaction-engine timing, matching the `default` platform profile in §4.2
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Pause between commands in milliseconds (default: 120)
    pub command_interval_ms: u64,

    /// Per-command timeout in seconds (default: 30)
    pub command_timeout_secs: u64,

    /// How long the tail must be quiet before a prompt match is accepted (default: 800)
    pub quiet_after_ms: u64,

    /// Poll interval while waiting for quiet (default: 250)
    pub quiet_poll_interval_ms: u64,

    /// Interval between prompt-inducer blank lines (default: 1000)
    pub prompt_inducer_interval_ms: u64,

    /// Maximum prompt-inducer attempts before NO_PROMPT (default: 12)
    pub prompt_inducer_max_count: u32,

    /// Pause after exiting config mode before closing (default: 150)
    pub exit_pause_ms: u64,

    /// Bound on waiting for an enable-password prompt before assuming auto-promotion (default: 1500)
    pub enable_password_fallback_ms: u64,
}

/// Logging-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Whether to enable session logging (default: false)
    pub enable_session_log: bool,

    /// Path to the session log directory (default: "logs")
    pub session_log_path: String,

    /// Whether to log binary data (default: false)
    pub log_binary_data: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            network: NetworkSettings::default(),
            ssh: SshSettings::default(),
            engine: EngineSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            tcp_connect_timeout_secs: 60,
            tcp_read_timeout_secs: 30,
            tcp_write_timeout_secs: 30,
            default_ssh_port: 22,
            command_response_timeout_secs: 30,
            pattern_match_timeout_secs: 20,
            command_exec_delay_ms: 100,
            retry_delay_ms: 1000,
            max_retry_attempts: 3,
            device_operation_timeout_secs: 120,
        }
    }
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            blocking_timeout_secs: 30,
            auth_timeout_secs: 30,
            keepalive_interval_secs: 60,
            channel_open_timeout_secs: 20,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            command_interval_ms: 120,
            command_timeout_secs: 30,
            quiet_after_ms: 800,
            quiet_poll_interval_ms: 250,
            prompt_inducer_interval_ms: 1000,
            prompt_inducer_max_count: 12,
            exit_pause_ms: 150,
            enable_password_fallback_ms: 1500,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enable_session_log: false,
            session_log_path: String::from("logs"),
            log_binary_data: false,
        }
    }
}

// Global instance of Settings with RwLock for thread-safe access
lazy_static! {
    pub static ref SETTINGS: RwLock<Settings> = RwLock::new(Settings::default());
}

impl Settings {
    /// Load settings from a file
    pub fn load_from_file(path: &str) -> Result<Self, String> {
        let path = Path::new(path);
        if !path.exists() {
            return Err(format!("Settings file not found: {}", path.display()));
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => return Err(format!("Failed to read settings file: {}", e)),
        };

        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            Self::load_from_json(&content)
        } else if path.extension().and_then(|ext| ext.to_str()) == Some("toml") {
            Self::load_from_toml(&content)
        } else {
            Err(format!("Unsupported file format: {:?}", path.extension()))
        }
    }

    /// Load settings from JSON string
    pub fn load_from_json(json: &str) -> Result<Self, String> {
        match serde_json::from_str::<Settings>(json) {
            Ok(settings) => Ok(settings),
            Err(e) => Err(format!("Failed to parse JSON settings: {}", e)),
        }
    }

    /// Load settings from TOML string
    pub fn load_from_toml(_toml: &str) -> Result<Self, String> {
        // TODO: Implement TOML parsing once the format is finalized
        Err("TOML loading not yet implemented".to_string())
    }

    /// Initialize global settings
    pub fn init(path: Option<&str>) -> Result<(), String> {
        let settings = if let Some(path) = path {
            Self::load_from_file(path)?
        } else {
            Settings::default()
        };

        // Update the global settings
        let mut global_settings = SETTINGS.write().map_err(|e| e.to_string())?;
        *global_settings = settings;

        debug!("Settings initialized successfully");
        Ok(())
    }

    /// Get a copy of the current settings
    pub fn get() -> Result<Settings, String> {
        let settings = SETTINGS.read().map_err(|e| e.to_string())?;
        Ok(settings.clone())
    }

    /// Update specific settings
    pub fn update<F>(updater: F) -> Result<(), String>
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = SETTINGS.write().map_err(|e| e.to_string())?;
        updater(&mut settings);
        debug!("Settings updated successfully");
        Ok(())
    }
}

/// Helper function to get duration from settings
pub fn get_network_timeout(timeout_type: NetworkTimeoutType) -> Duration {
    let settings = match SETTINGS.read() {
        Ok(settings) => settings,
        Err(_) => {
            error!("Failed to access global settings, using defaults");
            return match timeout_type {
                NetworkTimeoutType::TcpConnect => Duration::from_secs(60),
                NetworkTimeoutType::TcpRead => Duration::from_secs(30),
                NetworkTimeoutType::TcpWrite => Duration::from_secs(30),
                NetworkTimeoutType::CommandResponse => Duration::from_secs(30),
                NetworkTimeoutType::PatternMatch => Duration::from_secs(20),
                NetworkTimeoutType::DeviceOperation => Duration::from_secs(120),
            };
        }
    };

    match timeout_type {
        NetworkTimeoutType::TcpConnect => {
            Duration::from_secs(settings.network.tcp_connect_timeout_secs)
        }
        NetworkTimeoutType::TcpRead => Duration::from_secs(settings.network.tcp_read_timeout_secs),
        NetworkTimeoutType::TcpWrite => {
            Duration::from_secs(settings.network.tcp_write_timeout_secs)
        }
        NetworkTimeoutType::CommandResponse => {
            Duration::from_secs(settings.network.command_response_timeout_secs)
        }
        NetworkTimeoutType::PatternMatch => {
            Duration::from_secs(settings.network.pattern_match_timeout_secs)
        }
        NetworkTimeoutType::DeviceOperation => {
            Duration::from_secs(settings.network.device_operation_timeout_secs)
        }
    }
}

/// Types of network timeouts
pub enum NetworkTimeoutType {
    TcpConnect,
    TcpRead,
    TcpWrite,
    CommandResponse,
    PatternMatch,
    DeviceOperation,
}

/// Types of SSH timeouts
pub enum SshTimeoutType {
    Blocking,
    Auth,
    ChannelOpen,
    KeepaliveInterval,
}

/// Helper function to get SSH timeouts
pub fn get_ssh_timeout(timeout_type: SshTimeoutType) -> Duration {
    let settings = match SETTINGS.read() {
        Ok(settings) => settings,
        Err(_) => {
            error!("Failed to access global settings, using defaults");
            return match timeout_type {
                SshTimeoutType::Blocking => Duration::from_secs(1),
                SshTimeoutType::Auth => Duration::from_secs(30),
                SshTimeoutType::ChannelOpen => Duration::from_secs(20),
                SshTimeoutType::KeepaliveInterval => Duration::from_secs(60),
            };
        }
    };

    match timeout_type {
        SshTimeoutType::Blocking => Duration::from_secs(settings.ssh.blocking_timeout_secs),
        SshTimeoutType::Auth => Duration::from_secs(settings.ssh.auth_timeout_secs),
        SshTimeoutType::ChannelOpen => Duration::from_secs(settings.ssh.channel_open_timeout_secs),
        SshTimeoutType::KeepaliveInterval => {
            Duration::from_secs(settings.ssh.keepalive_interval_secs)
        }
    }
}

/// Helper function to get the default interaction-engine timing settings
pub fn get_engine_setting(setting_type: EngineSettingType) -> u64 {
    let settings = match SETTINGS.read() {
        Ok(settings) => settings,
        Err(_) => {
            error!("Failed to access global settings, using defaults");
            let defaults = EngineSettings::default();
            return read_engine_setting(&defaults, setting_type);
        }
    };

    read_engine_setting(&settings.engine, setting_type)
}

fn read_engine_setting(engine: &EngineSettings, setting_type: EngineSettingType) -> u64 {
    match setting_type {
        EngineSettingType::CommandIntervalMs => engine.command_interval_ms,
        EngineSettingType::CommandTimeoutSecs => engine.command_timeout_secs,
        EngineSettingType::QuietAfterMs => engine.quiet_after_ms,
        EngineSettingType::QuietPollIntervalMs => engine.quiet_poll_interval_ms,
        EngineSettingType::PromptInducerIntervalMs => engine.prompt_inducer_interval_ms,
        EngineSettingType::PromptInducerMaxCount => engine.prompt_inducer_max_count as u64,
        EngineSettingType::ExitPauseMs => engine.exit_pause_ms,
        EngineSettingType::EnablePasswordFallbackMs => engine.enable_password_fallback_ms,
    }
}

/// Types of default interaction-engine timing settings
#[derive(Debug, Clone, Copy)]
pub enum EngineSettingType {
    CommandIntervalMs,
    CommandTimeoutSecs,
    QuietAfterMs,
    QuietPollIntervalMs,
    PromptInducerIntervalMs,
    PromptInducerMaxCount,
    ExitPauseMs,
    EnablePasswordFallbackMs,
}

