//! Platform profile (C2): the per-vendor constant bundle the interaction engine
//! consumes — prompts, paging, enable/config CLIs, auto-interactions, error
//! hints, timings. Value objects only; no behavior. Grounded on the per-vendor
//! constants scattered across `vendors/cisco/*.rs` and `vendors/juniper/*.rs`
//! (`"terminal length 0"`, `"configure terminal"`, `"enable\n"`) and the
//! default timings carried by `settings::EngineSettings`, generalized into data
//! per the explicit-builder redesign in the design notes (no more one struct
//! per vendor).

use crate::error::CoreError;
use crate::settings::{get_engine_setting, get_network_timeout, get_ssh_timeout, EngineSettingType, NetworkTimeoutType, SshTimeoutType};
use regex::Regex;
use std::time::Duration;

/// One entry in a profile's ordered auto-interaction list: when `expect`
/// appears in the tail since the last send, `send` is written back.
#[derive(Debug, Clone)]
pub struct AutoInteraction {
    pub expect: String,
    pub send: String,
    pub case_insensitive: bool,
}

impl AutoInteraction {
    pub fn new(expect: impl Into<String>, send: impl Into<String>) -> Self {
        Self {
            expect: expect.into(),
            send: send.into(),
            case_insensitive: true,
        }
    }

    /// Whether `expect` appears in `tail`, honoring `case_insensitive`.
    pub fn matches(&self, tail: &str) -> bool {
        if self.case_insensitive {
            tail.to_lowercase().contains(&self.expect.to_lowercase())
        } else {
            tail.contains(&self.expect)
        }
    }
}

/// Per-vendor constants consumed by the interaction engine (§3/§4.2). Built
/// once via `PlatformProfileBuilder` and registered immutably.
#[derive(Debug, Clone)]
pub struct PlatformProfile {
    pub name: String,

    /// Terminator characters a prompt line may end with, e.g. `>`, `#`, `]`.
    pub prompt_suffixes: Vec<char>,
    /// Precompiled prompt regex anchored at the tail of the buffer.
    pub prompt_regex: Regex,
    /// Precompiled regex matching the config-mode prompt specifically.
    pub config_prompt_regex: Regex,

    /// Paging-disable CLIs tried in order; at least one success is enough.
    pub paging_disable_clis: Vec<String>,

    pub enable_required: bool,
    pub enable_cli: String,
    pub enable_password_prompt_regex: Regex,

    pub config_mode_clis: Vec<String>,
    pub config_exit_cli: String,

    pub auto_interactions: Vec<AutoInteraction>,
    pub error_hints: Vec<String>,

    pub dial_timeout: Duration,
    pub auth_timeout: Duration,
    pub command_timeout: Duration,
    pub command_interval: Duration,
    pub quiet_after: Duration,
    pub quiet_poll_interval: Duration,
    pub prompt_inducer_interval: Duration,
    pub prompt_inducer_max_count: u32,
    pub exit_pause: Duration,
    pub enable_password_fallback: Duration,

    /// Remove the echoed command line from the head of captured output.
    pub skip_delayed_echo: bool,
}

impl PlatformProfile {
    pub fn builder(name: impl Into<String>) -> PlatformProfileBuilder {
        PlatformProfileBuilder::new(name)
    }
}

/// Explicit builder per the design notes' "re-architect as an explicit builder
/// called once at startup" — replaces the source's module-init side-effect
/// registration with a value the registry can validate before accepting.
pub struct PlatformProfileBuilder {
    name: String,
    prompt_suffixes: Vec<char>,
    config_prompt_pattern: String,
    paging_disable_clis: Vec<String>,
    enable_required: bool,
    enable_cli: String,
    enable_password_prompt: String,
    config_mode_clis: Vec<String>,
    config_exit_cli: String,
    auto_interactions: Vec<AutoInteraction>,
    error_hints: Vec<String>,
    dial_timeout: Duration,
    auth_timeout: Duration,
    command_timeout: Duration,
    command_interval: Duration,
    quiet_after: Duration,
    quiet_poll_interval: Duration,
    prompt_inducer_interval: Duration,
    prompt_inducer_max_count: u32,
    exit_pause: Duration,
    enable_password_fallback: Duration,
    skip_delayed_echo: bool,
}

impl PlatformProfileBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt_suffixes: vec!['>', '#', ']'],
            config_prompt_pattern: r"\([^)]*config[^)]*\)\s*#\s*$".to_string(),
            paging_disable_clis: Vec::new(),
            enable_required: false,
            enable_cli: "enable".to_string(),
            enable_password_prompt: r"(?i)password:\s*$".to_string(),
            config_mode_clis: Vec::new(),
            config_exit_cli: "end".to_string(),
            auto_interactions: default_auto_interactions(),
            error_hints: vec![
                "error".to_string(),
                "unrecognized command".to_string(),
                "incomplete".to_string(),
            ],
            dial_timeout: get_network_timeout(NetworkTimeoutType::TcpConnect),
            auth_timeout: get_ssh_timeout(SshTimeoutType::Auth),
            command_timeout: Duration::from_secs(get_engine_setting(EngineSettingType::CommandTimeoutSecs)),
            command_interval: Duration::from_millis(get_engine_setting(EngineSettingType::CommandIntervalMs)),
            quiet_after: Duration::from_millis(get_engine_setting(EngineSettingType::QuietAfterMs)),
            quiet_poll_interval: Duration::from_millis(get_engine_setting(
                EngineSettingType::QuietPollIntervalMs,
            )),
            prompt_inducer_interval: Duration::from_millis(get_engine_setting(
                EngineSettingType::PromptInducerIntervalMs,
            )),
            prompt_inducer_max_count: get_engine_setting(EngineSettingType::PromptInducerMaxCount) as u32,
            exit_pause: Duration::from_millis(get_engine_setting(EngineSettingType::ExitPauseMs)),
            enable_password_fallback: Duration::from_millis(get_engine_setting(
                EngineSettingType::EnablePasswordFallbackMs,
            )),
            skip_delayed_echo: true,
        }
    }

    pub fn prompt_suffixes(mut self, suffixes: Vec<char>) -> Self {
        self.prompt_suffixes = suffixes;
        self
    }

    /// Overrides the config-mode prompt regex. Defaults to the Cisco-style
    /// `(config)#` shape; VRP/Comware-style devices whose config prompt is a
    /// bracketed `[device]` with no trailing `#` need their own pattern.
    pub fn config_prompt_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config_prompt_pattern = pattern.into();
        self
    }

    pub fn paging_disable_clis(mut self, clis: Vec<&str>) -> Self {
        self.paging_disable_clis = clis.into_iter().map(String::from).collect();
        self
    }

    pub fn enable_required(mut self, required: bool) -> Self {
        self.enable_required = required;
        self
    }

    pub fn enable_cli(mut self, cli: impl Into<String>) -> Self {
        self.enable_cli = cli.into();
        self
    }

    pub fn config_mode_clis(mut self, clis: Vec<&str>) -> Self {
        self.config_mode_clis = clis.into_iter().map(String::from).collect();
        self
    }

    pub fn config_exit_cli(mut self, cli: impl Into<String>) -> Self {
        self.config_exit_cli = cli.into();
        self
    }

    pub fn auto_interactions(mut self, interactions: Vec<AutoInteraction>) -> Self {
        self.auto_interactions = interactions;
        self
    }

    pub fn error_hints(mut self, hints: Vec<&str>) -> Self {
        self.error_hints = hints.into_iter().map(String::from).collect();
        self
    }

    pub fn skip_delayed_echo(mut self, skip: bool) -> Self {
        self.skip_delayed_echo = skip;
        self
    }

    /// Compiles regexes and validates invariants (non-empty prompt-suffix set,
    /// all regexes compile). Called once at registration time, never on the hot
    /// path.
    pub fn build(self) -> Result<PlatformProfile, CoreError> {
        if self.prompt_suffixes.is_empty() {
            return Err(CoreError::ConfigError(format!(
                "profile {:?}: prompt-suffix set must be non-empty",
                self.name
            )));
        }

        let escaped: Vec<String> = self
            .prompt_suffixes
            .iter()
            .map(|c| regex::escape(&c.to_string()))
            .collect();
        let prompt_pattern = format!(r"[^\n]*[{}]\s*$", escaped.join(""));
        let prompt_regex = Regex::new(&prompt_pattern)?;

        let config_prompt_regex = Regex::new(&self.config_prompt_pattern)?;

        let enable_password_prompt_regex = Regex::new(&self.enable_password_prompt)?;

        Ok(PlatformProfile {
            name: self.name,
            prompt_suffixes: self.prompt_suffixes,
            prompt_regex,
            config_prompt_regex,
            paging_disable_clis: self.paging_disable_clis,
            enable_required: self.enable_required,
            enable_cli: self.enable_cli,
            enable_password_prompt_regex,
            config_mode_clis: self.config_mode_clis,
            config_exit_cli: self.config_exit_cli,
            auto_interactions: self.auto_interactions,
            error_hints: self.error_hints,
            dial_timeout: self.dial_timeout,
            auth_timeout: self.auth_timeout,
            command_timeout: self.command_timeout,
            command_interval: self.command_interval,
            quiet_after: self.quiet_after,
            quiet_poll_interval: self.quiet_poll_interval,
            prompt_inducer_interval: self.prompt_inducer_interval,
            prompt_inducer_max_count: self.prompt_inducer_max_count,
            exit_pause: self.exit_pause,
            enable_password_fallback: self.enable_password_fallback,
            skip_delayed_echo: self.skip_delayed_echo,
        })
    }
}

fn default_auto_interactions() -> Vec<AutoInteraction> {
    vec![
        AutoInteraction::new("--more--", " "),
        AutoInteraction::new("press any key", " "),
        AutoInteraction::new("confirm", "y\n"),
    ]
}

/// The `default` profile: no vendor-specific behavior, used when a platform
/// name resolves to nothing more specific (§4.2).
pub fn default_profile() -> Result<PlatformProfile, CoreError> {
    PlatformProfile::builder("default").build()
}

/// `cisco_ios`: enable-required, `terminal length 0` paging disable,
/// `configure terminal`/`end` config mode.
pub fn cisco_ios_profile() -> Result<PlatformProfile, CoreError> {
    PlatformProfile::builder("cisco_ios")
        .paging_disable_clis(vec!["terminal length 0"])
        .enable_required(true)
        .enable_cli("enable")
        .config_mode_clis(vec!["configure terminal"])
        .config_exit_cli("end")
        .error_hints(vec![
            "% invalid input detected",
            "% incomplete command",
            "% ambiguous command",
        ])
        .build()
}

/// `huawei_s`: VRP-style S-series switches, `screen-length 0 temporary` paging
/// disable, `system-view`/`return` config mode, no enable step (privilege is
/// granted at login on these devices).
pub fn huawei_s_profile() -> Result<PlatformProfile, CoreError> {
    PlatformProfile::builder("huawei_s")
        .prompt_suffixes(vec!['>', ']'])
        .config_prompt_pattern(r"\[[^\]]+\]\s*$")
        .paging_disable_clis(vec!["screen-length 0 temporary", "screen-length disable"])
        .enable_required(false)
        .config_mode_clis(vec!["system-view"])
        .config_exit_cli("return")
        .error_hints(vec!["error:", "unrecognized command", "incomplete command"])
        .build()
}

/// `h3c_s`: Comware-style S/SR/MSR devices, same shape as `huawei_s` (both VRP
/// and Comware descend from the same CLI lineage for these command families).
pub fn h3c_s_profile() -> Result<PlatformProfile, CoreError> {
    PlatformProfile::builder("h3c_s")
        .prompt_suffixes(vec!['>', ']'])
        .config_prompt_pattern(r"\[[^\]]+\]\s*$")
        .paging_disable_clis(vec!["screen-length disable"])
        .enable_required(false)
        .config_mode_clis(vec!["system-view"])
        .config_exit_cli("return")
        .error_hints(vec!["error:", "unrecognized command", "incomplete command"])
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_has_nonempty_suffixes_and_compiled_regexes() {
        let profile = default_profile().unwrap();
        assert!(!profile.prompt_suffixes.is_empty());
        assert!(profile.prompt_regex.is_match("switch#"));
    }

    #[test]
    fn builder_rejects_empty_prompt_suffixes() {
        let err = PlatformProfile::builder("broken")
            .prompt_suffixes(vec![])
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn auto_interaction_match_is_case_insensitive_by_default() {
        let ai = AutoInteraction::new("--More--", " ");
        assert!(ai.matches("output\n--more--"));
    }

    #[test]
    fn cisco_config_prompt_regex_matches_parenthesized_suffix() {
        let profile = cisco_ios_profile().unwrap();
        assert!(profile.config_prompt_regex.is_match("router(config)#"));
        assert!(!profile.config_prompt_regex.is_match("router>"));
    }

    #[test]
    fn huawei_config_prompt_regex_matches_bracketed_suffix_not_plain_prompt() {
        let profile = huawei_s_profile().unwrap();
        assert!(profile.config_prompt_regex.is_match("[huawei-s-01]"));
        assert!(!profile.config_prompt_regex.is_match("huawei-s-01>"));
    }
}
