//! Interaction engine (C5): the state machine driving one SSH shell session
//! end-to-end (§4.5). Consumes C2 (profile), C3 (transport), C4 (line reader).
//! Grounded on `base_connection.rs`'s `send_command`/enable/config-mode flow
//! (the enable-password wait, the `configure terminal` retry loop) and the
//! `CiscoDeviceConnection` trait shape in `vendors/cisco/mod.rs` (session
//! preparation -> disable paging -> [enable] -> [config] -> commands -> exit),
//! generalized from one trait-object-per-vendor into a single engine driven by
//! a `PlatformProfile` value.

use crate::error::CoreError;
use crate::line_reader::{LineReader, ReadOutcome};
use crate::profile::PlatformProfile;
use crate::session_log::SessionLog;
use crate::transport::SshTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// One step of the state machine (§3's SessionState entity). Owned exclusively
/// by the engine instance driving this session; never shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Dialing,
    Authenticating,
    AwaitingFirstPrompt,
    PagingDisabled,
    PrivEscalating,
    AwaitingEnablePw,
    InPrivileged,
    EnteringConfig,
    InConfig,
    RunningCommand,
    AwaitingInteraction,
    ExitingConfig,
    Closing,
    Terminal,
}

/// The typed task-options record replacing the source's `map[string]any`
/// metadata bag (§9). Unknown options are rejected by the dispatcher at
/// request validation, before a `TaskOptions` value ever reaches the engine.
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    pub enter_config_mode: bool,
    pub skip_enable: bool,
}

/// Per-job session parameters (a flattened view of one `DeviceRequest` entry,
/// §3, with the platform name already resolved to nothing — resolution
/// happens inside `run`).
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub enable_password: Option<String>,
    pub platform: String,
    pub commands: Vec<String>,
    pub task_options: TaskOptions,
    pub device_timeout: Option<Duration>,
}

/// One command's outcome (§3's CommandResult entity).
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub command: String,
    pub output: String,
    pub elapsed_ms: u64,
    pub error_kind: Option<&'static str>,
    pub error_detail: Option<String>,
    pub prompt_matched: bool,
}

impl CommandResult {
    fn ok(command: String, output: String, elapsed_ms: u64) -> Self {
        Self {
            command,
            output,
            elapsed_ms,
            error_kind: None,
            error_detail: None,
            prompt_matched: true,
        }
    }

    fn with_error(command: String, output: String, elapsed_ms: u64, err: &CoreError) -> Self {
        Self {
            command,
            output,
            elapsed_ms,
            error_kind: Some(err.error_kind()),
            error_detail: Some(err.to_string()),
            prompt_matched: false,
        }
    }

    fn cancelled(command: String) -> Self {
        Self {
            command,
            output: String::new(),
            elapsed_ms: 0,
            error_kind: Some("CANCELLED"),
            error_detail: Some("cancelled before this command started".to_string()),
            prompt_matched: false,
        }
    }
}

/// One session's full outcome (§3's DeviceResponse entity, minus the wire-
/// level device identity fields the dispatcher attaches at aggregation time).
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub success: bool,
    pub results: Vec<CommandResult>,
    pub total_duration_ms: u64,
    pub top_level_error: Option<String>,
}

/// Drives one SSH session through the state machine in §4.5. Construct, call
/// `run` once, discard — sessions are not reusable (§5: "No engine state is
/// shared across sessions").
pub struct Engine {
    profile: PlatformProfile,
    session_log: SessionLog,
}

impl Engine {
    pub fn new(profile: PlatformProfile) -> Self {
        Self {
            profile,
            session_log: SessionLog::new(),
        }
    }

    pub fn with_session_log(mut self, session_log: SessionLog) -> Self {
        self.session_log = session_log;
        self
    }

    /// Runs the full session. `cancel` is polled between steps and inside read
    /// loops; when observed true the session aborts promptly and every
    /// unstarted command is reported `CANCELLED` (§5).
    #[instrument(skip(self, params, cancel), fields(host = %params.host))]
    pub fn run(&mut self, params: &SessionParams, cancel: &AtomicBool) -> SessionResult {
        let session_start = Instant::now();
        let mut state = SessionState::Dialing;
        debug!(target: "Engine::run", ?state, "starting session");

        let result = self.run_inner(params, cancel, &mut state);
        debug!(target: "Engine::run", ?state, "session ended");

        match result {
            Ok(results) => SessionResult {
                success: !results.iter().any(|r| {
                    matches!(
                        r.error_kind,
                        Some("ENABLE_FAILED") | Some("CONFIG_MODE_FAILED") | Some("CANCELLED")
                    )
                }),
                results,
                total_duration_ms: session_start.elapsed().as_millis() as u64,
                top_level_error: None,
            },
            Err(err) => {
                let remaining: Vec<CommandResult> = params
                    .commands
                    .iter()
                    .map(|c| CommandResult::cancelled(c.clone()))
                    .collect();
                SessionResult {
                    success: false,
                    results: remaining,
                    total_duration_ms: session_start.elapsed().as_millis() as u64,
                    top_level_error: Some(format!("{} ({})", err, err.error_kind())),
                }
            }
        }
    }

    fn run_inner(
        &mut self,
        params: &SessionParams,
        cancel: &AtomicBool,
        state: &mut SessionState,
    ) -> Result<Vec<CommandResult>, CoreError> {
        let mut transport = SshTransport::dial(&params.host, params.port, self.profile.dial_timeout)?;
        *state = SessionState::Authenticating;
        check_cancelled(cancel)?;

        transport.authenticate(&params.username, &params.password, self.profile.auth_timeout)?;

        let mut channel = transport.open_shell()?;
        let mut reader = LineReader::new();

        *state = SessionState::AwaitingFirstPrompt;
        self.sync_first_prompt(&mut channel, &mut reader)?;

        *state = SessionState::PagingDisabled;
        self.disable_paging(&mut channel, &mut reader)?;
        check_cancelled(cancel)?;

        if self.profile.enable_required && !params.task_options.skip_enable {
            *state = SessionState::PrivEscalating;
            self.escalate_privilege(&mut channel, &mut reader, params)?;
            *state = SessionState::InPrivileged;
        }

        let mut in_config = false;
        if params.task_options.enter_config_mode && !self.profile.config_mode_clis.is_empty() {
            *state = SessionState::EnteringConfig;
            self.enter_config_mode(&mut channel, &mut reader)?;
            *state = SessionState::InConfig;
            in_config = true;
        }

        let mut results = Vec::with_capacity(params.commands.len());
        for command in &params.commands {
            if cancel.load(Ordering::Relaxed) {
                results.push(CommandResult::cancelled(command.clone()));
                continue;
            }
            *state = SessionState::RunningCommand;
            let result = self.run_command(&mut channel, &mut reader, command, params);
            results.push(result);
            std::thread::sleep(self.profile.command_interval);
        }

        if in_config {
            *state = SessionState::ExitingConfig;
            if let Err(e) = self.exit_config_mode(&mut channel, &mut reader) {
                warn!(target: "Engine::run_inner", "error exiting config mode: {}", e);
            }
            std::thread::sleep(self.profile.exit_pause);
        }

        *state = SessionState::Closing;
        transport.close();
        *state = SessionState::Terminal;

        Ok(results)
    }

    fn sync_first_prompt(
        &self,
        channel: &mut ssh2::Channel,
        reader: &mut LineReader,
    ) -> Result<(), CoreError> {
        for attempt in 0..self.profile.prompt_inducer_max_count {
            let outcome = reader.read_quiet(
                channel,
                &self.profile.prompt_regex,
                self.profile.quiet_after,
                self.profile.quiet_poll_interval,
                self.profile.prompt_inducer_interval,
            )?;
            if matches!(outcome, ReadOutcome::Matched { .. }) {
                reader.reset();
                return Ok(());
            }
            debug!(target: "Engine::sync_first_prompt", attempt, "no prompt yet, sending blank line");
            reader.write(channel, "\n")?;
        }
        Err(CoreError::no_prompt(self.profile.prompt_inducer_max_count))
    }

    fn disable_paging(
        &self,
        channel: &mut ssh2::Channel,
        reader: &mut LineReader,
    ) -> Result<(), CoreError> {
        let mut any_succeeded = self.profile.paging_disable_clis.is_empty();
        for cli in &self.profile.paging_disable_clis {
            reader.write(channel, &format!("{}\n", cli))?;
            let outcome = reader.read_quiet(
                channel,
                &self.profile.prompt_regex,
                self.profile.quiet_after,
                self.profile.quiet_poll_interval,
                self.profile.command_timeout,
            )?;
            if matches!(outcome, ReadOutcome::Matched { .. }) {
                any_succeeded = true;
            }
            reader.reset();
        }
        if any_succeeded {
            Ok(())
        } else {
            Err(CoreError::ChannelOpFailed(
                "no paging-disable CLI produced a prompt".to_string(),
            ))
        }
    }

    fn escalate_privilege(
        &self,
        channel: &mut ssh2::Channel,
        reader: &mut LineReader,
        params: &SessionParams,
    ) -> Result<(), CoreError> {
        reader.write(channel, &format!("{}\n", self.profile.enable_cli))?;

        let outcome = reader.read_until(
            channel,
            |tail| {
                self.profile
                    .enable_password_prompt_regex
                    .find(tail)
                    .map(|m| m.start())
            },
            self.profile.quiet_poll_interval,
            self.profile.enable_password_fallback,
        )?;

        if let ReadOutcome::Matched { .. } = outcome {
            let enable_password = params.enable_password.as_deref().unwrap_or(&params.password);
            reader.write(channel, &format!("{}\n", enable_password))?;
        }

        let outcome = reader.read_quiet(
            channel,
            &self.profile.prompt_regex,
            self.profile.quiet_after,
            self.profile.quiet_poll_interval,
            self.profile.command_timeout,
        )?;
        reader.reset();
        match outcome {
            ReadOutcome::Matched { .. } => Ok(()),
            ReadOutcome::TimedOut { .. } => {
                Err(CoreError::EnableFailed("no privileged prompt after enable".to_string()))
            }
        }
    }

    fn enter_config_mode(
        &self,
        channel: &mut ssh2::Channel,
        reader: &mut LineReader,
    ) -> Result<(), CoreError> {
        for cli in &self.profile.config_mode_clis {
            reader.write(channel, &format!("{}\n", cli))?;
            let outcome = reader.read_quiet(
                channel,
                &self.profile.config_prompt_regex,
                self.profile.quiet_after,
                self.profile.quiet_poll_interval,
                self.profile.command_timeout,
            )?;
            reader.reset();
            if matches!(outcome, ReadOutcome::Matched { .. }) {
                return Ok(());
            }
        }
        Err(CoreError::ConfigModeFailed(
            "no config-mode CLI produced the config prompt".to_string(),
        ))
    }

    fn exit_config_mode(
        &self,
        channel: &mut ssh2::Channel,
        reader: &mut LineReader,
    ) -> Result<(), CoreError> {
        reader.write(channel, &format!("{}\n", self.profile.config_exit_cli))?;
        reader.read_quiet(
            channel,
            &self.profile.prompt_regex,
            self.profile.quiet_after,
            self.profile.quiet_poll_interval,
            self.profile.command_timeout,
        )?;
        reader.reset();
        Ok(())
    }

    /// Runs one command to completion per the step-5 contract: write, poll for
    /// pager/auto-interaction/error-hint/prompt, strip the trailing prompt and
    /// (optionally) the echoed command line, or time out.
    fn run_command(
        &self,
        channel: &mut ssh2::Channel,
        reader: &mut LineReader,
        command: &str,
        params: &SessionParams,
    ) -> CommandResult {
        let t0 = Instant::now();
        if let Err(e) = reader.write(channel, &format!("{}\n", command)) {
            return CommandResult::with_error(command.to_string(), String::new(), 0, &e);
        }

        let deadline = [
            self.profile.command_timeout,
            params.device_timeout.unwrap_or(self.profile.command_timeout),
        ]
        .into_iter()
        .min()
        .unwrap();

        let outcome = loop {
            let step = reader.read_until(
                channel,
                |tail| self.classify_tail(tail),
                self.profile.quiet_poll_interval,
                deadline.saturating_sub(t0.elapsed()),
            );
            let step = match step {
                Ok(o) => o,
                Err(e) => {
                    reader.reset();
                    return CommandResult::with_error(
                        command.to_string(),
                        reader.tail_str(),
                        t0.elapsed().as_millis() as u64,
                        &e,
                    );
                }
            };

            match step {
                ReadOutcome::Matched { buf, matched_at: _ } => {
                    if self.dispatch_auto_interaction(channel, reader, &buf) {
                        // Clear the tail so the keyword that just fired (e.g. a
                        // pager's "--more--") isn't still sitting in the buffer on
                        // the next poll — otherwise classify_tail would match the
                        // same stale bytes forever and dispatch_auto_interaction
                        // would busy-fire without ever reading the device's actual
                        // reply.
                        reader.reset();
                        continue;
                    }
                    break ReadOutcome::Matched {
                        buf,
                        matched_at: 0,
                    };
                }
                ReadOutcome::TimedOut { buf } => break ReadOutcome::TimedOut { buf },
            }

            if t0.elapsed() >= deadline {
                break ReadOutcome::TimedOut {
                    buf: reader.tail_str(),
                };
            }
        };

        let elapsed_ms = t0.elapsed().as_millis() as u64;

        match outcome {
            ReadOutcome::TimedOut { buf } => {
                let _ = reader.write(channel, "\x03");
                reader.reset();
                CommandResult::with_error(
                    command.to_string(),
                    buf,
                    elapsed_ms,
                    &CoreError::command_timeout(command, elapsed_ms),
                )
            }
            ReadOutcome::Matched { buf, .. } => {
                let output = self.profile.prompt_regex.replace(&buf, "").to_string();
                let output = if self.profile.skip_delayed_echo {
                    LineReader::strip_echoed_command(&output, command)
                } else {
                    output
                };

                if let Some(hint) = self.find_error_hint(&output) {
                    self.session_log.log_command(command, &output).ok();
                    reader.reset();
                    return CommandResult::with_error(
                        command.to_string(),
                        output.clone(),
                        elapsed_ms,
                        &CoreError::command_error_with_output(command, hint, output),
                    );
                }

                self.session_log.log_command(command, &output).ok();
                reader.reset();
                CommandResult::ok(command.to_string(), output, elapsed_ms)
            }
        }
    }

    /// Returns `Some(idx)` when the tail looks "done for now": an auto-
    /// interaction fired (handled by the caller), an error hint plus a prompt,
    /// or a bare prompt.
    fn classify_tail(&self, tail: &str) -> Option<usize> {
        if self
            .profile
            .auto_interactions
            .iter()
            .any(|ai| ai.matches(tail))
        {
            return Some(tail.len());
        }
        self.profile.prompt_regex.find(tail).map(|m| m.start())
    }

    /// At most one interaction per tail-match cycle (§4.5 step 5), ordered
    /// strictly by the profile's interaction list (earlier entry wins ties).
    fn dispatch_auto_interaction(
        &self,
        channel: &mut ssh2::Channel,
        reader: &mut LineReader,
        tail: &str,
    ) -> bool {
        for interaction in &self.profile.auto_interactions {
            if interaction.matches(tail) {
                debug!(target: "Engine::dispatch_auto_interaction", expect = %interaction.expect, "firing auto-interaction");
                let _ = reader.write(channel, &interaction.send);
                return true;
            }
        }
        false
    }

    fn find_error_hint(&self, output: &str) -> Option<String> {
        let lower = output.to_lowercase();
        self.profile
            .error_hints
            .iter()
            .find(|hint| lower.contains(&hint.to_lowercase()))
            .cloned()
    }
}

fn check_cancelled(cancel: &AtomicBool) -> Result<(), CoreError> {
    if cancel.load(Ordering::Relaxed) {
        Err(CoreError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_result_ok_has_no_error_kind() {
        let r = CommandResult::ok("show version".into(), "output".into(), 5);
        assert!(r.error_kind.is_none());
        assert!(r.prompt_matched);
    }

    #[test]
    fn command_result_cancelled_has_cancelled_kind() {
        let r = CommandResult::cancelled("show version".into());
        assert_eq!(r.error_kind, Some("CANCELLED"));
    }

    #[test]
    fn session_result_is_unsuccessful_when_any_command_is_fatal() {
        let engine_like_results = vec![
            CommandResult::ok("a".into(), "ok".into(), 1),
            CommandResult::with_error(
                "b".into(),
                "".into(),
                1,
                &CoreError::EnableFailed("no prompt".into()),
            ),
        ];
        let success = !engine_like_results.iter().any(|r| {
            matches!(
                r.error_kind,
                Some("ENABLE_FAILED") | Some("CONFIG_MODE_FAILED") | Some("CANCELLED")
            )
        });
        assert!(!success);
    }
}
