//! SSH transport (C3): dial, authenticate, open an interactive shell, and move raw
//! bytes in and out of it. Grounded on the connect/channel-open sequence in
//! `base_connection.rs`, generalized to the engine's explicit dial/authenticate/
//! open-shell contract and to keyboard-interactive auth (the device-side prompts
//! devices answer with a raw password, per the "insecure-accept-any" host-key
//! policy this spec calls for).

use crate::error::CoreError;
use ssh2::{KeyboardInteractivePrompt, Prompt, Session};
use std::net::TcpStream;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Advisory PTY dimensions requested on every shell open (vt100, 80x24).
const PTY_TERM: &str = "vt100";
const PTY_WIDTH: u32 = 80;
const PTY_HEIGHT: u32 = 24;

/// Answers every keyboard-interactive prompt with the session password, matching
/// the devices this transport targets (no MFA, no username echo games).
struct PasswordPrompter<'a> {
    password: &'a str,
}

impl<'a> KeyboardInteractivePrompt for PasswordPrompter<'a> {
    fn prompt<'p>(
        &mut self,
        _username: &str,
        _instructions: &str,
        prompts: &[Prompt<'p>],
    ) -> Vec<String> {
        prompts.iter().map(|_| self.password.to_string()).collect()
    }
}

/// A live SSH connection: TCP stream + authenticated `ssh2::Session`. Holds no
/// shell state of its own — `open_shell` hands that off to the caller.
pub struct SshTransport {
    session: Session,
}

impl SshTransport {
    /// Dials `host:port` with a hard connect timeout. Error kind `DIAL_FAILED`.
    #[instrument(skip(password), fields(host, port))]
    pub fn dial(host: &str, port: u16, dial_timeout: Duration) -> Result<Self, CoreError> {
        let addr = format!("{}:{}", host, port);
        debug!(target: "SshTransport::dial", "connecting to {}", addr);

        let tcp = TcpStream::connect(&addr).map_err(|e| CoreError::dial_failed(addr.clone(), e))?;
        tcp.set_read_timeout(Some(dial_timeout))
            .map_err(CoreError::IoError)?;
        tcp.set_write_timeout(Some(dial_timeout))
            .map_err(CoreError::IoError)?;

        let mut session = Session::new().map_err(CoreError::SshError)?;
        session.set_tcp_stream(tcp);
        // Host-key policy is insecure-accept-any: ssh2 performs no known_hosts
        // verification unless one is explicitly attached, which matches the
        // deliberate "accept any" posture for managed network devices.
        session
            .handshake()
            .map_err(|e| CoreError::dial_failed(addr, std::io::Error::new(std::io::ErrorKind::Other, e)))?;

        Ok(Self { session })
    }

    /// Authenticates with password auth, falling back to keyboard-interactive if
    /// the server advertises it. Error kind `AUTH_FAILED`.
    #[instrument(skip(self, password), fields(username))]
    pub fn authenticate(
        &mut self,
        username: &str,
        password: &str,
        auth_timeout: Duration,
    ) -> Result<(), CoreError> {
        self.session.set_timeout(auth_timeout.as_millis() as u32);

        if self.session.userauth_password(username, password).is_ok() {
            debug!(target: "SshTransport::authenticate", "password auth succeeded");
            return Ok(());
        }

        let methods = self.session.auth_methods(username).unwrap_or_default();
        if methods.contains("keyboard-interactive") {
            debug!(target: "SshTransport::authenticate", "retrying via keyboard-interactive");
            let mut prompter = PasswordPrompter { password };
            if self
                .session
                .userauth_keyboard_interactive(username, &mut prompter)
                .is_ok()
            {
                return Ok(());
            }
        }

        if self.session.authenticated() {
            return Ok(());
        }

        Err(CoreError::auth_failed(
            username,
            ssh2::Error::from_errno(ssh2::ErrorCode::Session(-18)),
        ))
    }

    /// Opens a channel, requests a PTY, then an interactive shell. Error kind
    /// `CHANNEL_FAILED`.
    #[instrument(skip(self))]
    pub fn open_shell(&mut self) -> Result<ssh2::Channel, CoreError> {
        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| CoreError::channel_op_failed(format!("channel_session: {}", e)))?;

        channel
            .request_pty(PTY_TERM, None, Some((PTY_WIDTH, PTY_HEIGHT, 0, 0)))
            .map_err(|e| CoreError::channel_op_failed(format!("request_pty: {}", e)))?;

        channel
            .shell()
            .map_err(|e| CoreError::channel_op_failed(format!("shell: {}", e)))?;

        self.session.set_blocking(false);
        Ok(channel)
    }

    /// Closes the session. Idempotent: safe to call after a failed or partial
    /// connect. Every engine exit path must reach this.
    pub fn close(&mut self) {
        if let Err(e) = self.session.disconnect(None, "closing", None) {
            warn!(target: "SshTransport::close", "error disconnecting session: {}", e);
        }
    }
}

impl Drop for SshTransport {
    fn drop(&mut self) {
        self.close();
    }
}
