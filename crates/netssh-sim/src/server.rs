//! Per-namespace SSH server (§4.8). Accepts any username, requires the
//! literal password `nova` over password or keyboard-interactive auth,
//! enforces `max_conn` active sessions, and serves `shell`/`exec` channels
//! against the fixture lookup in `fixtures.rs`. No client-side grounding
//! exists for this in the teacher (`ssh2` is client-only); the session
//! bookkeeping (one state machine per connection, tracing spans on every
//! step) still follows `base_connection.rs`'s conventions.

use crate::config::{DeviceTypeConfig, SimulatorConfig};
use crate::fixtures;
use async_trait::async_trait;
use russh::keys::PublicKey;
use russh::server::{Auth, Handler, Msg, Server as RusshServer, Session};
use russh::{Channel, ChannelId, CryptoVec};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const REQUIRED_PASSWORD: &str = "nova";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    User,
    Privileged,
    Config,
}

/// One `Server` instance per namespace; `new_client` is called once per
/// accepted TCP connection and hands back a fresh `ConnectionHandler`.
#[derive(Clone)]
pub struct NamespaceServer {
    config: Arc<SimulatorConfig>,
    namespace: String,
    max_conn: usize,
    active: Arc<AtomicUsize>,
}

impl NamespaceServer {
    pub fn new(config: Arc<SimulatorConfig>, namespace: String, max_conn: usize) -> Self {
        Self {
            config,
            namespace,
            max_conn,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl RusshServer for NamespaceServer {
    type Handler = ConnectionHandler;

    fn new_client(&mut self, _peer_addr: Option<std::net::SocketAddr>) -> ConnectionHandler {
        let admitted = self.active.fetch_add(1, Ordering::SeqCst) < self.max_conn;
        if !admitted {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
        ConnectionHandler {
            config: self.config.clone(),
            namespace: self.namespace.clone(),
            active: self.active.clone(),
            admitted,
            device_name: None,
            device_type: None,
            mode: Mode::User,
            awaiting_enable_password: false,
            line_buffer: String::new(),
            last_activity: Arc::new(Mutex::new(Instant::now())),
        }
    }
}

pub struct ConnectionHandler {
    config: Arc<SimulatorConfig>,
    namespace: String,
    active: Arc<AtomicUsize>,
    admitted: bool,
    device_name: Option<String>,
    device_type: Option<DeviceTypeConfig>,
    mode: Mode,
    awaiting_enable_password: bool,
    line_buffer: String,
    last_activity: Arc<Mutex<Instant>>,
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        if self.admitted {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl ConnectionHandler {
    fn touch(&self) {
        *self.last_activity.lock().expect("last_activity lock poisoned") = Instant::now();
    }

    fn idle_secs(&self) -> u64 {
        self.config
            .namespaces
            .get(&self.namespace)
            .map(|ns| ns.idle_secs)
            .unwrap_or(300)
    }

    fn suffix(&self) -> &str {
        let device_type = match &self.device_type {
            Some(dt) => dt,
            None => return ">",
        };
        match self.mode {
            Mode::User => &device_type.prompt_suffix,
            Mode::Privileged => &device_type.enable_suffix,
            Mode::Config => &device_type.config_suffix,
        }
    }

    fn prompt(&self) -> String {
        format!("{}{}", self.device_name.as_deref().unwrap_or(""), self.suffix())
    }

    async fn write(&self, session: &mut Session, channel: ChannelId, text: &str) {
        let _ = session.data(channel, CryptoVec::from(text.as_bytes().to_vec()));
    }

    async fn reprint_prompt(&self, session: &mut Session, channel: ChannelId) {
        self.write(session, channel, &self.prompt()).await;
    }

    /// Processes one complete line of input against the step order in §4.8.
    #[instrument(skip(self, session), fields(device = self.device_name.as_deref().unwrap_or("?")))]
    async fn handle_line(&mut self, channel: ChannelId, line: &str, session: &mut Session) {
        if self.awaiting_enable_password {
            self.awaiting_enable_password = false;
            if line == REQUIRED_PASSWORD {
                self.mode = Mode::Privileged;
            }
            self.write(session, channel, "\r\n").await;
            self.reprint_prompt(session, channel).await;
            return;
        }

        if line.is_empty() {
            self.write(session, channel, "\r\n").await;
            self.reprint_prompt(session, channel).await;
            return;
        }

        if line == "exit" || line == "quit" {
            let _ = session.close(channel);
            return;
        }

        let device_type = self.device_type.clone();
        let Some(device_type) = device_type else {
            self.write(session, channel, "\r\nunsupportted command\r\n").await;
            self.reprint_prompt(session, channel).await;
            return;
        };

        if line == "enable" && device_type.enable_required && self.mode == Mode::User {
            self.awaiting_enable_password = true;
            self.write(session, channel, "\r\nPassword:").await;
            return;
        }

        if self.mode == Mode::Privileged && device_type.config_enter_clis.iter().any(|c| c == line) {
            self.mode = Mode::Config;
            self.write(session, channel, "\r\n").await;
            self.reprint_prompt(session, channel).await;
            return;
        }

        if self.mode == Mode::Config
            && device_type.config_exit_cli.as_deref() == Some(line)
        {
            self.mode = Mode::Privileged;
            self.write(session, channel, "\r\n").await;
            self.reprint_prompt(session, channel).await;
            return;
        }

        let device = self.device_name.clone().unwrap_or_default();
        let output = fixtures::lookup(&self.config.root, &self.namespace, &device, line);

        // `sleep_forever` with no fixture file is a deliberate hang marker (§8
        // scenario S4): the device never answers and never reprints its
        // prompt, so the engine's own command-timeout deadline is what ends
        // the exchange. Every other missing fixture still gets the general
        // "unsupportted command" fallback below.
        if output.is_none() && line == "sleep_forever" {
            return;
        }

        self.write(session, channel, "\r\n").await;
        match output {
            Some(content) => self.write(session, channel, &content).await,
            None => self.write(session, channel, "unsupportted command\r\n").await,
        }
        self.reprint_prompt(session, channel).await;
    }

    fn spawn_idle_watcher(&self, channel: ChannelId, session: &Session) {
        let handle = session.handle();
        let last_activity = self.last_activity.clone();
        let idle_secs = self.idle_secs();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                let elapsed = last_activity
                    .lock()
                    .expect("last_activity lock poisoned")
                    .elapsed();
                if elapsed >= Duration::from_secs(idle_secs) {
                    let _ = handle
                        .data(
                            channel,
                            CryptoVec::from(b"\r\nSession closed due to idle timeout.\r\n".to_vec()),
                        )
                        .await;
                    let _ = handle.close(channel).await;
                    break;
                }
            }
        });
    }
}

#[async_trait]
impl Handler for ConnectionHandler {
    type Error = russh::Error;

    async fn auth_publickey(&mut self, _user: &str, _key: &PublicKey) -> Result<Auth, Self::Error> {
        Ok(Auth::reject())
    }

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        if !self.admitted {
            warn!(target: "ConnectionHandler::auth_password", namespace = %self.namespace, "rejecting connection: namespace saturated");
            return Ok(Auth::reject());
        }
        if password == REQUIRED_PASSWORD {
            self.device_name = Some(user.to_string());
            self.device_type = self.config.device_type_for(user).cloned();
            self.touch();
            Ok(Auth::Accept)
        } else {
            Ok(Auth::reject())
        }
    }

    async fn auth_keyboard_interactive(
        &mut self,
        user: &str,
        _submethods: &str,
        response: Option<russh::server::Response<'async_trait>>,
    ) -> Result<Auth, Self::Error> {
        if !self.admitted {
            return Ok(Auth::reject());
        }
        let answered_password = response
            .and_then(|mut r| r.next())
            .map(|answer| answer == REQUIRED_PASSWORD.as_bytes())
            .unwrap_or(false);
        if answered_password {
            self.device_name = Some(user.to_string());
            self.device_type = self.config.device_type_for(user).cloned();
            self.touch();
            Ok(Auth::Accept)
        } else {
            Ok(Auth::Partial {
                name: "".into(),
                instructions: "".into(),
                prompts: vec![("Password: ".into(), false)],
            })
        }
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        session: &mut Session,
    ) -> Result<bool, Self::Error> {
        debug!(target: "ConnectionHandler::channel_open_session", "session channel opened");
        self.spawn_idle_watcher(channel.id(), session);
        Ok(true)
    }

    async fn shell_request(&mut self, channel: ChannelId, session: &mut Session) -> Result<(), Self::Error> {
        self.touch();
        self.reprint_prompt(session, channel).await;
        session.channel_success(channel)?;
        Ok(())
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.touch();
        let command = String::from_utf8_lossy(data).trim().to_string();
        self.handle_line(channel, &command, session).await;
        session.channel_success(channel)?;
        let _ = session.exit_status_request(channel, 0);
        let _ = session.close(channel);
        Ok(())
    }

    async fn data(&mut self, channel: ChannelId, data: &[u8], session: &mut Session) -> Result<(), Self::Error> {
        self.touch();
        for byte in data {
            match *byte {
                b'\n' => {
                    let line = std::mem::take(&mut self.line_buffer);
                    let line = line.trim_end_matches('\r').to_string();
                    self.handle_line(channel, &line, session).await;
                }
                b'\r' => {}
                other => self.line_buffer.push(other as char),
            }
        }
        Ok(())
    }
}

#[instrument(skip(config))]
pub async fn run_namespace(
    config: Arc<SimulatorConfig>,
    namespace: String,
    server_config: Arc<russh::server::Config>,
) -> Result<(), crate::error::SimError> {
    let ns_cfg = config
        .namespaces
        .get(&namespace)
        .cloned()
        .expect("namespace must be registered before run_namespace is called");

    let mut server = NamespaceServer::new(config, namespace.clone(), ns_cfg.max_conn);

    let addr = ("0.0.0.0", ns_cfg.listen_port);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match russh::server::Server::run_on_address(&mut server, server_config.clone(), addr).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < 5 => {
                warn!(target: "run_namespace", namespace = %namespace, attempt, "bind/run failed: {}, retrying", e);
                tokio::time::sleep(Duration::from_millis(300 * attempt as u64)).await;
            }
            Err(e) => {
                return Err(crate::error::SimError::PortBind {
                    namespace,
                    port: ns_cfg.listen_port,
                    attempts: attempt,
                    source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulatorConfig;

    #[test]
    fn prompt_reflects_mode_and_device_type() {
        let config = Arc::new(SimulatorConfig::scenario_defaults());
        let mut handler = ConnectionHandler {
            config: config.clone(),
            namespace: "default".to_string(),
            active: Arc::new(AtomicUsize::new(1)),
            admitted: true,
            device_name: Some("cisco-ios-01".to_string()),
            device_type: config.device_type_for("cisco-ios-01").cloned(),
            mode: Mode::User,
            awaiting_enable_password: false,
            line_buffer: String::new(),
            last_activity: Arc::new(Mutex::new(Instant::now())),
        };
        assert_eq!(handler.prompt(), "cisco-ios-01>");
        handler.mode = Mode::Privileged;
        assert_eq!(handler.prompt(), "cisco-ios-01#");
        handler.mode = Mode::Config;
        assert_eq!(handler.prompt(), "cisco-ios-01(config)#");
    }
}
