pub mod engine;
pub mod error;
pub mod line_reader;
pub mod logging;
pub mod profile;
pub mod registry;
pub mod session_log;
pub mod settings;
pub mod transport;

// Import lazy_static for common regex patterns
#[macro_use]
extern crate lazy_static;

// Common regex patterns module
pub mod patterns {
    use regex::Regex;

    lazy_static! {
        // Common ANSI escape code pattern
        pub static ref ANSI_ESCAPE_PATTERN: Regex = Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").unwrap();

        // Common line ending normalization pattern
        pub static ref CRLF_PATTERN: Regex = Regex::new(r"\r\n").unwrap();
    }
}

pub use error::CoreError;
pub use logging::init_logging;
pub use settings::{get_engine_setting, get_network_timeout, get_ssh_timeout, Settings};

// Platform registry / profile / transport / line reader / interaction engine
pub use engine::{
    CommandResult as EngineCommandResult, Engine, SessionParams, SessionResult, SessionState,
    TaskOptions,
};
pub use line_reader::LineReader;
pub use profile::{AutoInteraction, PlatformProfile, PlatformProfileBuilder};
pub use registry::PlatformRegistry;
pub use session_log::SessionLog;
pub use transport::SshTransport;
