//! Pure SSH server that replays canned command outputs, keyed by (namespace,
//! device name, command) (C8, §4.8). Exposed as a library as well as the
//! `netssh-sim` binary so integration tests in the other crates can spin up
//! an in-process simulator instance over loopback rather than shelling out.

pub mod config;
pub mod error;
pub mod fixtures;
pub mod hostkey;
pub mod server;

pub use config::SimulatorConfig;
pub use error::SimError;
pub use server::run_namespace;
