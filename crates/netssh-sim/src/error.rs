use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("failed to load simulator config: {0}")]
    ConfigLoad(String),
    #[error("failed to bind namespace {namespace} to port {port} after {attempts} attempts: {source}")]
    PortBind {
        namespace: String,
        port: u16,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("host key error: {0}")]
    HostKey(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ssh error: {0}")]
    Ssh(#[from] russh::Error),
}
