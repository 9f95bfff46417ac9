use netssh_sim::{hostkey, server, SimulatorConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const EXIT_CONFIG_LOAD_FAILURE: i32 = 1;
const EXIT_PORT_BIND_FAILURE: i32 = 2;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match SimulatorConfig::load() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!(target: "main", "failed to load simulator config: {}", e);
            std::process::exit(EXIT_CONFIG_LOAD_FAILURE);
        }
    };

    let namespaces: Vec<String> = config.namespaces.keys().cloned().collect();
    let host_key = match hostkey::load_or_generate(&config.root, &namespaces) {
        Ok(k) => k,
        Err(e) => {
            error!(target: "main", "failed to load host key: {}", e);
            std::process::exit(EXIT_CONFIG_LOAD_FAILURE);
        }
    };

    let server_config = Arc::new(russh::server::Config {
        keys: vec![host_key],
        auth_rejection_time: Duration::from_secs(1),
        ..Default::default()
    });

    info!(target: "main", namespaces = ?namespaces, "starting netssh-sim");

    let mut handles = Vec::with_capacity(namespaces.len());
    for namespace in namespaces {
        let config = config.clone();
        let server_config = server_config.clone();
        handles.push(tokio::spawn(async move {
            server::run_namespace(config, namespace, server_config).await
        }));
    }

    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(target: "main", "namespace listener failed: {}", e);
                std::process::exit(EXIT_PORT_BIND_FAILURE);
            }
            Err(e) => error!(target: "main", "listener task panicked: {}", e),
        }
    }
}
