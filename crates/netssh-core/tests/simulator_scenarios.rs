//! End-to-end scenarios run against an in-process `netssh-sim` server over real
//! loopback TCP (§8's S1-S6), driving the full `Engine`/`SshTransport` stack the
//! way a production session would rather than exercising either side in
//! isolation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use netssh_core::engine::{Engine, SessionParams, TaskOptions};
use netssh_core::profile::{cisco_ios_profile, huawei_s_profile};
use netssh_sim::config::{DeviceTypeConfig, NamespaceConfig, SimulatorConfig};
use netssh_sim::{hostkey, server};

const DEVICE_PASSWORD: &str = "nova";

fn write_fixture(root: &Path, namespace: &str, device: &str, file: &str, content: &str) {
    let dir = root.join("namespace").join(namespace).join(device);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(file), content).unwrap();
}

fn huawei_device_type() -> DeviceTypeConfig {
    DeviceTypeConfig {
        prompt_suffix: ">".to_string(),
        enable_required: false,
        enable_suffix: "#".to_string(),
        config_suffix: "[config]#".to_string(),
        config_enter_clis: vec!["system-view".to_string()],
        config_exit_cli: Some("return".to_string()),
    }
}

fn cisco_device_type() -> DeviceTypeConfig {
    DeviceTypeConfig {
        prompt_suffix: ">".to_string(),
        enable_required: true,
        enable_suffix: "#".to_string(),
        config_suffix: "(config)#".to_string(),
        config_enter_clis: vec!["configure terminal".to_string()],
        config_exit_cli: Some("end".to_string()),
    }
}

/// Spawns `run_namespace` on a background thread with its own runtime, against
/// `port`, serving `root`. Blocks briefly to give the listener time to bind.
fn spawn_simulator(
    root: PathBuf,
    port: u16,
    device_map: HashMap<String, String>,
    device_types: HashMap<String, DeviceTypeConfig>,
) {
    let mut namespaces = HashMap::new();
    namespaces.insert(
        "default".to_string(),
        NamespaceConfig {
            listen_port: port,
            idle_secs: 60,
            max_conn: 10,
        },
    );

    let config = Arc::new(SimulatorConfig {
        namespaces,
        device_types,
        device_map,
        root: root.clone(),
    });

    let host_key =
        hostkey::load_or_generate(&root, &["default".to_string()]).expect("host key generation");
    let server_config = Arc::new(russh::server::Config {
        keys: vec![host_key],
        auth_rejection_time: Duration::from_millis(50),
        ..Default::default()
    });

    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().expect("tokio runtime for simulator");
        rt.block_on(async move {
            let _ = server::run_namespace(config, "default".to_string(), server_config).await;
        });
    });

    std::thread::sleep(Duration::from_millis(300));
}

fn base_params(port: u16, device: &str, commands: Vec<&str>) -> SessionParams {
    SessionParams {
        host: "127.0.0.1".to_string(),
        port,
        username: device.to_string(),
        password: DEVICE_PASSWORD.to_string(),
        enable_password: None,
        platform: device.to_string(),
        commands: commands.into_iter().map(String::from).collect(),
        task_options: TaskOptions::default(),
        device_timeout: Some(Duration::from_secs(5)),
    }
}

#[test]
fn s1_echo_command_returns_fixture_output() {
    let dir = tempfile::tempdir().unwrap();
    let port = 23101;
    write_fixture(
        dir.path(),
        "default",
        "huawei-s-01",
        "show_version.txt",
        "VRP (R) software, Version 5.170\n",
    );

    let mut device_map = HashMap::new();
    device_map.insert("huawei-s-01".to_string(), "huawei_s".to_string());
    let mut device_types = HashMap::new();
    device_types.insert("huawei_s".to_string(), huawei_device_type());
    spawn_simulator(dir.path().to_path_buf(), port, device_map, device_types);

    let params = base_params(port, "huawei-s-01", vec!["show version"]);
    let mut engine = Engine::new(huawei_s_profile().unwrap());
    let result = engine.run(&params, &AtomicBool::new(false));

    assert!(result.success, "session failed: {:?}", result.top_level_error);
    assert_eq!(result.results.len(), 1);
    let cmd = &result.results[0];
    assert!(cmd.error_kind.is_none(), "unexpected error: {:?}", cmd.error_detail);
    assert!(cmd.output.contains("VRP (R) software, Version 5.170"));
}

#[test]
fn s2_long_output_carries_no_pager_marker() {
    let dir = tempfile::tempdir().unwrap();
    let port = 23102;
    let content: String = (1..=200).map(|i| format!("line {}\n", i)).collect();
    write_fixture(dir.path(), "default", "huawei-s-01", "show_log.txt", &content);

    let mut device_map = HashMap::new();
    device_map.insert("huawei-s-01".to_string(), "huawei_s".to_string());
    let mut device_types = HashMap::new();
    device_types.insert("huawei_s".to_string(), huawei_device_type());
    spawn_simulator(dir.path().to_path_buf(), port, device_map, device_types);

    let params = base_params(port, "huawei-s-01", vec!["show log"]);
    let mut engine = Engine::new(huawei_s_profile().unwrap());
    let result = engine.run(&params, &AtomicBool::new(false));

    assert!(result.success, "session failed: {:?}", result.top_level_error);
    let cmd = &result.results[0];
    assert!(cmd.error_kind.is_none());
    assert!(cmd.output.contains("line 1"));
    assert!(cmd.output.contains("line 200"));
    assert!(!cmd.output.to_lowercase().contains("more"));
}

#[test]
fn s3_enable_and_config_mode_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let port = 23103;
    write_fixture(
        dir.path(),
        "default",
        "cisco-ios-01",
        "show_version.txt",
        "Cisco IOS Software, Version 15.1\n",
    );

    let mut device_map = HashMap::new();
    device_map.insert("cisco-ios-01".to_string(), "cisco_ios".to_string());
    let mut device_types = HashMap::new();
    device_types.insert("cisco_ios".to_string(), cisco_device_type());
    spawn_simulator(dir.path().to_path_buf(), port, device_map, device_types);

    let mut params = base_params(port, "cisco-ios-01", vec!["show version"]);
    params.task_options = TaskOptions {
        enter_config_mode: true,
        skip_enable: false,
    };
    let mut engine = Engine::new(cisco_ios_profile().unwrap());
    let result = engine.run(&params, &AtomicBool::new(false));

    assert!(result.success, "session failed: {:?}", result.top_level_error);
    let cmd = &result.results[0];
    assert!(cmd.error_kind.is_none(), "unexpected error: {:?}", cmd.error_detail);
    assert!(cmd.output.contains("Cisco IOS Software"));
}

#[test]
fn s4_missing_sleep_forever_fixture_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let port = 23104;

    let mut device_map = HashMap::new();
    device_map.insert("huawei-s-01".to_string(), "huawei_s".to_string());
    let mut device_types = HashMap::new();
    device_types.insert("huawei_s".to_string(), huawei_device_type());
    spawn_simulator(dir.path().to_path_buf(), port, device_map, device_types);

    let mut params = base_params(port, "huawei-s-01", vec!["sleep_forever"]);
    params.device_timeout = Some(Duration::from_millis(1500));
    let mut engine = Engine::new(huawei_s_profile().unwrap());
    let result = engine.run(&params, &AtomicBool::new(false));

    let cmd = &result.results[0];
    assert_eq!(cmd.error_kind, Some("COMMAND_TIMEOUT"));
    // Per-command timeouts don't flip session-level success (§7); only
    // enable/config/cancellation failures do.
    assert!(result.success);
    assert!(result.total_duration_ms < 10_000);
}

#[test]
fn s5_device_error_hint_is_classified() {
    let dir = tempfile::tempdir().unwrap();
    let port = 23105;
    write_fixture(
        dir.path(),
        "default",
        "cisco-ios-01",
        "show_bogus.txt",
        "% Invalid input detected at '^' marker.\n",
    );

    let mut device_map = HashMap::new();
    device_map.insert("cisco-ios-01".to_string(), "cisco_ios".to_string());
    let mut device_types = HashMap::new();
    device_types.insert("cisco_ios".to_string(), cisco_device_type());
    spawn_simulator(dir.path().to_path_buf(), port, device_map, device_types);

    let mut params = base_params(port, "cisco-ios-01", vec!["show bogus"]);
    params.task_options.skip_enable = true;
    let mut engine = Engine::new(cisco_ios_profile().unwrap());
    let result = engine.run(&params, &AtomicBool::new(false));

    let cmd = &result.results[0];
    assert_eq!(cmd.error_kind, Some("DEVICE_ERROR"));
    assert!(cmd.output.to_lowercase().contains("invalid input"));
    // Per-command device errors don't flip session-level success either.
    assert!(result.success);
}

#[test]
fn s6_confirm_prompt_is_auto_answered() {
    let dir = tempfile::tempdir().unwrap();
    let port = 23106;
    write_fixture(
        dir.path(),
        "default",
        "cisco-ios-01",
        "save.txt",
        "Building configuration...\nAre you sure you want to save? [Y/N]:confirm\n",
    );
    write_fixture(
        dir.path(),
        "default",
        "cisco-ios-01",
        "y.txt",
        "Configuration saved.\n",
    );

    let mut device_map = HashMap::new();
    device_map.insert("cisco-ios-01".to_string(), "cisco_ios".to_string());
    let mut device_types = HashMap::new();
    device_types.insert("cisco_ios".to_string(), cisco_device_type());
    spawn_simulator(dir.path().to_path_buf(), port, device_map, device_types);

    let mut params = base_params(port, "cisco-ios-01", vec!["save"]);
    params.task_options.skip_enable = true;
    let mut engine = Engine::new(cisco_ios_profile().unwrap());
    let result = engine.run(&params, &AtomicBool::new(false));

    assert!(result.success, "session failed: {:?}", result.top_level_error);
    let cmd = &result.results[0];
    assert!(cmd.error_kind.is_none(), "unexpected error: {:?}", cmd.error_detail);
    assert!(cmd.output.contains("Configuration saved"));
}
