//! Batch dispatcher (C7): validates a batch request, derives one job per
//! device (`<task_id>-<index>`), runs each through the worker pool (C6), and
//! aggregates into a `BatchResponse` (§4.7). Grounded on the teacher's
//! `parallel_execution.rs` per-device fan-out and `scheduler`'s request-
//! validation shape, replacing both: no connection reuse across jobs, and no
//! persisted job queue — a batch call runs to completion and returns.

use crate::error::DispatchError;
use crate::job::Job;
use crate::pool::WorkerPool;
use crate::types::{BatchCode, BatchRequest, BatchResponse, CommandOutcome, DeviceEntry, DeviceOutcome};
use netssh_core::engine::{Engine, SessionParams, TaskOptions};
use netssh_core::registry::PlatformRegistry;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

const MAX_TASK_TIMEOUT_SECS: u64 = 300;
const MAX_DEVICE_TIMEOUT_SECS: u64 = 300;
const DEFAULT_TASK_TIMEOUT_SECS: u64 = 120;

/// Session-level errors the engine's own step 1-3 failures can surface as
/// (§4.5's retry table); everything else (ENABLE_FAILED, CONFIG_MODE_FAILED,
/// per-command kinds, CANCELLED) is not retried.
const RETRYABLE_KINDS: &[&str] = &["DIAL_FAILED", "AUTH_FAILED", "CHANNEL_FAILED", "NO_PROMPT", "IO_ERROR"];

const RETRY_BASE_MS: u64 = 300;
const RETRY_FACTOR: u32 = 2;
const RETRY_CAP_MS: u64 = 2_000;
const RETRY_JITTER_MAX_MS: u64 = 50;

/// Owns the platform registry and worker pool a batch call is dispatched
/// against. Cheap to clone (both fields are already `Arc`-wrapped); share one
/// instance across concurrent callers.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<PlatformRegistry>,
    pool: Arc<WorkerPool>,
}

impl Dispatcher {
    pub fn new(registry: Arc<PlatformRegistry>, pool: Arc<WorkerPool>) -> Self {
        Self { registry, pool }
    }

    /// Validates `request`, fans it out to the pool (one job per device),
    /// and waits for every job to finish or for the batch-level
    /// `task_timeout` to elapse. A timed-out batch doesn't abort the jobs
    /// already in flight — it flips the shared cancellation flag they poll
    /// between steps, same as a per-session cancel (§5).
    #[instrument(skip(self, request), fields(task_id = %request.task_id, devices = request.devices.len()))]
    pub async fn dispatch(&self, request: BatchRequest) -> Result<BatchResponse, DispatchError> {
        validate(&request)?;

        let task_timeout = Duration::from_secs(request.task_timeout.unwrap_or(DEFAULT_TASK_TIMEOUT_SECS));
        let cancel = Arc::new(AtomicBool::new(false));

        let jobs: Vec<Job> = request
            .devices
            .iter()
            .enumerate()
            .map(|(idx, device)| self.build_job(&request.task_id, idx, device, request.retry_flag))
            .collect();

        let watchdog_cancel = cancel.clone();
        let watchdog = tokio::spawn(async move {
            tokio::time::sleep(task_timeout).await;
            watchdog_cancel.store(true, Ordering::Relaxed);
        });

        // Aggregation preserves input order by index (§5); completion order
        // across sessions in a batch is not guaranteed, so each task tags its
        // result with its slot rather than relying on join order.
        let job_count = jobs.len();
        let mut set = tokio::task::JoinSet::new();
        for (idx, job) in jobs.into_iter().enumerate() {
            let pool = self.pool.clone();
            let cancel_for_job = cancel.clone();
            let device_ip = job.device_ip.clone();
            let port = job.port;
            let device_name = job.device_name.clone();
            let device_platform = job.device_platform.clone();
            let job_id = job.job_id.clone();

            set.spawn(async move {
                let outcome = match pool.run_job(move || run_one(job, &cancel_for_job)).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(target: "Dispatcher::dispatch", job_id = %job_id, "pool rejected job: {}", e);
                        DeviceOutcome {
                            device_ip,
                            port,
                            device_name,
                            device_platform,
                            task_id: job_id,
                            success: false,
                            error: Some(e.to_string()),
                            duration_ms: 0,
                            results: Vec::new(),
                        }
                    }
                };
                (idx, outcome)
            });
        }

        let mut slots: Vec<Option<DeviceOutcome>> = (0..job_count).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, outcome)) => slots[idx] = Some(outcome),
                Err(e) => warn!(target: "Dispatcher::dispatch", "job task panicked: {}", e),
            }
        }
        watchdog.abort();
        let data: Vec<DeviceOutcome> = slots.into_iter().flatten().collect();

        let total = data.len();
        let success_count = data.iter().filter(|d| d.success).count();
        let code = if success_count == total {
            BatchCode::Success
        } else {
            BatchCode::PartialSuccess
        };
        let message = format!("{}/{} devices succeeded", success_count, total);

        info!(target: "Dispatcher::dispatch", task_id = %request.task_id, success_count, total, "batch complete");

        Ok(BatchResponse {
            code,
            message,
            total,
            data,
        })
    }

    fn build_job(&self, task_id: &str, idx: usize, device: &DeviceEntry, retry_flag: u32) -> Job {
        let profile = self.registry.resolve(device.device_platform.as_deref().unwrap_or(""));
        let port = device.device_port.unwrap_or(22);

        let params = SessionParams {
            host: device.device_ip.clone(),
            port,
            username: device.user_name.clone(),
            password: device.password.clone(),
            enable_password: device.enable_password.clone(),
            platform: profile.name.clone(),
            commands: device.cli_list.clone(),
            task_options: TaskOptions {
                enter_config_mode: device.enter_config_mode,
                skip_enable: device.skip_enable,
            },
            device_timeout: device.device_timeout.map(Duration::from_secs),
        };

        Job {
            job_id: format!("{}-{}", task_id, idx),
            device_ip: device.device_ip.clone(),
            port,
            device_name: device.device_name.clone(),
            device_platform: device.device_platform.clone(),
            profile,
            params,
            retry_flag,
        }
    }
}

/// Runs the session once, and if it fails outright (steps 1-3) with a
/// retryable kind and `job.retry_flag > 0`, retries the whole session after
/// exponential backoff with jitter (§4.5). Per-command errors never trigger a
/// retry; only a session-level `top_level_error` does.
fn run_one(job: Job, cancel: &AtomicBool) -> DeviceOutcome {
    let mut attempt: u32 = 0;
    let session = loop {
        let mut engine = Engine::new(job.profile.clone());
        let session = engine.run(&job.params, cancel);

        let should_retry = attempt < job.retry_flag
            && !cancel.load(Ordering::Relaxed)
            && is_retryable(session.top_level_error.as_deref());

        if !should_retry {
            break session;
        }

        let backoff_ms = (RETRY_BASE_MS.saturating_mul(RETRY_FACTOR.pow(attempt))).min(RETRY_CAP_MS);
        let jitter_ms = rand::thread_rng().gen_range(0..=RETRY_JITTER_MAX_MS);
        warn!(
            target: "Dispatcher::run_one",
            job_id = %job.job_id,
            attempt,
            backoff_ms,
            error = ?session.top_level_error,
            "retrying session after backoff"
        );
        std::thread::sleep(Duration::from_millis(backoff_ms + jitter_ms));
        attempt += 1;
    };

    DeviceOutcome {
        device_ip: job.device_ip,
        port: job.port,
        device_name: job.device_name,
        device_platform: job.device_platform,
        task_id: job.job_id,
        success: session.success && session.top_level_error.is_none(),
        error: session.top_level_error,
        duration_ms: session.total_duration_ms,
        results: session.results.into_iter().map(CommandOutcome::from).collect(),
    }
}

/// Whether a session's top-level failure message names a retry-eligible
/// error kind (§7's recovery column). `top_level_error` is formatted by
/// `Engine::run` as `"{display} ({kind})"`, so a substring match is enough.
fn is_retryable(top_level_error: Option<&str>) -> bool {
    top_level_error
        .map(|e| RETRYABLE_KINDS.iter().any(|k| e.contains(k)))
        .unwrap_or(false)
}

fn validate(request: &BatchRequest) -> Result<(), DispatchError> {
    if request.task_id.trim().is_empty() {
        return Err(DispatchError::MissingTaskId);
    }
    if request.devices.is_empty() {
        return Err(DispatchError::EmptyBatch);
    }
    if let Some(timeout) = request.task_timeout {
        if timeout > MAX_TASK_TIMEOUT_SECS {
            return Err(DispatchError::TaskTimeoutTooLarge {
                got: timeout,
                max: MAX_TASK_TIMEOUT_SECS,
            });
        }
    }
    for (idx, device) in request.devices.iter().enumerate() {
        if device.device_ip.trim().is_empty() {
            return Err(DispatchError::MissingHost { index: idx });
        }
        if device.user_name.trim().is_empty() {
            return Err(DispatchError::MissingUsername { index: idx });
        }
        if device.password.is_empty() {
            return Err(DispatchError::MissingPassword { index: idx });
        }
        if let Some(port) = device.device_port {
            if port == 0 {
                return Err(DispatchError::InvalidPort { index: idx, port });
            }
        }
        if device.cli_list.is_empty() {
            return Err(DispatchError::EmptyCliList { index: idx });
        }
        if let Some(timeout) = device.device_timeout {
            if timeout > MAX_DEVICE_TIMEOUT_SECS {
                return Err(DispatchError::DeviceTimeoutTooLarge {
                    got: timeout,
                    max: MAX_DEVICE_TIMEOUT_SECS,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(user: &str, clis: Vec<&str>) -> DeviceEntry {
        DeviceEntry {
            device_ip: "192.0.2.10".to_string(),
            device_port: None,
            device_name: None,
            device_platform: None,
            collect_protocol: None,
            user_name: user.to_string(),
            password: "secret".to_string(),
            enable_password: None,
            cli_list: clis.into_iter().map(String::from).collect(),
            device_timeout: None,
            enter_config_mode: false,
            skip_enable: false,
        }
    }

    #[test]
    fn rejects_empty_batch() {
        let request = BatchRequest {
            task_id: "t1".to_string(),
            task_name: None,
            retry_flag: 0,
            task_timeout: None,
            devices: vec![],
        };
        assert!(matches!(validate(&request), Err(DispatchError::EmptyBatch)));
    }

    #[test]
    fn rejects_missing_username() {
        let request = BatchRequest {
            task_id: "t1".to_string(),
            task_name: None,
            retry_flag: 0,
            task_timeout: None,
            devices: vec![device("", vec!["show version"])],
        };
        assert!(matches!(
            validate(&request),
            Err(DispatchError::MissingUsername { index: 0 })
        ));
    }

    #[test]
    fn rejects_empty_task_id() {
        let request = BatchRequest {
            task_id: "  ".to_string(),
            task_name: None,
            retry_flag: 0,
            task_timeout: None,
            devices: vec![device("admin", vec!["show version"])],
        };
        assert!(matches!(validate(&request), Err(DispatchError::MissingTaskId)));
    }

    #[test]
    fn rejects_missing_host() {
        let mut d = device("admin", vec!["show version"]);
        d.device_ip = "".to_string();
        let request = BatchRequest {
            task_id: "t1".to_string(),
            task_name: None,
            retry_flag: 0,
            task_timeout: None,
            devices: vec![d],
        };
        assert!(matches!(
            validate(&request),
            Err(DispatchError::MissingHost { index: 0 })
        ));
    }

    #[test]
    fn rejects_missing_password() {
        let mut d = device("admin", vec!["show version"]);
        d.password = "".to_string();
        let request = BatchRequest {
            task_id: "t1".to_string(),
            task_name: None,
            retry_flag: 0,
            task_timeout: None,
            devices: vec![d],
        };
        assert!(matches!(
            validate(&request),
            Err(DispatchError::MissingPassword { index: 0 })
        ));
    }

    #[test]
    fn rejects_zero_port() {
        let mut d = device("admin", vec!["show version"]);
        d.device_port = Some(0);
        let request = BatchRequest {
            task_id: "t1".to_string(),
            task_name: None,
            retry_flag: 0,
            task_timeout: None,
            devices: vec![d],
        };
        assert!(matches!(
            validate(&request),
            Err(DispatchError::InvalidPort { index: 0, port: 0 })
        ));
    }

    #[test]
    fn rejects_empty_cli_list() {
        let request = BatchRequest {
            task_id: "t1".to_string(),
            task_name: None,
            retry_flag: 0,
            task_timeout: None,
            devices: vec![device("admin", vec![])],
        };
        assert!(matches!(
            validate(&request),
            Err(DispatchError::EmptyCliList { index: 0 })
        ));
    }

    #[test]
    fn rejects_oversized_task_timeout() {
        let request = BatchRequest {
            task_id: "t1".to_string(),
            task_name: None,
            retry_flag: 0,
            task_timeout: Some(301),
            devices: vec![device("admin", vec!["show version"])],
        };
        assert!(matches!(
            validate(&request),
            Err(DispatchError::TaskTimeoutTooLarge { got: 301, max: 300 })
        ));
    }

    #[test]
    fn classifies_retryable_error_kinds() {
        assert!(is_retryable(Some("dial failed: connection refused (DIAL_FAILED)")));
        assert!(is_retryable(Some("no prompt seen (NO_PROMPT)")));
        assert!(!is_retryable(Some("enable failed (ENABLE_FAILED)")));
        assert!(!is_retryable(Some("cancelled (CANCELLED)")));
        assert!(!is_retryable(None));
    }

    #[test]
    fn accepts_a_well_formed_request() {
        let request = BatchRequest {
            task_id: "t1".to_string(),
            task_name: Some("daily check".to_string()),
            retry_flag: 0,
            task_timeout: Some(60),
            devices: vec![device("admin", vec!["show version"])],
        };
        assert!(validate(&request).is_ok());
    }
}
