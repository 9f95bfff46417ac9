//! One device's derived unit of work (§4.6/§4.7's "one job per device entry,
//! `task_id-<index>`"). Built by the dispatcher from a validated
//! `DeviceEntry`, then handed to the worker pool.

use netssh_core::engine::SessionParams;
use netssh_core::profile::PlatformProfile;

pub struct Job {
    pub job_id: String,
    pub device_ip: String,
    pub port: u16,
    pub device_name: Option<String>,
    pub device_platform: Option<String>,
    pub profile: PlatformProfile,
    pub params: SessionParams,
    pub retry_flag: u32,
}
