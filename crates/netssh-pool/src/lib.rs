pub mod dispatcher;
pub mod error;
pub mod job;
pub mod pool;
pub mod types;

pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use job::Job;
pub use pool::{WorkerPool, DEFAULT_WORKERS};
pub use types::{
    BatchCode, BatchRequest, BatchResponse, CommandOutcome, DeviceEntry, DeviceOutcome,
};
