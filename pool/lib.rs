#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod config;
pub mod coordinator;
pub mod error;
pub mod interrupt;
pub mod latch;
pub mod report;
pub mod work;
pub mod worker_pool;

pub use config::BrigadeConfig;
pub use coordinator::{BatchCoordinator, WaitPolicy};
pub use error::{BatchError, ConfigError, WorkError};
pub use interrupt::Interrupter;
pub use report::{BatchReport, ItemOutcome};
pub use work::{FixedDelayWork, WorkFn, WorkItem};
pub use worker_pool::WorkerPool;
