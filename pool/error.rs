use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single `process` call, surfaced synchronously to its caller.
///
/// Neither variant carries a partial report. Tasks that were already handed to
/// the pool keep running and write into a report nobody will read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("Batch {batch} was interrupted while waiting for {remaining} of {total} items.")]
    Interrupted {
        batch: u64,
        remaining: usize,
        total: usize,
    },
    #[error(
        "Batch {batch} timed out after {timeout:?} with {remaining} of {total} items still outstanding."
    )]
    Timeout {
        batch: u64,
        timeout: Duration,
        remaining: usize,
        total: usize,
    },
}

/// Error raised by a work function for one item. It never escapes the worker:
/// the coordinator records it as that item's outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkError {
    #[error("work was interrupted")]
    Interrupted,
    #[error("{0}")]
    Failed(String),
}

/// Errors from loading configuration or bringing the pool up.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Pool capacity must be at least 1, but core_size was 0.")]
    ZeroCapacity,
    #[error("Pool max_size ({max}) must not be smaller than core_size ({core}).")]
    MaxBelowCore { core: usize, max: usize },
    #[error("Failed to spawn worker thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
