//! Startup configuration: pool capacity, the coordinator's default wait, and
//! the placeholder work delay. Every field has a default, so an empty file (or
//! no file) is a valid configuration.

use crate::error::ConfigError;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct BrigadeConfig {
    pub pool: PoolConfig,
    pub coordinator: CoordinatorConfig,
    pub work: WorkConfig,
}

/// Capacity of the shared pool.
///
/// `max_size` mirrors the core/max split of classic executors. With an
/// unbounded queue the pool never grows past `core_size`, so a larger
/// `max_size` is accepted but has no effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    pub core_size: usize,
    pub max_size: usize,
    pub thread_name_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Default wait for `process`, in milliseconds. Zero waits forever.
    pub wait_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkConfig {
    pub delay_ms: u64,
}

impl PoolConfig {
    pub const DEFAULT_CAPACITY: usize = 10;
    pub const DEFAULT_THREAD_PREFIX: &'static str = "brigade-cook-";

    /// A pool of exactly `size` workers.
    pub fn fixed(size: usize) -> Self {
        Self {
            core_size: size,
            max_size: size,
            ..Self::default()
        }
    }

    /// One worker per logical CPU.
    pub fn per_cpu() -> Self {
        Self::fixed(num_cpus::get().max(1))
    }

    pub fn capacity(&self) -> usize {
        self.core_size
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core_size == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.max_size < self.core_size {
            return Err(ConfigError::MaxBelowCore {
                core: self.core_size,
                max: self.max_size,
            });
        }
        if self.max_size > self.core_size {
            warn!(
                "Pool max_size ({}) exceeds core_size ({}); the queue is unbounded, so the pool stays at {} workers.",
                self.max_size, self.core_size, self.core_size
            );
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            core_size: Self::DEFAULT_CAPACITY,
            max_size: Self::DEFAULT_CAPACITY,
            thread_name_prefix: Self::DEFAULT_THREAD_PREFIX.to_string(),
        }
    }
}

impl CoordinatorConfig {
    pub fn wait_timeout(&self) -> Option<Duration> {
        (self.wait_timeout_ms > 0).then(|| Duration::from_millis(self.wait_timeout_ms))
    }
}

impl WorkConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self { delay_ms: 1000 }
    }
}

impl BrigadeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pool.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_the_reference_kitchen() {
        let config = BrigadeConfig::default();
        assert_eq!(config.pool.capacity(), 10);
        assert_eq!(config.pool.max_size, 10);
        assert_eq!(config.work.delay(), Duration::from_millis(1000));
        assert_eq!(config.coordinator.wait_timeout(), None);
    }

    #[test]
    fn empty_document_is_the_default() {
        assert_eq!(BrigadeConfig::from_toml_str("").unwrap(), BrigadeConfig::default());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = BrigadeConfig::from_toml_str(
            "[pool]\ncore_size = 5\nmax_size = 5\n\n[coordinator]\nwait_timeout_ms = 250\n",
        )
        .unwrap();
        assert_eq!(config.pool.capacity(), 5);
        assert_eq!(config.pool.thread_name_prefix, "brigade-cook-");
        assert_eq!(
            config.coordinator.wait_timeout(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(config.work.delay_ms, 1000);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = BrigadeConfig::from_toml_str("[pool]\ncore_size = 0\nmax_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroCapacity));
    }

    #[test]
    fn max_below_core_is_rejected() {
        let err = BrigadeConfig::from_toml_str("[pool]\ncore_size = 8\nmax_size = 4\n").unwrap_err();
        assert!(matches!(err, ConfigError::MaxBelowCore { core: 8, max: 4 }));
    }

    #[test]
    fn max_above_core_is_accepted_without_growing() {
        let config =
            BrigadeConfig::from_toml_str("[pool]\ncore_size = 2\nmax_size = 6\n").unwrap();
        assert_eq!(config.pool.capacity(), 2);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = BrigadeConfig::from_toml_str("[pool]\nqueue_capacity = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file_and_survives_a_round_trip() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[pool]\ncore_size = 3\nmax_size = 3\nthread_name_prefix = \"cook-\"").unwrap();
        writeln!(file, "[work]\ndelay_ms = 15").unwrap();

        let config = BrigadeConfig::load(file.path()).unwrap();
        assert_eq!(config.pool, PoolConfig {
            core_size: 3,
            max_size: 3,
            thread_name_prefix: "cook-".to_string(),
        });
        assert_eq!(config.work.delay(), Duration::from_millis(15));

        let text = config.to_toml_string().unwrap();
        assert_eq!(BrigadeConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn missing_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        match BrigadeConfig::load(&path) {
            Err(ConfigError::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }

    #[test]
    fn per_cpu_pool_is_never_empty() {
        let config = PoolConfig::per_cpu();
        assert!(config.capacity() >= 1);
        assert!(config.validate().is_ok());
    }
}
