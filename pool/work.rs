//! Work items and the swappable unit of work run for each of them.

use crate::error::WorkError;
use crate::interrupt::Interrupter;
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Opaque identifier naming one unit of work inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkItem(String);

impl WorkItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<&str> for WorkItem {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for WorkItem {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&String> for WorkItem {
    fn from(id: &String) -> Self {
        Self(id.clone())
    }
}

impl AsRef<str> for WorkItem {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for WorkItem {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The per-item business logic run on a pool worker.
///
/// The returned text becomes the item's entry in the batch report. Any
/// `Fn(&WorkItem) -> Result<String, WorkError>` closure qualifies.
pub trait WorkFn: Send + Sync + 'static {
    fn perform(&self, item: &WorkItem) -> Result<String, WorkError>;
}

impl<F> WorkFn for F
where
    F: Fn(&WorkItem) -> Result<String, WorkError> + Send + Sync + 'static,
{
    fn perform(&self, item: &WorkItem) -> Result<String, WorkError> {
        self(item)
    }
}

/// The result text for a successfully processed item.
pub fn finished(item: &WorkItem) -> String {
    format!("Finished {item}")
}

/// Placeholder work: holds its worker for a fixed delay, then reports the item
/// finished.
#[derive(Debug, Clone)]
pub struct FixedDelayWork {
    delay: Duration,
    interrupter: Option<Arc<Interrupter>>,
}

impl FixedDelayWork {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            interrupter: None,
        }
    }

    /// Like [`FixedDelayWork::new`], but the delay is cut short with
    /// [`WorkError::Interrupted`] once `interrupter` fires.
    pub fn interruptible(delay: Duration, interrupter: Arc<Interrupter>) -> Self {
        Self {
            delay,
            interrupter: Some(interrupter),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for FixedDelayWork {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}

impl WorkFn for FixedDelayWork {
    fn perform(&self, item: &WorkItem) -> Result<String, WorkError> {
        match &self.interrupter {
            Some(interrupter) => interrupter.sleep(self.delay)?,
            None => thread::sleep(self.delay),
        }
        Ok(finished(item))
    }
}
