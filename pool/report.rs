use crate::work::WorkItem;
use ahash::{AHashMap, RandomState};
use dashmap::DashMap;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

/// What one work item produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Finished(String),
    /// The work function failed or panicked. Holds the rendered
    /// `"Failed <item>: <reason>"` text.
    Failed(String),
}

impl ItemOutcome {
    pub(crate) fn failed(item: &WorkItem, reason: impl fmt::Display) -> Self {
        Self::Failed(format!("Failed {item}: {reason}"))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Finished(text) | Self::Failed(text) => text,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Batch-private, concurrently written result map. Each key has at most one
/// writer, so shard locks are only ever briefly contended.
pub(crate) struct ReportSink {
    entries: DashMap<String, ItemOutcome, RandomState>,
}

impl ReportSink {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity_and_hasher(capacity, RandomState::new()),
        }
    }

    pub(crate) fn record(&self, item: WorkItem, outcome: ItemOutcome) {
        self.entries.insert(item.into_inner(), outcome);
    }

    /// Freezes the sink into the caller's report. Takes the map without copying
    /// when no worker still holds a handle, and clones it otherwise.
    pub(crate) fn finish(sink: Arc<Self>, batch: u64) -> BatchReport {
        let entries = match Arc::try_unwrap(sink) {
            Ok(owned) => owned.entries.into_iter().collect(),
            Err(shared) => shared
                .entries
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
        };
        BatchReport { batch, entries }
    }
}

/// The completed, immutable result of one batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    batch: u64,
    entries: AHashMap<String, ItemOutcome>,
}

impl BatchReport {
    pub(crate) fn empty(batch: u64) -> Self {
        Self {
            batch,
            entries: AHashMap::new(),
        }
    }

    /// The process-unique id this batch was logged under.
    pub fn batch_id(&self) -> u64 {
        self.batch
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, item: &str) -> bool {
        self.entries.contains_key(item)
    }

    /// The rendered result text for `item`.
    pub fn get(&self, item: &str) -> Option<&str> {
        self.entries.get(item).map(ItemOutcome::as_str)
    }

    pub fn outcome(&self, item: &str) -> Option<&ItemOutcome> {
        self.entries.get(item)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ItemOutcome)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &ItemOutcome)> {
        self.iter().filter(|(_, outcome)| outcome.is_failed())
    }

    pub fn finished_count(&self) -> usize {
        self.entries.values().filter(|o| !o.is_failed()).count()
    }

    /// Entries sorted by item identifier, for stable display.
    pub fn sorted(&self) -> Vec<(&str, &ItemOutcome)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn into_map(self) -> AHashMap<String, String> {
        self.entries
            .into_iter()
            .map(|(k, v)| {
                let text = match v {
                    ItemOutcome::Finished(text) | ItemOutcome::Failed(text) => text,
                };
                (k, text)
            })
            .collect()
    }
}

impl Index<&str> for BatchReport {
    type Output = str;

    /// Panics if `item` is not in the report.
    fn index(&self, item: &str) -> &str {
        match self.get(item) {
            Some(text) => text,
            None => panic!("no entry for work item '{item}' in batch {}", self.batch),
        }
    }
}
