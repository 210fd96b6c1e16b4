//! In-memory provider
//!
//! Serves property values and row counts from a table keyed by [`ItemPath`].
//! Useful for replaying a captured app state and for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::trace;

use apptest_common::{Error, ItemPath, PropertyEnvelope, Result};

use crate::provider::Provider;

/// Per-operation call counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub property_reads: usize,
    pub count_reads: usize,
    pub selects: usize,
    pub writes: usize,
}

#[derive(Default)]
struct MemoryState {
    values: HashMap<ItemPath, String>,
    counts: HashMap<ItemPath, VecDeque<usize>>,
    failures: HashMap<ItemPath, String>,
    delays: HashMap<ItemPath, Duration>,
    selected: Vec<ItemPath>,
    written: Vec<(ItemPath, serde_json::Value)>,
}

#[derive(Default)]
pub struct InMemoryProvider {
    state: Mutex<MemoryState>,
    delay: Option<Duration>,
    property_reads: AtomicUsize,
    count_reads: AtomicUsize,
    selects: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call only after `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer calls on `path` only after `delay`, overriding the global delay
    pub fn delay_path(&self, path: &ItemPath, delay: Duration) {
        self.state.lock().delays.insert(path.clone(), delay);
    }

    /// Store `value` as the `propertyValue` of `path`
    pub fn set_value(&self, path: &ItemPath, value: impl Into<String>) {
        let reply = serde_json::to_string(&PropertyEnvelope::new(value))
            .unwrap_or_else(|_| "{}".to_string());
        self.set_raw(path, reply);
    }

    /// Store a raw JSON reply for `path`
    pub fn set_raw(&self, path: &ItemPath, reply: impl Into<String>) {
        self.state.lock().values.insert(path.clone(), reply.into());
    }

    /// Script successive row counts for an unindexed table path.
    /// The last count repeats once the script runs out.
    pub fn push_counts(&self, path: &ItemPath, counts: impl IntoIterator<Item = usize>) {
        self.state
            .lock()
            .counts
            .entry(path.without_index())
            .or_default()
            .extend(counts);
    }

    /// Make every operation on `path` fail with a transport error
    pub fn fail_with(&self, path: &ItemPath, message: impl Into<String>) {
        self.state.lock().failures.insert(path.clone(), message.into());
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            property_reads: self.property_reads.load(Ordering::SeqCst),
            count_reads: self.count_reads.load(Ordering::SeqCst),
            selects: self.selects.load(Ordering::SeqCst),
            writes: self.writes.load(Ordering::SeqCst),
        }
    }

    pub fn selected(&self) -> Vec<ItemPath> {
        self.state.lock().selected.clone()
    }

    pub fn written(&self) -> Vec<(ItemPath, serde_json::Value)> {
        self.state.lock().written.clone()
    }

    async fn pause(&self, path: &ItemPath) {
        let delay = self.state.lock().delays.get(path).copied().or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_failure(&self, path: &ItemPath) -> Result<()> {
        match self.state.lock().failures.get(path) {
            Some(message) => Err(Error::Transport(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Provider for InMemoryProvider {
    async fn get_property_value(&self, path: &ItemPath) -> Result<Option<String>> {
        self.property_reads.fetch_add(1, Ordering::SeqCst);
        self.pause(path).await;
        self.check_failure(path)?;

        trace!("memory read {}", path);
        Ok(self.state.lock().values.get(path).cloned())
    }

    async fn get_item_count(&self, path: &ItemPath) -> Result<usize> {
        self.count_reads.fetch_add(1, Ordering::SeqCst);
        self.pause(path).await;
        self.check_failure(path)?;

        let mut state = self.state.lock();
        let count = match state.counts.get_mut(&path.without_index()) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().copied().unwrap_or_default(),
            None => 0,
        };
        Ok(count)
    }

    async fn select_control(&self, path: &ItemPath) -> Result<bool> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        self.pause(path).await;
        self.check_failure(path)?;

        self.state.lock().selected.push(path.clone());
        Ok(true)
    }

    async fn set_property(&self, path: &ItemPath, value: serde_json::Value) -> Result<bool> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.pause(path).await;
        self.check_failure(path)?;

        let envelope = PropertyEnvelope {
            property_value: Some(match &value {
                serde_json::Value::String(_) | serde_json::Value::Null => value.clone(),
                other => serde_json::Value::String(other.to_string()),
            }),
        };

        let mut state = self.state.lock();
        state.values.insert(path.clone(), envelope.to_json()?);
        state.written.push((path.clone(), value));
        Ok(true)
    }
}
