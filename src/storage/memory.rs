//! In-process buffer and document collection
//!
//! Both types share their state across clones, so a test can hand one clone
//! to a pipeline and inspect another afterwards. Both can be told to fail the
//! next few calls to stand in for an unreachable service.

use crate::error::{PipelineError, Service};
use crate::etl::{Buffer, Loader};
use crate::table::Row;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct BufferState {
    entries: HashMap<String, Vec<u8>>,
    failures_left: usize,
    offline: bool,
}

/// [`Buffer`] backed by a shared `HashMap`
#[derive(Debug, Clone, Default)]
pub struct MemoryBuffer {
    state: Arc<Mutex<BufferState>>,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls fail with a connectivity error
    pub fn fail_next(&self, count: usize) {
        lock(&self.state).failures_left = count;
    }

    /// Fail every call until set back to `false`
    pub fn set_offline(&self, offline: bool) {
        lock(&self.state).offline = offline;
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.insert_bytes(key, value.as_bytes());
    }

    /// Store a raw value, which need not be valid UTF-8
    pub fn insert_bytes(&self, key: &str, value: &[u8]) {
        lock(&self.state)
            .entries
            .insert(key.to_string(), value.to_vec());
    }

    /// The stored value as text, `None` if absent or not UTF-8
    pub fn value(&self, key: &str) -> Option<String> {
        let state = lock(&self.state);
        let bytes = state.entries.get(key)?;
        String::from_utf8(bytes.clone()).ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.state).entries.contains_key(key)
    }

    fn check_reachable(state: &mut BufferState) -> Result<(), PipelineError> {
        if state.offline {
            return Err(PipelineError::connectivity(Service::Buffer, "buffer is offline"));
        }
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(PipelineError::connectivity(
                Service::Buffer,
                "connection refused",
            ));
        }
        Ok(())
    }
}

impl Buffer for MemoryBuffer {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PipelineError> {
        let mut state = lock(&self.state);
        Self::check_reachable(&mut state)?;
        Ok(state.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), PipelineError> {
        let mut state = lock(&self.state);
        Self::check_reachable(&mut state)?;
        state.entries.insert(key.to_string(), value.into_bytes());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CollectionState {
    documents: Vec<Row>,
    insert_calls: usize,
    failures_left: usize,
    stop_after: Option<usize>,
}

/// Document collection kept in memory
///
/// Bulk inserts behave like an unordered, non-atomic bulk write: with
/// [`MemoryCollection::stop_after`] set, the first documents of a batch are
/// kept and the call reports [`PipelineError::PartialInsert`].
#[derive(Debug, Clone, Default)]
pub struct MemoryCollection {
    state: Arc<Mutex<CollectionState>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` inserts fail before writing anything
    pub fn fail_next(&self, count: usize) {
        lock(&self.state).failures_left = count;
    }

    /// Make every later insert stop after writing `count` documents
    pub fn stop_after(&self, count: usize) {
        lock(&self.state).stop_after = Some(count);
    }

    pub fn documents(&self) -> Vec<Row> {
        lock(&self.state).documents.clone()
    }

    pub fn insert_calls(&self) -> usize {
        lock(&self.state).insert_calls
    }
}

impl Loader for MemoryCollection {
    type Item = Row;

    async fn load(&self, items: Vec<Self::Item>) -> Result<usize, PipelineError> {
        let mut state = lock(&self.state);
        state.insert_calls += 1;

        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(PipelineError::connectivity(
                Service::DocumentStore,
                "server selection timed out",
            ));
        }

        let attempted = items.len();
        match state.stop_after {
            Some(limit) if limit < attempted => {
                state.documents.extend(items.into_iter().take(limit));
                Err(PipelineError::PartialInsert {
                    inserted: Some(limit),
                    attempted,
                    message: "write error".to_string(),
                })
            }
            _ => {
                state.documents.extend(items);
                Ok(attempted)
            }
        }
    }
}
