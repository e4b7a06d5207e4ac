//! In-process `RemoteClient` for offline development and tests.
//!
//! Records are kept ordered by `(record_type, record_name)` so listings are
//! deterministic. Pages hold the smaller of the requested limit and the
//! backend's own `page_size`, with the next offset as cursor. Availability, whole-request outages, and per-record
//! write failures can be toggled at runtime; every write is recorded.

use crate::model::entity::{Entity, EntityId};
use crate::remote::client::{BackendError, RecordPage, RecordResult, RemoteClient, RemoteRecord};
use crate::remote::record::{decode, encode};
use crate::repo::RepoResult;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One write observed by the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteWrite {
    Save {
        record_type: String,
        record_name: String,
    },
    Delete {
        record_type: String,
        record_name: String,
    },
}

#[derive(Default)]
struct MemoryState {
    records: BTreeMap<(String, String), RemoteRecord>,
    record_failures: HashMap<String, BackendError>,
    outage: Option<BackendError>,
    writes: Vec<RemoteWrite>,
    pages_served: usize,
}

/// Remote backend held entirely in memory.
pub struct InMemoryRemoteClient {
    page_size: usize,
    available: AtomicBool,
    state: Mutex<MemoryState>,
}

impl InMemoryRemoteClient {
    /// Creates an available backend that serves at most `page_size` records
    /// per page. `page_size` is clamped to at least 1.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            available: AtomicBool::new(true),
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes every request fail with `err` until cleared with `None`.
    pub fn set_outage(&self, err: Option<BackendError>) {
        self.state().outage = err;
    }

    /// Makes writes of one record fail with `err`.
    pub fn fail_record(&self, id: EntityId, err: BackendError) {
        self.state().record_failures.insert(id.to_string(), err);
    }

    pub fn clear_record_failures(&self) {
        self.state().record_failures.clear();
    }

    /// Stores a raw record without recording a write.
    pub fn insert_raw(&self, record: RemoteRecord) {
        let key = (record.record_type.clone(), record.record_name.clone());
        self.state().records.insert(key, record);
    }

    /// Stores an entity as-is (timestamps untouched) without recording a write.
    pub fn seed<E: Entity>(&self, entity: &E) -> RepoResult<()> {
        self.insert_raw(encode(entity)?);
        Ok(())
    }

    /// Reads back one entity, bypassing availability checks.
    pub fn get<E: Entity>(&self, id: EntityId) -> Option<RepoResult<E>> {
        let key = (E::KIND.record_type().to_string(), id.to_string());
        let record = self.state().records.get(&key).cloned()?;
        Some(decode(&record))
    }

    pub fn record_count(&self, record_type: &str) -> usize {
        self.state()
            .records
            .keys()
            .filter(|(kind, _)| kind == record_type)
            .count()
    }

    pub fn writes(&self) -> Vec<RemoteWrite> {
        self.state().writes.clone()
    }

    pub fn save_count(&self) -> usize {
        self.state()
            .writes
            .iter()
            .filter(|write| matches!(write, RemoteWrite::Save { .. }))
            .count()
    }

    pub fn pages_served(&self) -> usize {
        self.state().pages_served
    }

    pub fn reset_counters(&self) {
        let mut state = self.state();
        state.writes.clear();
        state.pages_served = 0;
    }

    fn check_request(&self) -> Result<(), BackendError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(BackendError::NotAuthenticated);
        }
        match &self.state().outage {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryRemoteClient {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl RemoteClient for InMemoryRemoteClient {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn fetch_record(
        &self,
        record_type: &str,
        record_name: &str,
    ) -> Result<RemoteRecord, BackendError> {
        self.check_request()?;
        let key = (record_type.to_string(), record_name.to_string());
        self.state()
            .records
            .get(&key)
            .cloned()
            .ok_or(BackendError::UnknownItem)
    }

    async fn query_page(
        &self,
        record_type: &str,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<RecordPage, BackendError> {
        self.check_request()?;
        let offset = match cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| BackendError::Rejected(format!("invalid cursor `{cursor}`")))?,
            None => 0,
        };

        let mut state = self.state();
        state.pages_served += 1;
        let matching: Vec<&RemoteRecord> = state
            .records
            .iter()
            .filter(|((kind, _), _)| kind == record_type)
            .map(|(_, record)| record)
            .collect();

        let take = limit.clamp(1, self.page_size);
        let end = (offset + take).min(matching.len());
        let records: Vec<RemoteRecord> = matching
            .get(offset..end)
            .map(|slice| slice.iter().map(|record| (*record).clone()).collect())
            .unwrap_or_default();
        let next_cursor = (end < matching.len()).then(|| end.to_string());

        Ok(RecordPage {
            records,
            next_cursor,
        })
    }

    async fn save_records(
        &self,
        records: Vec<RemoteRecord>,
    ) -> Result<Vec<RecordResult>, BackendError> {
        self.check_request()?;
        let mut state = self.state();

        // Batches are atomic: one failing record rejects the whole batch.
        let failure = records.iter().find_map(|record| {
            state
                .record_failures
                .get(&record.record_name)
                .map(|err| (record.record_name.clone(), err.clone()))
        });
        if let Some((failed_name, err)) = failure {
            return Ok(records
                .iter()
                .map(|record| {
                    if record.record_name == failed_name {
                        Err(err.clone())
                    } else {
                        Err(BackendError::Other("batch aborted".to_string()))
                    }
                })
                .collect());
        }

        let mut results = Vec::with_capacity(records.len());
        for record in records {
            state.writes.push(RemoteWrite::Save {
                record_type: record.record_type.clone(),
                record_name: record.record_name.clone(),
            });
            let key = (record.record_type.clone(), record.record_name.clone());
            state.records.insert(key, record.clone());
            results.push(Ok(record));
        }
        Ok(results)
    }

    async fn delete_record(
        &self,
        record_type: &str,
        record_name: &str,
    ) -> Result<(), BackendError> {
        self.check_request()?;
        let mut state = self.state();
        let key = (record_type.to_string(), record_name.to_string());
        if state.records.remove(&key).is_none() {
            return Err(BackendError::UnknownItem);
        }
        state.writes.push(RemoteWrite::Delete {
            record_type: record_type.to_string(),
            record_name: record_name.to_string(),
        });
        Ok(())
    }
}
