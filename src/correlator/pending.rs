//! Table of in-flight candle requests

use super::FetchError;
use crate::market::{BarSeries, PairKey};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Completion slot handed to the receive path
pub type ResolutionSlot = oneshot::Sender<Result<BarSeries, FetchError>>;

/// One in-flight fetch
#[derive(Debug)]
pub struct PendingRequest {
    /// Request identifier echoed by the provider
    pub req_id: u64,
    /// When the request was registered
    pub issued_at: Instant,
    /// Maximum number of bars the caller asked for
    pub count: usize,
    slot: ResolutionSlot,
}

impl PendingRequest {
    pub fn new(req_id: u64, count: usize, slot: ResolutionSlot) -> Self {
        Self {
            req_id,
            issued_at: Instant::now(),
            count,
            slot,
        }
    }

    /// Deliver the outcome; a caller that already gave up is ignored
    pub fn resolve(self, outcome: Result<BarSeries, FetchError>) {
        let _ = self.slot.send(outcome);
    }
}

#[derive(Debug, Default)]
struct Entries {
    requests: HashMap<PairKey, PendingRequest>,
    closed: bool,
}

/// Pending requests keyed by pair, at most one per key
///
/// Guarded by a mutex that is never held across an await. Once closed, the
/// table refuses new registrations.
#[derive(Debug, Default)]
pub struct PendingTable {
    inner: Mutex<Entries>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a request, refusing a second one for the same key
    pub fn register(&self, key: PairKey, request: PendingRequest) -> Result<(), FetchError> {
        let mut table = self.lock();
        if table.closed {
            return Err(FetchError::Cancelled);
        }
        if table.requests.contains_key(&key) {
            return Err(FetchError::AlreadyPending(key));
        }
        table.requests.insert(key, request);
        Ok(())
    }

    /// Remove and return the entry for `key` if it matches `req_id`
    ///
    /// A response without a request id matches whatever is pending for the key.
    pub fn take(&self, key: &PairKey, req_id: Option<u64>) -> Option<PendingRequest> {
        let mut table = self.lock();
        match (table.requests.get(key), req_id) {
            (Some(pending), Some(id)) if pending.req_id != id => None,
            (Some(_), _) => table.requests.remove(key),
            (None, _) => None,
        }
    }

    /// Remove and return the entry with this request id, whatever its key
    pub fn take_by_req_id(&self, req_id: u64) -> Option<(PairKey, PendingRequest)> {
        let mut table = self.lock();
        let key = table
            .requests
            .iter()
            .find(|(_, pending)| pending.req_id == req_id)
            .map(|(key, _)| key.clone())?;
        table.requests.remove(&key).map(|pending| (key, pending))
    }

    /// Drop the entry for `key` if it still belongs to `req_id`
    pub fn remove(&self, key: &PairKey, req_id: u64) {
        let mut table = self.lock();
        if table.requests.get(key).is_some_and(|p| p.req_id == req_id) {
            table.requests.remove(key);
        }
    }

    /// Refuse further registrations and hand back every pending entry
    pub fn close(&self) -> Vec<(PairKey, PendingRequest)> {
        let mut table = self.lock();
        table.closed = true;
        table.requests.drain().collect()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().requests.is_empty()
    }
}
