//! In-memory cache store with per-key subscribers.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::key::CacheKey;
use crate::error::{QueryError, QueryResult};

/// Fetch status of a cache entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryStatus {
  #[default]
  Idle,
  Fetching,
  Error,
}

/// A single cached value plus its metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheEntry {
  pub value: Option<Value>,
  pub status: QueryStatus,
  /// Last loader error, cleared on the next successful write
  pub error: Option<QueryError>,
  pub last_updated: Option<DateTime<Utc>>,
  /// Set by `invalidate`, cleared by `set`
  pub invalidated: bool,
}

impl CacheEntry {
  /// Stale once invalidated, never written, or older than `stale_time`.
  pub fn is_stale(&self, stale_time: chrono::Duration) -> bool {
    if self.invalidated {
      return true;
    }
    self
      .last_updated
      .map(|t| Utc::now() - t > stale_time)
      .unwrap_or(true)
  }

  /// Decode the cached value into `T`.
  pub fn decode<T: DeserializeOwned>(&self) -> QueryResult<Option<T>> {
    match &self.value {
      Some(value) => Ok(Some(T::deserialize(value)?)),
      None => Ok(None),
    }
  }
}

/// Identifies one subscription on one key.
pub type SubscriptionId = u64;

/// Receiving side of a key subscription.
///
/// Every write to the key delivers the resulting entry. Dropping the
/// receiver is enough to stop delivery; `CacheStore::unsubscribe` removes it
/// eagerly.
#[derive(Debug)]
pub struct Subscription {
  pub id: SubscriptionId,
  pub key: CacheKey,
  pub receiver: mpsc::UnboundedReceiver<CacheEntry>,
}

#[derive(Default)]
struct Slot {
  entry: Option<CacheEntry>,
  subscribers: Vec<(SubscriptionId, mpsc::UnboundedSender<CacheEntry>)>,
  touched: Option<DateTime<Utc>>,
}

impl Slot {
  /// Push the current entry to every live subscriber, dropping closed ones.
  fn notify(&mut self) {
    let entry = self.entry.clone().unwrap_or_default();
    self
      .subscribers
      .retain(|(_, tx)| tx.send(entry.clone()).is_ok());
  }

  fn entry_mut(&mut self) -> &mut CacheEntry {
    self.touched = Some(Utc::now());
    self.entry.get_or_insert_with(CacheEntry::default)
  }
}

/// Keyed in-memory cache store.
///
/// Cloning yields another handle to the same store.
#[derive(Clone, Default)]
pub struct CacheStore {
  slots: Arc<Mutex<HashMap<CacheKey, Slot>>>,
  next_subscription: Arc<AtomicU64>,
}

impl CacheStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn slots(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
    self.slots.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
    self.slots().get(key).and_then(|slot| slot.entry.clone())
  }

  /// Overwrite the value for `key`, mark it idle and fresh, and notify
  /// subscribers before returning.
  pub fn set(&self, key: &CacheKey, value: Value) {
    let mut slots = self.slots();
    let slot = slots.entry(key.clone()).or_default();
    let entry = slot.entry_mut();
    entry.value = Some(value);
    entry.status = QueryStatus::Idle;
    entry.error = None;
    entry.last_updated = Some(Utc::now());
    entry.invalidated = false;
    trace!(key = %key, "cache set");
    slot.notify();
  }

  /// Mark the entry stale. Returns false (and notifies nobody) if the entry
  /// is absent or already stale.
  pub fn invalidate(&self, key: &CacheKey) -> bool {
    let mut slots = self.slots();
    let Some(slot) = slots.get_mut(key) else {
      return false;
    };
    match slot.entry.as_mut() {
      Some(entry) if !entry.invalidated => {
        entry.invalidated = true;
        debug!(key = %key, "cache invalidated");
        slot.notify();
        true
      }
      _ => false,
    }
  }

  /// Invalidate every entry whose key starts with `prefix`.
  pub fn invalidate_prefix(&self, prefix: &CacheKey) -> usize {
    let mut slots = self.slots();
    let mut count = 0;
    for (key, slot) in slots.iter_mut() {
      if !key.starts_with(prefix) {
        continue;
      }
      if let Some(entry) = slot.entry.as_mut() {
        if !entry.invalidated {
          entry.invalidated = true;
          slot.notify();
          count += 1;
        }
      }
    }
    debug!(prefix = %prefix, count, "cache prefix invalidated");
    count
  }

  pub(crate) fn set_fetching(&self, key: &CacheKey) {
    let mut slots = self.slots();
    let slot = slots.entry(key.clone()).or_default();
    slot.entry_mut().status = QueryStatus::Fetching;
    slot.notify();
  }

  pub(crate) fn set_error(&self, key: &CacheKey, error: QueryError) {
    let mut slots = self.slots();
    let slot = slots.entry(key.clone()).or_default();
    let entry = slot.entry_mut();
    entry.status = QueryStatus::Error;
    entry.error = Some(error);
    slot.notify();
  }

  /// Revert a `Fetching` status left behind by a cancelled request.
  pub(crate) fn reset_fetching(&self, key: &CacheKey) {
    let mut slots = self.slots();
    if let Some(slot) = slots.get_mut(key) {
      if let Some(entry) = slot.entry.as_mut() {
        if entry.status == QueryStatus::Fetching {
          entry.status = if entry.error.is_some() {
            QueryStatus::Error
          } else {
            QueryStatus::Idle
          };
          slot.notify();
        }
      }
    }
  }

  /// Replace the entry with an exact snapshot. `None` restores absence.
  pub(crate) fn restore(&self, key: &CacheKey, snapshot: Option<CacheEntry>) {
    let mut slots = self.slots();
    let slot = slots.entry(key.clone()).or_default();
    slot.entry = snapshot;
    slot.touched = Some(Utc::now());
    debug!(key = %key, "cache restored from snapshot");
    slot.notify();
  }

  /// Drop the entry for `key`. Subscribers stay registered.
  pub fn remove(&self, key: &CacheKey) -> Option<CacheEntry> {
    let mut slots = self.slots();
    let slot = slots.get_mut(key)?;
    let removed = slot.entry.take();
    if removed.is_some() {
      slot.notify();
    }
    if slot.subscribers.is_empty() {
      slots.remove(key);
    }
    removed
  }

  pub fn subscribe(&self, key: &CacheKey) -> Subscription {
    let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = mpsc::unbounded_channel();
    let mut slots = self.slots();
    let slot = slots.entry(key.clone()).or_default();
    slot.subscribers.push((id, tx));
    trace!(key = %key, id, "subscribed");
    Subscription {
      id,
      key: key.clone(),
      receiver: rx,
    }
  }

  pub fn unsubscribe(&self, key: &CacheKey, id: SubscriptionId) -> bool {
    let mut slots = self.slots();
    let Some(slot) = slots.get_mut(key) else {
      return false;
    };
    let before = slot.subscribers.len();
    slot.subscribers.retain(|(sid, _)| *sid != id);
    let removed = slot.subscribers.len() != before;
    if slot.entry.is_none() && slot.subscribers.is_empty() {
      slots.remove(key);
    }
    removed
  }

  /// Number of live subscribers on `key`.
  pub fn subscriber_count(&self, key: &CacheKey) -> usize {
    self
      .slots()
      .get(key)
      .map(|slot| slot.subscribers.iter().filter(|(_, tx)| !tx.is_closed()).count())
      .unwrap_or(0)
  }

  /// Evict entries nobody watches that are not fetching and were last
  /// touched more than `gc_time` ago. Returns the number of evicted keys.
  pub fn collect_garbage(&self, gc_time: chrono::Duration) -> usize {
    self.collect_garbage_keys(gc_time).len()
  }

  /// Like `collect_garbage`, returning the evicted keys.
  pub(crate) fn collect_garbage_keys(&self, gc_time: chrono::Duration) -> Vec<CacheKey> {
    let now = Utc::now();
    let mut slots = self.slots();
    let mut evicted = Vec::new();
    slots.retain(|key, slot| {
      slot.subscribers.retain(|(_, tx)| !tx.is_closed());
      if !slot.subscribers.is_empty() {
        return true;
      }
      let fetching = slot
        .entry
        .as_ref()
        .is_some_and(|e| e.status == QueryStatus::Fetching);
      let expired = slot.touched.map(|t| now - t > gc_time).unwrap_or(true);
      let keep = fetching || !expired;
      if !keep {
        evicted.push(key.clone());
      }
      keep
    });
    if !evicted.is_empty() {
      debug!(evicted = evicted.len(), "cache garbage collected");
    }
    evicted
  }

  /// Number of keys holding an entry.
  pub fn len(&self) -> usize {
    self
      .slots()
      .values()
      .filter(|slot| slot.entry.is_some())
      .count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
