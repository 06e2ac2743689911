//! Query executor: keyed, deduplicated data fetching on top of `CacheStore`.
//!
//! Inspired by TanStack Query. A `QueryClient` owns the in-flight request
//! table and a per-key generation:
//!
//! - Concurrent `fetch` calls for one key share a single loader execution.
//! - Every new fetch, `cancel` and mutation gives the key a new generation,
//!   drawn from one client-wide counter so numbers are never reused. A
//!   loader whose generation is no longer current has its result discarded
//!   and its callers receive `QueryError::Cancelled`.
//! - The generation that last wrote a value is remembered per key, so a
//!   failed mutation can tell whether anything newer reached the cache.
//! - Cancellation is cooperative: the loader keeps running, its result just
//!   never reaches the cache.
//!
//! # Example
//!
//! ```ignore
//! let client = QueryClient::new(CacheStore::new());
//! let api = api.clone();
//! let todo: Todo = client
//!   .fetch(&query_key!["todo", 1], move || async move { api.get_todo(1).await })
//!   .await?;
//! ```

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

use crate::cache::{CacheEntry, CacheKey, CacheResult, CacheStore, Cacheable};
use crate::error::{QueryError, QueryResult};

type SharedOutcome = Shared<BoxFuture<'static, QueryResult<Value>>>;

struct InFlight {
  generation: u64,
  outcome: SharedOutcome,
}

#[derive(Default)]
struct ExecutorState {
  in_flight: HashMap<CacheKey, InFlight>,
  generations: HashMap<CacheKey, u64>,
  /// Generation whose value is currently cached, per key
  writers: HashMap<CacheKey, u64>,
  last_generation: u64,
}

impl ExecutorState {
  fn next_generation(&mut self) -> u64 {
    self.last_generation += 1;
    self.last_generation
  }

  fn bump(&mut self, key: &CacheKey) -> u64 {
    let generation = self.next_generation();
    self.generations.insert(key.clone(), generation);
    generation
  }

  /// Zero for keys with no recorded generation; never issued.
  fn generation(&self, key: &CacheKey) -> u64 {
    self.generations.get(key).copied().unwrap_or(0)
  }

  fn forget(&mut self, key: &CacheKey) {
    if !self.in_flight.contains_key(key) {
      self.generations.remove(key);
      self.writers.remove(key);
    }
  }
}

/// What a mutation takes over when it claims a key.
pub(crate) struct Claim {
  pub generation: u64,
  pub cancelled: bool,
  pub snapshot: Option<CacheEntry>,
  pub previous_writer: Option<u64>,
}

fn lock(state: &Mutex<ExecutorState>) -> MutexGuard<'_, ExecutorState> {
  state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-query freshness options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
  /// How long fetched data is served from cache without refetching
  pub stale_time: chrono::Duration,
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self {
      stale_time: chrono::Duration::zero(),
    }
  }
}

impl QueryOptions {
  pub fn with_stale_time(stale_time: chrono::Duration) -> Self {
    Self { stale_time }
  }
}

/// Handle to the query cache. Cloning shares the same store and executor.
#[derive(Clone)]
pub struct QueryClient {
  store: CacheStore,
  state: Arc<Mutex<ExecutorState>>,
  defaults: QueryOptions,
  gc_time: chrono::Duration,
}

impl QueryClient {
  pub fn new(store: CacheStore) -> Self {
    Self {
      store,
      state: Arc::default(),
      defaults: QueryOptions::default(),
      gc_time: chrono::Duration::minutes(5),
    }
  }

  /// Set the options used by `query`.
  pub fn with_default_options(mut self, options: QueryOptions) -> Self {
    self.defaults = options;
    self
  }

  /// Set how long unwatched entries survive `collect_garbage`.
  pub fn with_gc_time(mut self, gc_time: chrono::Duration) -> Self {
    self.gc_time = gc_time;
    self
  }

  pub fn store(&self) -> &CacheStore {
    &self.store
  }

  pub fn default_options(&self) -> QueryOptions {
    self.defaults
  }

  fn state(&self) -> MutexGuard<'_, ExecutorState> {
    lock(&self.state)
  }

  /// Fetch `key` with `loader`, joining an in-flight request if one exists.
  ///
  /// On success the value is written to the cache; on failure the error is
  /// recorded on the entry and returned to every joined caller. Results of
  /// superseded requests are dropped and reported as `Cancelled`.
  pub async fn fetch<T, F, Fut, E>(&self, key: &CacheKey, loader: F) -> QueryResult<T>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Display + Send + 'static,
  {
    let outcome = self.join_or_start(key, loader);
    let value = outcome.await?;
    Ok(serde_json::from_value(value)?)
  }

  fn join_or_start<T, F, Fut, E>(&self, key: &CacheKey, loader: F) -> SharedOutcome
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Display + Send + 'static,
  {
    let mut state = self.state();
    if let Some(flight) = state.in_flight.get(key) {
      trace!(key = %key, generation = flight.generation, "joining in-flight fetch");
      return flight.outcome.clone();
    }

    let generation = state.bump(key);
    self.store.set_fetching(key);
    debug!(key = %key, generation, "fetch started");

    let task = tokio::spawn(settle(
      self.store.clone(),
      Arc::clone(&self.state),
      key.clone(),
      generation,
      loader(),
    ));
    let outcome = async move {
      match task.await {
        Ok(result) => result,
        // Only reachable when the runtime shuts down under the task
        Err(_) => Err(QueryError::Cancelled),
      }
    }
    .boxed()
    .shared();

    state.in_flight.insert(
      key.clone(),
      InFlight {
        generation,
        outcome: outcome.clone(),
      },
    );
    outcome
  }

  /// Cancel the in-flight fetch for `key`, if any.
  ///
  /// Returns true if a request was in flight. Either way the key's
  /// generation moves forward, so any older result is discarded.
  pub fn cancel(&self, key: &CacheKey) -> bool {
    self.supersede(key).1
  }

  /// Bump the generation for `key`, dropping its in-flight request.
  /// Returns the new generation and whether a request was cancelled.
  fn supersede(&self, key: &CacheKey) -> (u64, bool) {
    let mut state = self.state();
    self.supersede_locked(&mut state, key)
  }

  fn supersede_locked(&self, state: &mut ExecutorState, key: &CacheKey) -> (u64, bool) {
    let generation = state.bump(key);
    let cancelled = state.in_flight.remove(key).is_some();
    if cancelled {
      self.store.reset_fetching(key);
      debug!(key = %key, generation, "in-flight fetch cancelled");
    }
    (generation, cancelled)
  }

  /// Supersede `key` and capture its entry and writer, atomically.
  pub(crate) fn claim(&self, key: &CacheKey) -> Claim {
    let mut state = self.state();
    let (generation, cancelled) = self.supersede_locked(&mut state, key);
    Claim {
      generation,
      cancelled,
      snapshot: self.store.get(key),
      previous_writer: state.writers.get(key).copied(),
    }
  }

  /// Write `value` only if `generation` is still current for `key`.
  pub(crate) fn write_if_current(&self, key: &CacheKey, generation: u64, value: Value) -> bool {
    let mut state = self.state();
    if state.generation(key) != generation {
      return false;
    }
    self.store.set(key, value);
    state.writers.insert(key.clone(), generation);
    true
  }

  /// Put `snapshot` back unless a value newer than the one written by
  /// `generation` has reached the cache. Failed or pending fetches do not
  /// count as newer values.
  pub(crate) fn restore_unless_overwritten(
    &self,
    key: &CacheKey,
    generation: u64,
    snapshot: Option<CacheEntry>,
    previous_writer: Option<u64>,
  ) -> bool {
    let mut state = self.state();
    if let Some(&writer) = state.writers.get(key) {
      if writer != generation {
        return false;
      }
    }
    self.store.restore(key, snapshot);
    match previous_writer {
      Some(writer) => state.writers.insert(key.clone(), writer),
      None => state.writers.remove(key),
    };
    true
  }

  /// Whether a fetch is in flight for `key`.
  pub fn is_fetching(&self, key: &CacheKey) -> bool {
    self.state().in_flight.contains_key(key)
  }

  /// Cache-first read using the client's default options.
  pub async fn query<T, F, Fut, E>(&self, key: &CacheKey, loader: F) -> QueryResult<CacheResult<T>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Display + Send + 'static,
  {
    self.query_with(key, self.defaults, loader).await
  }

  /// Cache-first read.
  ///
  /// 1. If the entry holds data that is not stale, return it
  /// 2. Otherwise fetch (joining any in-flight request)
  /// 3. If the fetch fails and stale data exists, return it as offline data
  pub async fn query_with<T, F, Fut, E>(
    &self,
    key: &CacheKey,
    options: QueryOptions,
    loader: F,
  ) -> QueryResult<CacheResult<T>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Display + Send + 'static,
  {
    let cached = self.store.get(key);
    if let Some(entry) = &cached {
      if !entry.is_stale(options.stale_time) {
        if let Some(data) = entry.decode::<T>()? {
          trace!(key = %key, "serving fresh cache");
          return Ok(CacheResult::from_cache(data, entry.last_updated));
        }
      }
    }

    match self.fetch(key, loader).await {
      Ok(data) => Ok(CacheResult::from_network(data)),
      Err(QueryError::Transport(message)) => {
        let stale = cached.as_ref().map(|e| e.decode::<T>()).transpose()?.flatten();
        match (stale, cached) {
          (Some(data), Some(entry)) => {
            warn!(key = %key, error = %message, "refetch failed, serving stale cache");
            Ok(CacheResult::offline(data, entry.last_updated))
          }
          _ => Err(QueryError::Transport(message)),
        }
      }
      Err(e) => Err(e),
    }
  }

  /// Run one cache-first read per key in parallel. Each key succeeds or
  /// fails on its own.
  pub async fn query_all<T, F, Fut, E>(
    &self,
    keys: &[CacheKey],
    options: QueryOptions,
    loader: F,
  ) -> Vec<QueryResult<CacheResult<T>>>
  where
    T: Cacheable,
    F: Fn(&CacheKey) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Display + Send + 'static,
  {
    let reads = keys
      .iter()
      .map(|key| self.query_with(key, options, || loader(key)));
    join_all(reads).await
  }

  /// Write `data` straight into the cache for `key`.
  pub fn set_query_data<T: Serialize>(&self, key: &CacheKey, data: &T) -> QueryResult<()> {
    let value = serde_json::to_value(data)?;
    let mut state = self.state();
    let writer = state.next_generation();
    self.store.set(key, value);
    state.writers.insert(key.clone(), writer);
    Ok(())
  }

  /// Read the cached value for `key`, if any.
  pub fn get_query_data<T: Cacheable>(&self, key: &CacheKey) -> QueryResult<Option<T>> {
    match self.store.get(key) {
      Some(entry) => entry.decode(),
      None => Ok(None),
    }
  }

  pub fn invalidate(&self, key: &CacheKey) -> bool {
    self.store.invalidate(key)
  }

  pub fn invalidate_prefix(&self, prefix: &CacheKey) -> usize {
    self.store.invalidate_prefix(prefix)
  }

  /// Evict unwatched entries older than the configured gc time.
  pub fn collect_garbage(&self) -> usize {
    let mut state = self.state();
    let evicted = self.store.collect_garbage_keys(self.gc_time);
    for key in &evicted {
      state.forget(key);
    }
    evicted.len()
  }

  #[cfg(test)]
  fn tracked_keys(&self) -> usize {
    let state = self.state();
    state.generations.len().max(state.writers.len())
  }
}

/// Drive a loader to completion and write its outcome if still current.
async fn settle<T, Fut, E>(
  store: CacheStore,
  state: Arc<Mutex<ExecutorState>>,
  key: CacheKey,
  generation: u64,
  loader: Fut,
) -> QueryResult<Value>
where
  T: Serialize,
  Fut: Future<Output = Result<T, E>>,
  E: Display,
{
  let result = match AssertUnwindSafe(loader).catch_unwind().await {
    Ok(Ok(data)) => serde_json::to_value(&data).map_err(QueryError::from),
    Ok(Err(e)) => Err(QueryError::transport(e)),
    Err(_) => Err(QueryError::transport("loader panicked")),
  };

  let mut state = lock(&state);
  if state.generation(&key) != generation {
    debug!(key = %key, generation, "discarding superseded fetch result");
    return Err(QueryError::Cancelled);
  }
  state.in_flight.remove(&key);

  match &result {
    Ok(value) => {
      store.set(&key, value.clone());
      state.writers.insert(key.clone(), generation);
    }
    Err(e) => {
      warn!(key = %key, error = %e, "fetch failed");
      store.set_error(&key, e.clone());
    }
  }
  result
}
