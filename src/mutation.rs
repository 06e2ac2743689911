//! Optimistic mutations with snapshot rollback.
//!
//! A mutation moves through `Idle -> Pending -> {Committed, RolledBack}`:
//!
//! 1. In-flight fetches for the key are cancelled so a slow read cannot land
//!    on top of the optimistic value.
//! 2. The current entry is captured as a snapshot.
//! 3. The optimistic value is written and is visible to every reader.
//! 4. The remote operation runs.
//! 5. Success invalidates the key so the next read resyncs with the server.
//! 6. Failure restores the snapshot, then returns the error. A panicking
//!    remote operation counts as a failure.

use futures::FutureExt;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheKey, Cacheable};
use crate::error::{QueryError, QueryResult};
use crate::query::QueryClient;

/// Lifecycle of one mutation invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MutationState {
  #[default]
  Idle,
  Pending,
  Committed,
  RolledBack,
}

/// Pre-mutation snapshot. Consumed by value, so it is used at most once.
struct MutationContext {
  key: CacheKey,
  generation: u64,
  snapshot: Option<CacheEntry>,
  previous_writer: Option<u64>,
}

impl MutationContext {
  /// Put the snapshot back unless a newer value (a settled fetch, a newer
  /// mutation or `set_query_data`) has been written since the optimistic
  /// one. Returns whether the snapshot was restored.
  fn rollback(self, client: &QueryClient) -> bool {
    let MutationContext {
      key,
      generation,
      snapshot,
      previous_writer,
    } = self;
    client.restore_unless_overwritten(&key, generation, snapshot, previous_writer)
  }
}

/// One optimistic mutation against a single cache key.
pub struct Mutation {
  client: QueryClient,
  key: CacheKey,
  state: MutationState,
}

impl Mutation {
  pub fn new(client: &QueryClient, key: CacheKey) -> Self {
    Self {
      client: client.clone(),
      key,
      state: MutationState::Idle,
    }
  }

  pub fn key(&self) -> &CacheKey {
    &self.key
  }

  pub fn state(&self) -> MutationState {
    self.state
  }

  /// Apply `optimistic_update` locally, then confirm it with `remote_op`.
  ///
  /// On failure the cache entry is restored to exactly what it was before
  /// the call, and only then is the error returned. If a newer value was
  /// written in the meantime (a fetch that succeeded, a newer mutation or
  /// `set_query_data`), nothing is restored and the result is
  /// `QueryError::Cancelled`. Fetches that failed or are still running do
  /// not prevent the rollback.
  pub async fn run<T, U, R, Fut, E>(&mut self, optimistic_update: U, remote_op: R) -> QueryResult<T>
  where
    T: Cacheable,
    U: FnOnce(Option<T>) -> T,
    R: FnOnce(T) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
  {
    self.state = MutationState::Pending;

    let claim = self.client.claim(&self.key);
    let (generation, cancelled) = (claim.generation, claim.cancelled);
    let context = MutationContext {
      key: self.key.clone(),
      generation,
      snapshot: claim.snapshot,
      previous_writer: claim.previous_writer,
    };

    let optimistic = match self.prepare(&context, optimistic_update) {
      Ok(optimistic) => optimistic,
      Err(e) => {
        self.state = MutationState::RolledBack;
        return Err(e);
      }
    };
    debug!(key = %self.key, generation, cancelled, "optimistic value written");

    let outcome = AssertUnwindSafe(async move { remote_op(optimistic).await })
      .catch_unwind()
      .await;
    let outcome = match outcome {
      Ok(Ok(confirmed)) => Ok(confirmed),
      Ok(Err(e)) => Err(QueryError::transport(e)),
      Err(_) => Err(QueryError::transport("remote operation panicked")),
    };

    match outcome {
      Ok(confirmed) => {
        self.state = MutationState::Committed;
        self.client.invalidate(&self.key);
        info!(key = %self.key, "mutation committed");
        Ok(confirmed)
      }
      Err(error) => {
        self.state = MutationState::RolledBack;
        if context.rollback(&self.client) {
          warn!(key = %self.key, error = %error, "mutation failed, rolled back");
          Err(error)
        } else {
          debug!(key = %self.key, error = %error, "mutation failed after a newer write, keeping it");
          Err(QueryError::Cancelled)
        }
      }
    }
  }

  /// Compute the optimistic value from the snapshot and write it, provided
  /// the mutation still owns the key.
  fn prepare<T, U>(&self, context: &MutationContext, optimistic_update: U) -> QueryResult<T>
  where
    T: Cacheable,
    U: FnOnce(Option<T>) -> T,
  {
    let current = match &context.snapshot {
      Some(entry) => entry.decode::<T>()?,
      None => None,
    };
    let optimistic = optimistic_update(current);
    let value = serde_json::to_value(&optimistic)?;

    if !self.client.write_if_current(&self.key, context.generation, value) {
      return Err(QueryError::Cancelled);
    }
    Ok(optimistic)
  }
}

impl QueryClient {
  /// Run a one-off optimistic mutation on `key`. See [`Mutation::run`].
  pub async fn mutate<T, U, R, Fut, E>(
    &self,
    key: &CacheKey,
    optimistic_update: U,
    remote_op: R,
  ) -> QueryResult<T>
  where
    T: Cacheable,
    U: FnOnce(Option<T>) -> T,
    R: FnOnce(T) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
  {
    Mutation::new(self, key.clone())
      .run(optimistic_update, remote_op)
      .await
  }
}
