//! View-side handle over one cache key.
//!
//! A `QueryObserver<T>` subscribes to a key, knows how to load it, and
//! exposes the entry as a `QueryState<T>` for rendering. It never blocks:
//! fetches run on the runtime and results arrive through the subscription.
//!
//! # Example
//!
//! ```ignore
//! let api = api.clone();
//! let mut page = QueryObserver::new(&client, params.cache_key(), move || {
//!   let api = api.clone();
//!   let params = params.clone();
//!   async move { api.search_posts(&params).await.map_err(|e| e.to_string()) }
//! })
//! .with_placeholder(previous_posts);
//!
//! page.fetch();
//!
//! // In event loop tick
//! if page.poll() {
//!   // State changed, re-render
//! }
//!
//! match page.state() {
//!   QueryState::Loading => render_spinner(),
//!   QueryState::Success(data) => render_data(data),
//!   QueryState::Error(e) => render_error(e),
//!   QueryState::Idle => {}
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use tracing::debug;

use crate::cache::{CacheEntry, CacheKey, Cacheable, QueryStatus, Subscription};
use crate::query::{QueryClient, QueryOptions};

/// The state of a query as seen by a view.
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Nothing cached and nothing requested yet
  Idle,
  /// A fetch is running and there is no data for this key
  Loading,
  /// Data is available
  Success(T),
  /// The last fetch failed
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// A boxed future that returns a Result<T, String>
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Subscribed, self-fetching view of one cache key.
pub struct QueryObserver<T> {
  client: QueryClient,
  subscription: Subscription,
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  placeholder: Option<T>,
  options: QueryOptions,
}

impl<T: Cacheable> QueryObserver<T> {
  /// Subscribe to `key`. The fetcher is called each time a fetch starts.
  pub fn new<F, Fut>(client: &QueryClient, key: CacheKey, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    let subscription = client.store().subscribe(&key);
    let state = client
      .store()
      .get(&key)
      .map(|entry| state_from(&entry))
      .unwrap_or(QueryState::Idle);

    Self {
      client: client.clone(),
      subscription,
      state,
      fetcher: Box::new(move || Box::pin(fetcher())),
      placeholder: None,
      options: client.default_options(),
    }
  }

  /// Set the stale time used to decide whether `fetch` needs the network.
  pub fn with_stale_time(mut self, stale_time: chrono::Duration) -> Self {
    self.options = QueryOptions::with_stale_time(stale_time);
    self
  }

  /// Data to show while this key has nothing of its own, typically the
  /// previous page.
  pub fn with_placeholder(mut self, placeholder: Option<T>) -> Self {
    self.placeholder = placeholder;
    self
  }

  pub fn key(&self) -> &CacheKey {
    &self.subscription.key
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Own data if present, otherwise the placeholder while loading.
  pub fn data(&self) -> Option<&T> {
    match &self.state {
      QueryState::Success(data) => Some(data),
      QueryState::Loading | QueryState::Idle => self.placeholder.as_ref(),
      QueryState::Error(_) => None,
    }
  }

  /// True if `data()` is currently returning the placeholder.
  pub fn is_placeholder(&self) -> bool {
    !self.state.is_success() && !self.state.is_error() && self.placeholder.is_some()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Check whether the cached entry is older than the stale time or was
  /// invalidated.
  pub fn is_stale(&self) -> bool {
    self
      .client
      .store()
      .get(self.key())
      .map(|entry| entry.is_stale(self.options.stale_time))
      .unwrap_or(true)
  }

  /// Start fetching unless a fetch is running or fresh data is cached.
  pub fn fetch(&mut self) {
    if self.client.is_fetching(self.key()) {
      return;
    }
    if self.state.is_success() && !self.is_stale() {
      return;
    }
    self.start_fetch();
  }

  /// Force a refetch, cancelling any pending fetch for the key.
  pub fn refetch(&mut self) {
    self.client.cancel(self.key());
    self.start_fetch();
  }

  /// Drain pending cache notifications without blocking.
  ///
  /// Returns `true` if the state changed. Call this in the event loop tick.
  pub fn poll(&mut self) -> bool {
    let mut latest = None;
    while let Ok(entry) = self.subscription.receiver.try_recv() {
      latest = Some(entry);
    }
    match latest {
      Some(entry) => {
        self.state = state_from(&entry);
        true
      }
      None => false,
    }
  }

  /// Wait for the next cache notification and apply it.
  ///
  /// Returns `false` once the store side of the subscription is gone.
  pub async fn changed(&mut self) -> bool {
    match self.subscription.receiver.recv().await {
      Some(entry) => {
        self.state = state_from(&entry);
        self.poll();
        true
      }
      None => false,
    }
  }

  fn start_fetch(&mut self) {
    if self.state.data().is_none() {
      self.state = QueryState::Loading;
    }

    let client = self.client.clone();
    let key = self.key().clone();
    let future = (self.fetcher)();
    tokio::spawn(async move {
      if let Err(e) = client.fetch::<T, _, _, _>(&key, move || future).await {
        // Errors are delivered through the subscription as well.
        debug!(key = %key, error = %e, "observer fetch ended with error");
      }
    });
  }
}

fn state_from<T: Cacheable>(entry: &CacheEntry) -> QueryState<T> {
  match entry.status {
    QueryStatus::Error => QueryState::Error(
      entry
        .error
        .as_ref()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "unknown error".to_string()),
    ),
    QueryStatus::Fetching if entry.value.is_none() => QueryState::Loading,
    _ => match entry.decode::<T>() {
      Ok(Some(data)) => QueryState::Success(data),
      Ok(None) => QueryState::Idle,
      Err(e) => QueryState::Error(e.to_string()),
    },
  }
}

impl<T> Drop for QueryObserver<T> {
  fn drop(&mut self) {
    self
      .client
      .store()
      .unsubscribe(&self.subscription.key, self.subscription.id);
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for QueryObserver<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryObserver")
      .field("key", &self.subscription.key)
      .field("state", &self.state)
      .field("placeholder", &self.placeholder)
      .field("options", &self.options)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheStore;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  fn client() -> QueryClient {
    QueryClient::new(CacheStore::new())
  }

  #[tokio::test]
  async fn test_observer_success() {
    let client = client();
    let mut query = QueryObserver::new(&client, CacheKey::new("todos"), || async {
      Ok::<_, String>(vec![1, 2, 3])
    });

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_success());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_observer_error() {
    let client = client();
    let mut query: QueryObserver<i32> = QueryObserver::new(&client, CacheKey::new("todos"), || async {
      Err("Something went wrong".to_string())
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_error());
    assert_eq!(query.error(), Some("Something went wrong"));
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let client = client();
    let mut query = QueryObserver::new(&client, CacheKey::new("todos"), move || {
      counter.fetch_add(1, Ordering::SeqCst);
      async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok::<_, String>(42)
      }
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.fetch();

    assert!(query.is_loading());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_fresh_cache_skips_fetch() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let client = client();
    let key = CacheKey::new("todo").with(1);
    client.set_query_data(&key, &7).unwrap();

    let mut query = QueryObserver::new(&client, key, move || {
      counter.fetch_add(1, Ordering::SeqCst);
      async { Ok::<_, String>(8) }
    })
    .with_stale_time(chrono::Duration::minutes(5));

    query.fetch();

    assert_eq!(query.data(), Some(&7));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_sees_writes_from_other_handles() {
    let client = client();
    let key = CacheKey::new("todo").with(1);
    let mut query = QueryObserver::new(&client, key.clone(), || async { Ok::<_, String>(0) });

    client.set_query_data(&key, &5).unwrap();

    assert!(query.poll());
    assert_eq!(query.data(), Some(&5));
  }

  #[tokio::test]
  async fn test_placeholder_while_loading() {
    let client = client();
    let mut query = QueryObserver::new(&client, CacheKey::new("posts").with(4), || async {
      tokio::time::sleep(Duration::from_millis(20)).await;
      Ok::<_, String>(vec!["next page".to_string()])
    })
    .with_placeholder(Some(vec!["previous page".to_string()]));

    query.fetch();
    assert!(query.is_placeholder());
    assert_eq!(query.data().unwrap()[0], "previous page");

    tokio::time::sleep(Duration::from_millis(50)).await;
    query.poll();
    assert!(!query.is_placeholder());
    assert_eq!(query.data().unwrap()[0], "next page");
  }

  #[tokio::test]
  async fn test_changed_waits_for_result() {
    let client = client();
    let mut query = QueryObserver::new(&client, CacheKey::new("todos"), || async {
      tokio::time::sleep(Duration::from_millis(10)).await;
      Ok::<_, String>(1)
    });

    query.fetch();
    while !query.is_success() {
      assert!(query.changed().await);
    }
    assert_eq!(query.data(), Some(&1));
  }

  #[tokio::test]
  async fn test_refetch_cancels_pending() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();
    let client = client();

    let mut query = QueryObserver::new(&client, CacheKey::new("todos"), move || {
      let counter = counter_clone.clone();
      async move {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok::<_, String>(n)
      }
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Refetch should cancel the first and start a new one
    query.refetch();
    tokio::time::sleep(Duration::from_millis(100)).await;

    query.poll();
    // Only the second fetch should have reached the cache
    assert_eq!(query.data(), Some(&1));
  }

  #[tokio::test]
  async fn test_drop_unsubscribes() {
    let client = client();
    let key = CacheKey::new("todos");
    let query = QueryObserver::new(&client, key.clone(), || async { Ok::<_, String>(1) });
    assert_eq!(client.store().subscriber_count(&key), 1);

    drop(query);
    assert_eq!(client.store().subscriber_count(&key), 0);
  }
}
