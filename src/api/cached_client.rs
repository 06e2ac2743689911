//! API client with transparent query caching.

use color_eyre::eyre::eyre;
use tracing::{debug, info};

use crate::cache::{CacheKey, CacheResult, CacheStore};
use crate::config::{CacheConfig, Config};
use crate::error::QueryResult;
use crate::observer::QueryObserver;
use crate::pagination::PageParams;
use crate::query::{QueryClient, QueryOptions};

use super::cache::ResourceKey;
use super::client::ApiClient;
use super::types::{PostsPage, Todo, User};

/// API client backed by a shared [`QueryClient`].
///
/// Reads go through the cache with per-resource stale times; the todo
/// toggle is an optimistic mutation.
#[derive(Clone)]
pub struct CachedApi {
  inner: ApiClient,
  client: QueryClient,
  cache: CacheConfig,
}

impl CachedApi {
  pub fn new(config: &Config) -> color_eyre::Result<Self> {
    let inner = ApiClient::new(&config.api)?;
    let client = QueryClient::new(CacheStore::new())
      .with_default_options(QueryOptions::with_stale_time(config.cache.stale_time()))
      .with_gc_time(config.cache.gc_time());

    Ok(Self::with_client(inner, client, config.cache.clone()))
  }

  pub fn with_client(inner: ApiClient, client: QueryClient, cache: CacheConfig) -> Self {
    Self {
      inner,
      client,
      cache,
    }
  }

  pub fn client(&self) -> &QueryClient {
    &self.client
  }

  /// All todos, refetched whenever stale.
  pub async fn todos(&self) -> QueryResult<CacheResult<Vec<Todo>>> {
    let inner = self.inner.clone();
    self
      .client
      .query(&ResourceKey::Todos.cache_key(), move || async move {
        inner.get_todos().await
      })
      .await
  }

  /// A single todo, kept fresh for the configured todo stale time.
  pub async fn todo(&self, id: u32) -> QueryResult<CacheResult<Todo>> {
    let inner = self.inner.clone();
    self
      .client
      .query_with(
        &ResourceKey::Todo { id }.cache_key(),
        QueryOptions::with_stale_time(self.cache.todo_stale_time()),
        move || async move { inner.get_todo(id).await },
      )
      .await
  }

  /// Flip a todo's `completed` flag optimistically.
  ///
  /// The cached todo changes immediately. If the server rejects the update
  /// the previous value is restored and the error returned.
  pub async fn toggle_todo(&self, id: u32) -> QueryResult<Todo> {
    let current = self.todo(id).await?.data;
    let key = ResourceKey::Todo { id }.cache_key();
    let inner = self.inner.clone();

    let updated = self
      .client
      .mutate(
        &key,
        |cached: Option<Todo>| cached.unwrap_or(current).toggled(),
        move |todo: Todo| async move { inner.update_todo(&todo).await },
      )
      .await?;

    // The list holds its own copy of every todo.
    self.client.invalidate(&ResourceKey::Todos.cache_key());
    info!(id, completed = updated.completed, "todo updated");
    Ok(updated)
  }

  /// One page of the posts search.
  pub async fn posts(&self, params: &PageParams) -> QueryResult<CacheResult<PostsPage>> {
    let inner = self.inner.clone();
    let request = params.clone();
    self
      .client
      .query(&ResourceKey::Posts(params.clone()).cache_key(), move || async move {
        inner.search_posts(&request).await
      })
      .await
  }

  /// Observer for one posts page, showing `placeholder` until its own
  /// data arrives.
  pub fn posts_observer(
    &self,
    params: &PageParams,
    placeholder: Option<PostsPage>,
  ) -> QueryObserver<PostsPage> {
    let inner = self.inner.clone();
    let request = params.clone();
    QueryObserver::new(
      &self.client,
      ResourceKey::Posts(params.clone()).cache_key(),
      move || {
        let inner = inner.clone();
        let request = request.clone();
        async move {
          inner
            .search_posts(&request)
            .await
            .map_err(|e| e.to_string())
        }
      },
    )
    .with_placeholder(placeholder)
  }

  /// Fetch several users in parallel. Each id succeeds or fails alone.
  pub async fn users(&self, ids: &[u32]) -> Vec<(u32, QueryResult<CacheResult<User>>)> {
    let keys: Vec<CacheKey> = ids
      .iter()
      .map(|&id| ResourceKey::User { id }.cache_key())
      .collect();
    debug!(count = keys.len(), "loading users");

    let results = self
      .client
      .query_all(
        &keys,
        QueryOptions::with_stale_time(self.cache.user_stale_time()),
        |key| {
          let inner = self.inner.clone();
          let resource = ResourceKey::from_cache_key(key);
          async move {
            match resource {
              Some(ResourceKey::User { id }) => inner.get_user(id).await,
              _ => Err(eyre!("not a user key")),
            }
          }
        },
      )
      .await;

    ids.iter().copied().zip(results).collect()
  }

  /// Mark one resource stale so the next read refetches.
  pub fn invalidate(&self, resource: &ResourceKey) -> bool {
    self.client.invalidate(&resource.cache_key())
  }

  /// Abandon any in-flight fetch of `resource`.
  pub fn cancel(&self, resource: &ResourceKey) -> bool {
    let cancelled = self.client.cancel(&resource.cache_key());
    if cancelled {
      debug!(resource = %resource.description(), "fetch cancelled");
    }
    cancelled
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheSource;
  use crate::config::ApiConfig;
  use crate::error::QueryError;

  /// Nothing listens on port 1, so every request fails fast.
  fn offline_api() -> CachedApi {
    let config = Config {
      api: ApiConfig {
        jsonplaceholder_url: "http://127.0.0.1:1".to_string(),
        dummyjson_url: "http://127.0.0.1:1".to_string(),
        timeout_secs: 5,
      },
      ..Config::default()
    };
    CachedApi::new(&config).unwrap()
  }

  fn todo(id: u32, completed: bool) -> Todo {
    Todo {
      user_id: 1,
      id,
      title: "delectus aut autem".to_string(),
      completed,
    }
  }

  #[tokio::test]
  async fn test_fresh_todo_served_from_cache() {
    let api = offline_api();
    let key = ResourceKey::Todo { id: 1 }.cache_key();
    api.client().set_query_data(&key, &todo(1, false)).unwrap();

    let result = api.todo(1).await.unwrap();
    assert_eq!(result.source, CacheSource::CacheFresh);
    assert_eq!(result.data, todo(1, false));
  }

  #[tokio::test]
  async fn test_failed_toggle_rolls_back() {
    let api = offline_api();
    let key = ResourceKey::Todo { id: 1 }.cache_key();
    api.client().set_query_data(&key, &todo(1, false)).unwrap();

    let err = api.toggle_todo(1).await.unwrap_err();
    assert!(matches!(err, QueryError::Transport(_)));

    let cached: Option<Todo> = api.client().get_query_data(&key).unwrap();
    assert_eq!(cached, Some(todo(1, false)));
  }

  #[tokio::test]
  async fn test_users_fail_independently() {
    let api = offline_api();
    let user = User {
      id: 1,
      first_name: "Emily".to_string(),
      last_name: "Johnson".to_string(),
      age: 28,
      image: None,
      city: None,
      company: None,
    };
    api
      .client()
      .set_query_data(&ResourceKey::User { id: 1 }.cache_key(), &user)
      .unwrap();

    let results = api.users(&[1, 2]).await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, 1);
    assert_eq!(results[0].1.as_ref().unwrap().data, user);
    assert_eq!(results[1].0, 2);
    assert!(results[1].1.is_err());
  }

  #[tokio::test]
  async fn test_cancel_without_fetch() {
    let api = offline_api();
    assert!(!api.cancel(&ResourceKey::Todos));
  }
}
