use color_eyre::{eyre::eyre, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::api_types::{ApiPostsResponse, ApiUser};
use super::types::{PostsPage, Todo, User};
use crate::config::ApiConfig;
use crate::pagination::PageParams;

/// HTTP client for the public demo APIs
#[derive(Clone)]
pub struct ApiClient {
  http: Client,
  jsonplaceholder: Url,
  dummyjson: Url,
}

impl ApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(concat!("querydeck/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      jsonplaceholder: base_url(&config.jsonplaceholder_url)?,
      dummyjson: base_url(&config.dummyjson_url)?,
    })
  }

  async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T> {
    debug!(url = %url, "GET");
    let response = self
      .http
      .get(url)
      .send()
      .await
      .and_then(|r| r.error_for_status())
      .map_err(|e| eyre!("Failed to fetch {}: {}", what, e))?;

    response
      .json::<T>()
      .await
      .map_err(|e| eyre!("Failed to parse {}: {}", what, e))
  }

  /// Get all todos
  pub async fn get_todos(&self) -> Result<Vec<Todo>> {
    let url = endpoint(&self.jsonplaceholder, "todos")?;
    self.get_json(url, "todos").await
  }

  /// Get a single todo by id
  pub async fn get_todo(&self, id: u32) -> Result<Todo> {
    let url = endpoint(&self.jsonplaceholder, &format!("todos/{}", id))?;
    self.get_json(url, &format!("todo {}", id)).await
  }

  /// Replace a todo, returning the server's copy
  pub async fn update_todo(&self, todo: &Todo) -> Result<Todo> {
    let url = endpoint(&self.jsonplaceholder, &format!("todos/{}", todo.id))?;
    debug!(url = %url, "PUT");

    let response = self
      .http
      .put(url)
      .json(todo)
      .send()
      .await
      .and_then(|r| r.error_for_status())
      .map_err(|e| eyre!("Failed to update todo {}: {}", todo.id, e))?;

    response
      .json::<Todo>()
      .await
      .map_err(|e| eyre!("Failed to parse updated todo {}: {}", todo.id, e))
  }

  /// Search posts, one page at a time
  pub async fn search_posts(&self, params: &PageParams) -> Result<PostsPage> {
    let url = posts_search_url(&self.dummyjson, params)?;
    let response: ApiPostsResponse = self.get_json(url, "posts").await?;
    Ok(response.into())
  }

  /// Get a user profile by id
  pub async fn get_user(&self, id: u32) -> Result<User> {
    let url = endpoint(&self.dummyjson, &format!("users/{}", id))?;
    let user: ApiUser = self.get_json(url, &format!("user {}", id)).await?;
    Ok(user.into())
  }
}

/// Parse a base URL, making sure relative joins append to its path.
fn base_url(raw: &str) -> Result<Url> {
  let mut url = Url::parse(raw).map_err(|e| eyre!("Invalid API URL {}: {}", raw, e))?;
  if !url.path().ends_with('/') {
    let path = format!("{}/", url.path());
    url.set_path(&path);
  }
  Ok(url)
}

fn endpoint(base: &Url, path: &str) -> Result<Url> {
  base
    .join(path)
    .map_err(|e| eyre!("Invalid endpoint {}: {}", path, e))
}

fn posts_search_url(base: &Url, params: &PageParams) -> Result<Url> {
  let mut url = endpoint(base, "posts/search")?;
  url
    .query_pairs_mut()
    .append_pair("limit", &params.limit.to_string())
    .append_pair("skip", &params.skip.to_string())
    .append_pair("q", &params.q);
  Ok(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_endpoint_keeps_base_path() {
    let base = base_url("http://localhost:8080/mock").unwrap();
    assert_eq!(
      endpoint(&base, "todos/3").unwrap().as_str(),
      "http://localhost:8080/mock/todos/3"
    );

    let root = base_url("https://jsonplaceholder.typicode.com").unwrap();
    assert_eq!(
      endpoint(&root, "todos").unwrap().as_str(),
      "https://jsonplaceholder.typicode.com/todos"
    );
  }

  #[test]
  fn test_posts_search_url_encodes_query() {
    let base = base_url("https://dummyjson.com").unwrap();
    let params = PageParams::new(4, 8, "love & war");
    let url = posts_search_url(&base, &params).unwrap();
    assert_eq!(
      url.as_str(),
      "https://dummyjson.com/posts/search?limit=4&skip=8&q=love+%26+war"
    );
  }

  #[test]
  fn test_invalid_base_url() {
    assert!(base_url("not a url").is_err());
  }
}
