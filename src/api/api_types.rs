//! Serde-deserializable types matching the remote API responses.
//!
//! Kept apart from the domain types where the wire shape differs from what
//! the app stores.

use serde::Deserialize;

use super::types::{Post, PostsPage, User};

// ============================================================================
// Posts search endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiPostsResponse {
  #[serde(default)]
  pub posts: Vec<Post>,
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub skip: u64,
  #[serde(default)]
  pub limit: u64,
}

impl From<ApiPostsResponse> for PostsPage {
  fn from(response: ApiPostsResponse) -> Self {
    PostsPage {
      posts: response.posts,
      total: response.total,
    }
  }
}

// ============================================================================
// User endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiAddress {
  pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCompany {
  pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUser {
  pub id: u32,
  #[serde(default)]
  pub first_name: String,
  #[serde(default)]
  pub last_name: String,
  #[serde(default)]
  pub age: u32,
  pub image: Option<String>,
  pub address: Option<ApiAddress>,
  pub company: Option<ApiCompany>,
}

impl From<ApiUser> for User {
  fn from(user: ApiUser) -> Self {
    User {
      id: user.id,
      first_name: user.first_name,
      last_name: user.last_name,
      age: user.age,
      image: user.image,
      city: user.address.and_then(|a| a.city),
      company: user.company.and_then(|c| c.name),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::Todo;

  #[test]
  fn test_parse_todo() {
    let todo: Todo = serde_json::from_str(
      r#"{"userId": 1, "id": 2, "title": "quis ut nam facilis", "completed": false}"#,
    )
    .unwrap();
    assert_eq!(todo.id, 2);
    assert_eq!(todo.user_id, 1);
    assert!(todo.toggled().completed);
  }

  #[test]
  fn test_parse_posts_response() {
    let response: ApiPostsResponse = serde_json::from_str(
      r#"{
        "posts": [{
          "id": 1,
          "title": "His mother had always taught him",
          "body": "...",
          "tags": ["history", "american"],
          "reactions": {"likes": 192, "dislikes": 25},
          "views": 305,
          "userId": 121
        }],
        "total": 251, "skip": 0, "limit": 1
      }"#,
    )
    .unwrap();

    let page = PostsPage::from(response);
    assert_eq!(page.total, 251);
    assert_eq!(page.posts[0].reactions.likes, 192);
    assert_eq!(page.posts[0].tags, vec!["history", "american"]);
  }

  #[test]
  fn test_parse_user_flattens_nested_fields() {
    let api: ApiUser = serde_json::from_str(
      r#"{
        "id": 1, "firstName": "Emily", "lastName": "Johnson", "age": 28,
        "image": "https://dummyjson.com/icon/emilys/128",
        "address": {"city": "Phoenix", "state": "Mississippi"},
        "company": {"name": "Dooley, Kozey and Cronin", "title": "Sales Manager"}
      }"#,
    )
    .unwrap();

    let user = User::from(api);
    assert_eq!(user.full_name(), "Emily Johnson");
    assert_eq!(user.city.as_deref(), Some("Phoenix"));
    assert_eq!(user.company.as_deref(), Some("Dooley, Kozey and Cronin"));
  }

  #[test]
  fn test_parse_user_without_optional_sections() {
    let api: ApiUser = serde_json::from_str(r#"{"id": 9}"#).unwrap();
    let user = User::from(api);
    assert!(user.city.is_none());
    assert_eq!(user.age, 0);
  }
}
