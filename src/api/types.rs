//! Domain types for the resources shown by the demo.
//!
//! These are what the cache stores, so they round-trip through serde.

use serde::{Deserialize, Serialize};

/// Todo item (jsonplaceholder `/todos`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
  #[serde(default)]
  pub user_id: u32,
  pub id: u32,
  pub title: String,
  pub completed: bool,
}

impl Todo {
  /// Same todo with `completed` flipped.
  pub fn toggled(&self) -> Self {
    Self {
      completed: !self.completed,
      ..self.clone()
    }
  }
}

/// Like/dislike counters on a post
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reactions {
  #[serde(default)]
  pub likes: u64,
  #[serde(default)]
  pub dislikes: u64,
}

/// Blog post (dummyjson `/posts`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
  pub id: u32,
  pub title: String,
  #[serde(default)]
  pub body: String,
  #[serde(default)]
  pub tags: Vec<String>,
  #[serde(default)]
  pub reactions: Reactions,
  #[serde(default)]
  pub views: u64,
  #[serde(default)]
  pub user_id: u32,
}

/// One page of a posts search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostsPage {
  pub posts: Vec<Post>,
  /// Total matches across all pages
  pub total: u64,
}

/// User profile summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id: u32,
  pub first_name: String,
  pub last_name: String,
  pub age: u32,
  pub image: Option<String>,
  pub city: Option<String>,
  pub company: Option<String>,
}

impl User {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }
}
