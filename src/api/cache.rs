//! Cache keys for the demo resources.

use crate::cache::{CacheKey, KeyPart};
use crate::pagination::PageParams;

/// Every remote resource the demo caches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceKey {
  /// All todos
  Todos,
  /// A single todo
  Todo { id: u32 },
  /// One page of a posts search
  Posts(PageParams),
  /// A single user profile
  User { id: u32 },
}

impl ResourceKey {
  pub fn cache_key(&self) -> CacheKey {
    match self {
      Self::Todos => CacheKey::new("todos"),
      Self::Todo { id } => crate::query_key!["todo", *id],
      Self::Posts(params) => params.cache_key(),
      Self::User { id } => crate::query_key!["user", *id],
    }
  }

  /// Recover the resource a cache key was built from.
  pub fn from_cache_key(key: &CacheKey) -> Option<Self> {
    match key.parts() {
      [KeyPart::Str(root)] if root == "todos" => Some(Self::Todos),
      [KeyPart::Str(root), KeyPart::Int(id)] if root == "todo" => {
        u32::try_from(*id).ok().map(|id| Self::Todo { id })
      }
      [KeyPart::Str(root), KeyPart::Int(id)] if root == "user" => {
        u32::try_from(*id).ok().map(|id| Self::User { id })
      }
      [KeyPart::Str(root), KeyPart::Int(limit), KeyPart::Int(skip), KeyPart::Str(q)]
        if root == "posts" =>
      {
        let limit = u32::try_from(*limit).ok()?;
        let skip = u32::try_from(*skip).ok()?;
        Some(Self::Posts(PageParams::new(limit, skip, q.clone())))
      }
      _ => None,
    }
  }

  pub fn description(&self) -> String {
    match self {
      Self::Todos => "all todos".to_string(),
      Self::Todo { id } => format!("todo {}", id),
      Self::Posts(params) => {
        if params.q.is_empty() {
          format!("posts {}..{}", params.skip, params.end())
        } else {
          format!("posts {}..{} matching '{}'", params.skip, params.end(), params.q)
        }
      }
      Self::User { id } => format!("user {}", id),
    }
  }
}

impl From<ResourceKey> for CacheKey {
  fn from(key: ResourceKey) -> Self {
    key.cache_key()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_keys_match_query_keys() {
    assert_eq!(ResourceKey::Todos.cache_key().to_string(), "todos");
    assert_eq!(ResourceKey::Todo { id: 1 }.cache_key(), CacheKey::parse("todo:1"));
    assert_eq!(ResourceKey::User { id: 3 }.cache_key(), CacheKey::parse("user:3"));
    assert_eq!(
      ResourceKey::Posts(PageParams::new(4, 4, "his")).cache_key(),
      CacheKey::parse("posts:4:4:his")
    );
  }

  #[test]
  fn test_from_cache_key() {
    let keys = [
      ResourceKey::Todos,
      ResourceKey::Todo { id: 7 },
      ResourceKey::User { id: 2 },
      ResourceKey::Posts(PageParams::new(4, 8, "love")),
    ];
    for key in keys {
      assert_eq!(ResourceKey::from_cache_key(&key.cache_key()), Some(key));
    }

    assert_eq!(ResourceKey::from_cache_key(&CacheKey::parse("user:-1")), None);
    assert_eq!(ResourceKey::from_cache_key(&CacheKey::parse("comments:1")), None);
  }

  #[test]
  fn test_description() {
    let key = ResourceKey::Posts(PageParams::new(4, 8, "love"));
    assert_eq!(key.description(), "posts 8..12 matching 'love'");
    assert_eq!(ResourceKey::Todo { id: 2 }.description(), "todo 2");

    let last = ResourceKey::Posts(PageParams::new(4, u32::MAX, ""));
    assert_eq!(last.description(), "posts 4294967295..4294967299");
  }
}
