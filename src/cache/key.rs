//! Structural cache keys.

use std::fmt;

/// One component of a [`CacheKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
  Bool(bool),
  Int(i64),
  Str(String),
}

impl fmt::Display for KeyPart {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      KeyPart::Bool(b) => write!(f, "{}", b),
      KeyPart::Int(n) => write!(f, "{}", n),
      KeyPart::Str(s) => f.write_str(s),
    }
  }
}

impl From<bool> for KeyPart {
  fn from(value: bool) -> Self {
    KeyPart::Bool(value)
  }
}

impl From<i64> for KeyPart {
  fn from(value: i64) -> Self {
    KeyPart::Int(value)
  }
}

impl From<i32> for KeyPart {
  fn from(value: i32) -> Self {
    KeyPart::Int(value.into())
  }
}

impl From<u32> for KeyPart {
  fn from(value: u32) -> Self {
    KeyPart::Int(value.into())
  }
}

impl From<&str> for KeyPart {
  fn from(value: &str) -> Self {
    KeyPart::Str(value.to_string())
  }
}

impl From<String> for KeyPart {
  fn from(value: String) -> Self {
    KeyPart::Str(value)
  }
}

impl From<&String> for KeyPart {
  fn from(value: &String) -> Self {
    KeyPart::Str(value.clone())
  }
}

/// Ordered tuple of primitive values identifying one cached entity,
/// e.g. `["todo", 1]`. Keys compare by structural equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Vec<KeyPart>);

impl CacheKey {
  pub fn new(root: impl Into<KeyPart>) -> Self {
    Self(vec![root.into()])
  }

  pub fn from_parts(parts: Vec<KeyPart>) -> Self {
    Self(parts)
  }

  /// Append a part, builder style.
  pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
    self.0.push(part.into());
    self
  }

  /// Parse the `:`-joined display form (`"todo:1"`).
  ///
  /// Segments that parse as integers become `Int`, `true`/`false` become
  /// `Bool`, everything else is kept as `Str`.
  pub fn parse(s: &str) -> Self {
    let parts = s
      .split(':')
      .map(|segment| {
        if let Ok(n) = segment.parse::<i64>() {
          KeyPart::Int(n)
        } else if let Ok(b) = segment.parse::<bool>() {
          KeyPart::Bool(b)
        } else {
          KeyPart::Str(segment.to_string())
        }
      })
      .collect();
    Self(parts)
  }

  pub fn parts(&self) -> &[KeyPart] {
    &self.0
  }

  /// True if `prefix` matches the leading parts of this key.
  pub fn starts_with(&self, prefix: &CacheKey) -> bool {
    self.0.starts_with(&prefix.0)
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, part) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str(":")?;
      }
      write!(f, "{}", part)?;
    }
    Ok(())
  }
}

/// Build a [`CacheKey`] from a list of parts.
///
/// ```ignore
/// let key = query_key!["posts", limit, skip, q.as_str()];
/// ```
#[macro_export]
macro_rules! query_key {
  ($($part:expr),+ $(,)?) => {
    $crate::cache::CacheKey::from_parts(vec![$($crate::cache::KeyPart::from($part)),+])
  };
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_structural_equality() {
    let a = CacheKey::new("todo").with(1);
    let b = crate::query_key!["todo", 1];
    assert_eq!(a, b);
    assert_ne!(a, CacheKey::new("todo").with("1"));
  }

  #[test]
  fn test_display_and_parse() {
    let key = crate::query_key!["posts", 4, 8, "love"];
    assert_eq!(key.to_string(), "posts:4:8:love");
    assert_eq!(CacheKey::parse("posts:4:8:love"), key);
    assert_eq!(CacheKey::parse("flag:true").parts()[1], KeyPart::Bool(true));
  }

  #[test]
  fn test_prefix_match() {
    let key = crate::query_key!["posts", 4, 0, ""];
    assert!(key.starts_with(&CacheKey::new("posts")));
    assert!(!key.starts_with(&CacheKey::new("todo")));
    assert!(!CacheKey::new("posts").starts_with(&key));
  }
}
