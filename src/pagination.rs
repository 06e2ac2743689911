//! Offset/limit bookkeeping for the posts search.

use crate::cache::CacheKey;

pub const DEFAULT_LIMIT: u32 = 4;

/// One page of a searchable list: `limit` items starting at `skip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageParams {
  pub limit: u32,
  pub skip: u32,
  pub q: String,
}

impl Default for PageParams {
  fn default() -> Self {
    Self {
      limit: DEFAULT_LIMIT,
      skip: 0,
      q: String::new(),
    }
  }
}

impl PageParams {
  /// A zero limit falls back to the default page size.
  pub fn new(limit: u32, skip: u32, q: impl Into<String>) -> Self {
    Self {
      limit: if limit == 0 { DEFAULT_LIMIT } else { limit },
      skip,
      q: q.into(),
    }
  }

  /// Shift the window by `delta` items, clamping at the first item.
  pub fn move_by(&self, delta: i64) -> Self {
    let skip = (i64::from(self.skip) + delta).clamp(0, i64::from(u32::MAX)) as u32;
    Self {
      skip,
      ..self.clone()
    }
  }

  pub fn next(&self) -> Self {
    self.move_by(i64::from(self.limit))
  }

  pub fn prev(&self) -> Self {
    self.move_by(-i64::from(self.limit))
  }

  /// New search text starts over from the first page.
  pub fn with_search(&self, q: impl Into<String>) -> Self {
    Self {
      q: q.into(),
      skip: 0,
      ..self.clone()
    }
  }

  pub fn is_first(&self) -> bool {
    self.skip == 0
  }

  /// 1-based page number.
  pub fn page_number(&self) -> u32 {
    (self.skip / self.limit).saturating_add(1)
  }

  /// Offset one past the last item of this page.
  pub fn end(&self) -> u64 {
    u64::from(self.skip) + u64::from(self.limit)
  }

  /// Whether `total` items leave anything after this page.
  pub fn has_next(&self, total: u64) -> bool {
    self.end() < total
  }

  /// `["posts", limit, skip, q]`
  pub fn cache_key(&self) -> CacheKey {
    crate::query_key!["posts", self.limit, self.skip, &self.q]
  }
}
