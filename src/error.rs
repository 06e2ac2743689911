use std::fmt::Display;
use thiserror::Error;

/// Errors produced by the query cache.
///
/// Cloneable so a single fetch outcome can be handed to every caller that
/// joined the same in-flight request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
  /// The loader or remote operation failed. Carries the rendered message.
  #[error("{0}")]
  Transport(String),

  /// The request was superseded by a newer fetch, cancel or mutation.
  /// Never meant to be shown to a user.
  #[error("query was cancelled")]
  Cancelled,

  /// A cached value could not be converted to or from the requested type.
  #[error("failed to decode cached value: {0}")]
  Decode(String),
}

impl QueryError {
  pub fn transport(error: impl Display) -> Self {
    QueryError::Transport(error.to_string())
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self, QueryError::Cancelled)
  }
}

impl From<serde_json::Error> for QueryError {
  fn from(error: serde_json::Error) -> Self {
    QueryError::Decode(error.to_string())
  }
}

pub type QueryResult<T> = std::result::Result<T, QueryError>;
