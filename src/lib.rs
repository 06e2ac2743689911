//! Keyed query cache with request deduplication and optimistic mutations,
//! plus a small CLI demo over public JSON APIs.

pub mod api;
pub mod app;
pub mod cache;
pub mod commands;
pub mod config;
pub mod debounce;
pub mod error;
pub mod event;
pub mod logging;
pub mod mutation;
pub mod observer;
pub mod pagination;
pub mod query;
pub mod render;

pub use cache::{CacheKey, CacheStore};
pub use error::{QueryError, QueryResult};
pub use mutation::{Mutation, MutationState};
pub use observer::{QueryObserver, QueryState};
pub use query::{QueryClient, QueryOptions};
