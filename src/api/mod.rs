//! Adapters binding the public JSON APIs to the query cache.

mod api_types;
mod cache;
mod cached_client;
mod client;
pub mod types;

pub use cache::ResourceKey;
pub use cached_client::CachedApi;
pub use client::ApiClient;
