//! Keyed in-memory cache for remote resources.
//!
//! This module provides the storage half of the query cache:
//! - Structural keys (`["todo", 1]`) compared by value
//! - Entries holding a JSON value plus fetch status and freshness metadata
//! - Per-key subscribers that are told about every write
//! - Idle-entry garbage collection

mod key;
mod storage;
mod traits;

pub use key::{CacheKey, KeyPart};
pub use storage::{CacheEntry, CacheStore, QueryStatus, Subscription, SubscriptionId};
pub use traits::{CacheResult, CacheSource, Cacheable};
