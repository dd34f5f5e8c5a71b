//! Cache-aside access layer
//!
//! Coordinates a redis cache with a slower authoritative store for one entity type.
//! What gets cached, for how long, and what a delete evicts is decided by a
//! [`CachePolicy`] attached to the coordinator instead of being spread through callers:
//!
//! - reads check redis first and fall back to the store on a miss, populating the
//!   cache unless the policy's skip predicate rejects the loaded entity
//! - writes always go to the store and then overwrite the cache entry, ignoring the
//!   skip predicate
//! - deletes remove the store record and then evict either the whole cache region or
//!   just the one key
//!
//! A [`LastFetchedSlot`] can be attached as well: a single fixed redis key that every
//! store-backed read overwrites, independently of the conditional cache.
//!
//! # Example
//!
//! ```rust,ignore
//! use common_cache::{CacheAsideCoordinator, CachePolicy, CacheSource, LastFetchedSlot};
//!
//! let policy = CachePolicy::new("persons")
//!     .with_ttl(300)
//!     .unless(|person: &Person| person.age < 29);
//!
//! let coordinator = CacheAsideCoordinator::new(redis.clone(), store, policy)
//!     .with_last_fetched_slot(LastFetchedSlot::new(redis, "personId"));
//!
//! let result = coordinator.read(&42).await?;
//! match result.source {
//!     CacheSource::Cache => println!("served from redis"),
//!     _ => println!("served from the store: {}", result.source),
//! }
//! ```

pub mod coordinator;
pub mod errors;
pub mod last_fetched;
pub mod memory_store;
pub mod metrics_consts;
pub mod store;
pub mod types;

pub use coordinator::CacheAsideCoordinator;
pub use errors::CacheAsideError;
pub use last_fetched::LastFetchedSlot;
pub use memory_store::InMemoryStore;
pub use store::{CacheableEntity, EntityStore, StoreError};
pub use types::{CachePolicy, CacheResult, CacheSource, EvictionScope};
