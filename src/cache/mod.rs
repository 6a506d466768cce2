//! Tag-based query cache
//!
//! - [`tag`]: cache tags and the invalidation matching rule
//! - [`store`]: entries, freshness, subscribers and the tag index
//! - [`coalesce`]: one network call per key while a read is in flight
//! - [`subscription`]: typed live handles onto entries

pub mod coalesce;
pub mod store;
pub mod subscription;
pub mod tag;

pub use coalesce::InflightRequests;
pub use store::{QueryCache, QueryKey, QueryRecipe, QueryState, QueryStatus, StaleEntry};
pub use subscription::{QuerySnapshot, QuerySubscription};
pub use tag::{Tag, TagType};
