//! Caching: the `Cache` component, storage backends and dependencies.

pub mod backend;
pub mod cache;
pub mod dependency;

pub use backend::{CacheBackend, MemoryCache};
pub use cache::Cache;
pub use dependency::CacheDependency;
