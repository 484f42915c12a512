//! Cache backends and the installed-module listing cache.

mod backend;
mod listing;

pub use backend::{CacheBackend, CacheEntry, FileCache, MemoryCache};
pub use listing::{DEFAULT_STALENESS_SECS, LISTING_KEY, ListingCache};
