//! Installed-module state for the Module Registry.
//!
//! This crate provides:
//!
//! - A generic storage query interface ([`Storage`], [`Database`]) with an
//!   in-memory and a JSON-file backend
//! - The typed installed-state adapter ([`InstalledStore`]) over the module
//!   table
//! - A staleness-bounded listing cache ([`ListingCache`]) with pluggable
//!   cache backends
//! - A [`Clock`] abstraction so staleness can be tested without sleeping

pub mod cache;
pub mod clock;
pub mod error;
pub mod installed;
pub mod record;
pub mod storage;

pub use cache::{CacheBackend, CacheEntry, FileCache, ListingCache, MemoryCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use installed::InstalledStore;
pub use record::{InstalledModuleRecord, module_table_schema};
pub use storage::{Database, Filter, JsonFileStorage, MemoryStorage, Row, Storage};
