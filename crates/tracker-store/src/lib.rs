//! # tracker-store
//!
//! Storage layer for the tracker service:
//!
//! - **Repository contracts**: async traits over Events, Locks, Catalog
//! - **Filter builder**: typed search and stats predicates with tolerant
//!   date parsing
//! - **Index specifications**: declarative secondary indexes, idempotently
//!   ensured at startup, including the unique lock-key index that provides
//!   the mutual-exclusion guarantee
//! - **Backends**: in-memory (tests/dev) and MongoDB (production)
//!
//! Everything above this crate talks to the traits; nothing above it sees a
//! driver type.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]

pub mod config;
pub mod filter;
pub mod indexes;
pub mod memory;
pub mod mongo;
pub mod repository;

pub use config::StoreConfig;
pub use filter::{EventFilter, SearchQuery, StatsFilter, StatsQuery};
pub use memory::{MemoryCatalogRepository, MemoryEventRepository, MemoryLockRepository};
pub use mongo::{
    connect, ensure_indexes, MongoCatalogRepository, MongoEventRepository, MongoLockRepository,
};
pub use repository::{
    CatalogRepository, EventLookup, EventRepository, LockLookup, LockRepository, MonthlyBucket,
};
