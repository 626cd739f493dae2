//! Repository contracts over the document store.
//!
//! Each of Events, Locks, Catalog exposes CRUD plus the aggregation surface
//! its engine needs. Implementations must provide:
//!
//! - Durability appropriate for the deployment (in-memory for tests, MongoDB
//!   for production)
//! - Upsert-with-post-image semantics for `update` (callers rely on this to
//!   both create-if-missing and fetch the document after the write)
//! - Uniqueness enforcement per the index specifications in
//!   [`crate::indexes`], surfacing duplicate-key failures as `Conflict`
//!
//! All methods are `Send + Sync` to support concurrent request handlers.

use async_trait::async_trait;

use tracker_core::{CatalogEntry, Event, Lock, Result};

use crate::filter::{EventFilter, StatsFilter};

/// Typed lookup keys for events. Each caller addresses exactly one keyspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventLookup {
    /// By `metadata.id` (server-minted UUID).
    Id(String),
    /// By `metadata.slack_id`.
    SlackId(String),
}

impl EventLookup {
    /// The key value, for error messages.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Id(v) | Self::SlackId(v) => v,
        }
    }
}

/// Typed lookup keys for locks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockLookup {
    /// By lock `id`.
    Id(String),
    /// By the owning event's id.
    EventId(String),
    /// By the uniqueness key.
    Key {
        /// Locked service.
        service: String,
        /// Environment.
        environment: String,
        /// Serialized resource kind.
        resource: String,
    },
}

/// One bucket of the month aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyBucket {
    /// Calendar year (UTC).
    pub year: i32,
    /// Calendar month, 1-12 (UTC).
    pub month: u32,
    /// Number of events in the bucket.
    pub count: u64,
    /// Service, when grouping by service was requested.
    pub service: Option<String>,
}

/// Storage abstraction for events.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Lists every event.
    async fn list(&self) -> Result<Vec<Event>>;

    /// Gets a single event by lookup key. Returns `None` when absent.
    async fn get(&self, lookup: &EventLookup) -> Result<Option<Event>>;

    /// Persists a new event, minting `metadata.id` (UUIDv4) and
    /// `metadata.created_at`. Returns the stored representation.
    async fn create(&self, event: Event) -> Result<Event>;

    /// Replaces the event matching the lookup (upsert) and returns the
    /// document after the update.
    async fn update(&self, lookup: &EventLookup, event: Event) -> Result<Event>;

    /// Deletes the event matching the lookup.
    async fn delete(&self, lookup: &EventLookup) -> Result<()>;

    /// Returns the events matching the search predicate.
    async fn search(&self, filter: &EventFilter) -> Result<Vec<Event>>;

    /// Counts the events matching the stats predicate.
    async fn count_with_filter(&self, filter: &StatsFilter) -> Result<u64>;

    /// Buckets matching events by UTC `(year, month)` of `created_at`, with
    /// an optional secondary grouping by service. Output is sorted ascending
    /// by `(year, month, service)`.
    async fn aggregate_by_month(
        &self,
        filter: &StatsFilter,
        group_by_service: bool,
    ) -> Result<Vec<MonthlyBucket>>;
}

/// Storage abstraction for locks.
///
/// `create` is the serialization point for the whole arbiter: the backing
/// store enforces the unique `(service, environment, resource)` index and
/// surfaces a duplicate key as `Conflict`.
#[async_trait]
pub trait LockRepository: Send + Sync {
    /// Lists every held lock.
    async fn list(&self) -> Result<Vec<Lock>>;

    /// Gets a single lock by lookup key. Returns `None` when absent.
    async fn get(&self, lookup: &LockLookup) -> Result<Option<Lock>>;

    /// Persists a new lock, minting `id` (UUIDv4) and `created_at`.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when a lock already holds the same
    /// `(service, environment, resource)` key.
    async fn create(&self, lock: Lock) -> Result<Lock>;

    /// Replaces the lock matching the lookup and returns the document after
    /// the update.
    async fn update(&self, lookup: &LockLookup, lock: Lock) -> Result<Lock>;

    /// Deletes the lock matching the lookup, returning the deleted count.
    async fn unlock(&self, lookup: &LockLookup) -> Result<u64>;
}

/// Storage abstraction for catalog entries, keyed by `name`.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Lists every catalog entry.
    async fn list(&self) -> Result<Vec<CatalogEntry>>;

    /// Gets an entry by name. Returns `None` when absent.
    async fn get(&self, name: &str) -> Result<Option<CatalogEntry>>;

    /// Upserts the entry under `name` and returns the document after the
    /// update.
    async fn upsert(&self, name: &str, entry: CatalogEntry) -> Result<CatalogEntry>;

    /// Deletes the entry under `name`.
    async fn delete(&self, name: &str) -> Result<()>;
}
