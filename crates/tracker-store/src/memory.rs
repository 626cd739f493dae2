//! In-memory repository implementations for testing and development.
//!
//! Thread-safe over `RwLock`, with the unique index specifications from
//! [`crate::indexes`] enforced on insert so that conflict behavior matches
//! the MongoDB backend.
//!
//! ## Limitations
//!
//! - **Not for production**: no durability, single process only
//! - Linear scans instead of indexed lookups

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Datelike;
use uuid::Uuid;

use tracker_core::{CatalogEntry, Error, Event, Lock, Result, Timestamp};

use crate::filter::{EventFilter, StatsFilter};
use crate::repository::{
    CatalogRepository, EventLookup, EventRepository, LockLookup, LockRepository, MonthlyBucket,
};

/// Converts a lock poison error to a dependency error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::dependency("lock poisoned")
}

fn lookup_matches_event(lookup: &EventLookup, event: &Event) -> bool {
    match lookup {
        EventLookup::Id(id) => event.metadata.id == *id,
        EventLookup::SlackId(slack_id) => event.metadata.slack_id == *slack_id,
    }
}

fn lookup_matches_lock(lookup: &LockLookup, lock: &Lock) -> bool {
    match lookup {
        LockLookup::Id(id) => lock.id == *id,
        LockLookup::EventId(event_id) => lock.event_id == *event_id,
        LockLookup::Key {
            service,
            environment,
            resource,
        } => lock.key() == (service.as_str(), environment.as_str(), resource.as_str()),
    }
}

/// In-memory event repository.
#[derive(Debug, Default)]
pub struct MemoryEventRepository {
    events: RwLock<Vec<Event>>,
}

impl MemoryEventRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventRepository for MemoryEventRepository {
    async fn list(&self) -> Result<Vec<Event>> {
        let events = self.events.read().map_err(poison_err)?;
        Ok(events.clone())
    }

    async fn get(&self, lookup: &EventLookup) -> Result<Option<Event>> {
        let events = self.events.read().map_err(poison_err)?;
        Ok(events
            .iter()
            .find(|e| lookup_matches_event(lookup, e))
            .cloned())
    }

    async fn create(&self, mut event: Event) -> Result<Event> {
        event.metadata.id = Uuid::new_v4().to_string();
        event.metadata.created_at = Timestamp::now();

        let mut events = self.events.write().map_err(poison_err)?;
        // idx_metadata_id: unique where id non-empty
        if events.iter().any(|e| e.metadata.id == event.metadata.id) {
            return Err(Error::conflict(format!(
                "duplicate key: event id {}",
                event.metadata.id
            )));
        }
        events.push(event.clone());
        Ok(event)
    }

    async fn update(&self, lookup: &EventLookup, event: Event) -> Result<Event> {
        let mut events = self.events.write().map_err(poison_err)?;
        if let Some(stored) = events.iter_mut().find(|e| lookup_matches_event(lookup, e)) {
            *stored = event.clone();
        } else {
            events.push(event.clone());
        }
        Ok(event)
    }

    async fn delete(&self, lookup: &EventLookup) -> Result<()> {
        let mut events = self.events.write().map_err(poison_err)?;
        events.retain(|e| !lookup_matches_event(lookup, e));
        Ok(())
    }

    async fn search(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let events = self.events.read().map_err(poison_err)?;
        Ok(events.iter().filter(|e| filter.matches(e)).cloned().collect())
    }

    async fn count_with_filter(&self, filter: &StatsFilter) -> Result<u64> {
        let events = self.events.read().map_err(poison_err)?;
        Ok(events.iter().filter(|e| filter.matches(e)).count() as u64)
    }

    async fn aggregate_by_month(
        &self,
        filter: &StatsFilter,
        group_by_service: bool,
    ) -> Result<Vec<MonthlyBucket>> {
        let events = self.events.read().map_err(poison_err)?;

        // BTreeMap keys already sort (year, month, service) ascending.
        let mut buckets: BTreeMap<(i32, u32, String), u64> = BTreeMap::new();
        for event in events.iter().filter(|e| filter.matches(e)) {
            let date = event.metadata.created_at.to_datetime();
            let service = if group_by_service {
                event.attributes.service.clone()
            } else {
                String::new()
            };
            *buckets.entry((date.year(), date.month(), service)).or_insert(0) += 1;
        }

        Ok(buckets
            .into_iter()
            .map(|((year, month, service), count)| MonthlyBucket {
                year,
                month,
                count,
                service: group_by_service.then_some(service),
            })
            .collect())
    }
}

/// In-memory lock repository.
///
/// Enforces the unique `(service, environment, resource)` key index inside a
/// single write-lock critical section, matching the atomicity the MongoDB
/// unique index provides.
#[derive(Debug, Default)]
pub struct MemoryLockRepository {
    locks: RwLock<Vec<Lock>>,
}

impl MemoryLockRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockRepository for MemoryLockRepository {
    async fn list(&self) -> Result<Vec<Lock>> {
        let locks = self.locks.read().map_err(poison_err)?;
        Ok(locks.clone())
    }

    async fn get(&self, lookup: &LockLookup) -> Result<Option<Lock>> {
        let locks = self.locks.read().map_err(poison_err)?;
        Ok(locks
            .iter()
            .find(|l| lookup_matches_lock(lookup, l))
            .cloned())
    }

    async fn create(&self, mut lock: Lock) -> Result<Lock> {
        lock.id = Uuid::new_v4().to_string();
        lock.created_at = Timestamp::now();

        let mut locks = self.locks.write().map_err(poison_err)?;
        // idx_lock_key: unique where service non-empty
        if !lock.service.is_empty() && locks.iter().any(|l| l.key() == lock.key()) {
            return Err(Error::conflict(format!(
                "duplicate key: lock ({}, {}, {})",
                lock.service, lock.environment, lock.resource
            )));
        }
        locks.push(lock.clone());
        Ok(lock)
    }

    async fn update(&self, lookup: &LockLookup, lock: Lock) -> Result<Lock> {
        let mut locks = self.locks.write().map_err(poison_err)?;
        if let Some(stored) = locks.iter_mut().find(|l| lookup_matches_lock(lookup, l)) {
            *stored = lock.clone();
        } else {
            locks.push(lock.clone());
        }
        Ok(lock)
    }

    async fn unlock(&self, lookup: &LockLookup) -> Result<u64> {
        let mut locks = self.locks.write().map_err(poison_err)?;
        let before = locks.len();
        locks.retain(|l| !lookup_matches_lock(lookup, l));
        Ok((before - locks.len()) as u64)
    }
}

/// In-memory catalog repository.
#[derive(Debug, Default)]
pub struct MemoryCatalogRepository {
    entries: RwLock<Vec<CatalogEntry>>,
}

impl MemoryCatalogRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogRepository for MemoryCatalogRepository {
    async fn list(&self) -> Result<Vec<CatalogEntry>> {
        let entries = self.entries.read().map_err(poison_err)?;
        Ok(entries.clone())
    }

    async fn get(&self, name: &str) -> Result<Option<CatalogEntry>> {
        let entries = self.entries.read().map_err(poison_err)?;
        Ok(entries.iter().find(|e| e.name == name).cloned())
    }

    async fn upsert(&self, name: &str, entry: CatalogEntry) -> Result<CatalogEntry> {
        let mut entries = self.entries.write().map_err(poison_err)?;
        if let Some(stored) = entries.iter_mut().find(|e| e.name == name) {
            *stored = entry.clone();
        } else {
            entries.push(entry.clone());
        }
        Ok(entry)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(poison_err)?;
        entries.retain(|e| e.name != name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_core::Environment;

    fn event_with(service: &str, created_seconds: i64) -> Event {
        let mut event = Event::default();
        event.attributes.service = service.to_string();
        event.metadata.created_at = Timestamp {
            seconds: created_seconds,
            nanos: 0,
        };
        event
    }

    #[tokio::test]
    async fn create_mints_id_and_created_at() -> Result<()> {
        let repo = MemoryEventRepository::new();
        let created = repo.create(Event::default()).await?;
        assert!(uuid::Uuid::parse_str(&created.metadata.id).is_ok());
        assert!(!created.metadata.created_at.is_zero());

        let fetched = repo
            .get(&EventLookup::Id(created.metadata.id.clone()))
            .await?;
        assert_eq!(fetched, Some(created));
        Ok(())
    }

    #[tokio::test]
    async fn update_is_upsert_with_post_image() -> Result<()> {
        let repo = MemoryEventRepository::new();
        let mut event = repo.create(Event::default()).await?;
        event.title = "rollout".to_string();

        let updated = repo
            .update(&EventLookup::Id(event.metadata.id.clone()), event.clone())
            .await?;
        assert_eq!(updated.title, "rollout");
        assert_eq!(repo.list().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_lock_key_is_conflict() -> Result<()> {
        let repo = MemoryLockRepository::new();
        let lock = Lock {
            service: "api".to_string(),
            environment: "production".to_string(),
            resource: "deployment".to_string(),
            who: "alice".to_string(),
            ..Lock::default()
        };
        repo.create(lock.clone()).await?;

        let err = repo.create(lock).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(repo.list().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_lock_creates_yield_one_winner() {
        use std::sync::Arc;

        let repo = Arc::new(MemoryLockRepository::new());
        let lock = Lock {
            service: "api".to_string(),
            environment: "production".to_string(),
            resource: "deployment".to_string(),
            ..Lock::default()
        };

        let (a, b) = tokio::join!(repo.create(lock.clone()), repo.create(lock));
        assert_eq!(
            a.is_ok() as u8 + b.is_ok() as u8,
            1,
            "exactly one create must win"
        );
        assert!(a.or(b).is_ok());
    }

    #[tokio::test]
    async fn unlock_returns_deleted_count() -> Result<()> {
        let repo = MemoryLockRepository::new();
        let lock = repo
            .create(Lock {
                service: "api".to_string(),
                environment: "uat".to_string(),
                resource: "operation".to_string(),
                ..Lock::default()
            })
            .await?;

        assert_eq!(repo.unlock(&LockLookup::Id(lock.id.clone())).await?, 1);
        assert_eq!(repo.unlock(&LockLookup::Id(lock.id)).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn aggregate_by_month_sorts_year_month_service() -> Result<()> {
        let repo = MemoryEventRepository::new();
        // Insertion order deliberately scrambled across (2024-01..03) x {a,b}.
        let seeds = [
            ("b", "2024-03-10T00:00:00Z"),
            ("a", "2024-01-05T00:00:00Z"),
            ("b", "2024-01-20T00:00:00Z"),
            ("a", "2024-03-01T00:00:00Z"),
            ("b", "2024-02-14T00:00:00Z"),
            ("a", "2024-02-02T00:00:00Z"),
        ];
        for (service, date) in seeds {
            let seconds = crate::filter::parse_date(date)?.timestamp();
            let mut event = event_with(service, seconds);
            // created_at is minted by create; overwrite through update to
            // control the bucket.
            event = repo.create(event).await?;
            event.metadata.created_at = Timestamp { seconds, nanos: 0 };
            repo.update(&EventLookup::Id(event.metadata.id.clone()), event)
                .await?;
        }

        let filter = StatsFilter {
            created_gte: 0,
            created_lte: i64::MAX,
            ..StatsFilter::default()
        };
        let buckets = repo.aggregate_by_month(&filter, true).await?;
        let keys: Vec<_> = buckets
            .iter()
            .map(|b| (b.year, b.month, b.service.clone().unwrap()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (2024, 1, "a".to_string()),
                (2024, 1, "b".to_string()),
                (2024, 2, "a".to_string()),
                (2024, 2, "b".to_string()),
                (2024, 3, "a".to_string()),
                (2024, 3, "b".to_string()),
            ]
        );
        assert!(buckets.iter().all(|b| b.count == 1));

        let merged = repo.aggregate_by_month(&filter, false).await?;
        assert_eq!(merged.len(), 3);
        assert!(merged.iter().all(|b| b.service.is_none() && b.count == 2));
        Ok(())
    }

    #[tokio::test]
    async fn catalog_upsert_replaces_by_name() -> Result<()> {
        let repo = MemoryCatalogRepository::new();
        let entry = CatalogEntry {
            name: "api".to_string(),
            version: "1.0".to_string(),
            ..CatalogEntry::default()
        };
        repo.upsert("api", entry.clone()).await?;

        let mut newer = entry;
        newer.version = "2.0".to_string();
        let stored = repo.upsert("api", newer).await?;
        assert_eq!(stored.version, "2.0");
        assert_eq!(repo.list().await?.len(), 1);

        repo.delete("api").await?;
        assert!(repo.get("api").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn stats_filter_environment_applies() -> Result<()> {
        let repo = MemoryEventRepository::new();
        let mut event = Event::default();
        event.attributes.environment = Environment::Production;
        repo.create(event).await?;

        let mut filter = StatsFilter {
            created_gte: 0,
            created_lte: i64::MAX,
            environments: vec![Environment::Production],
            ..StatsFilter::default()
        };
        assert_eq!(repo.count_with_filter(&filter).await?, 1);

        filter.environments = vec![Environment::Uat];
        assert_eq!(repo.count_with_filter(&filter).await?, 0);
        Ok(())
    }
}
