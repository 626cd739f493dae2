//! MongoDB repository implementations.
//!
//! Documents live in three collections (`events`, `locks`, `catalogs`) with
//! the field layout of the core models; timestamps persist as
//! `{seconds, nanos}`. Uniqueness (including the lock mutual-exclusion key)
//! is enforced by the indexes from [`crate::indexes`]; duplicate-key write
//! failures surface as `Conflict` so the arbiter can report the holder.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{
    ClientOptions, FindOneAndUpdateOptions, IndexOptions, ReturnDocument, Tls, TlsOptions,
};
use mongodb::{Client, Collection, Database, IndexModel};
use uuid::Uuid;

use tracker_core::{CatalogEntry, Error, Event, Lock, Result, Timestamp};

use crate::config::StoreConfig;
use crate::filter::{DateBounds, EventFilter, StatsFilter};
use crate::indexes::{catalog_indexes, event_indexes, lock_indexes, IndexSpec};
use crate::repository::{
    CatalogRepository, EventLookup, EventRepository, LockLookup, LockRepository, MonthlyBucket,
};

/// Events collection name.
pub const EVENTS_COLLECTION: &str = "events";
/// Locks collection name.
pub const LOCKS_COLLECTION: &str = "locks";
/// Catalogs collection name.
pub const CATALOGS_COLLECTION: &str = "catalogs";

/// Upper bound on startup index ensuring.
const INDEX_TIMEOUT: Duration = Duration::from_secs(30);

/// Connects to the document store described by the config and returns a
/// handle on its logical database.
///
/// The client itself is lazy; connectivity problems surface on first use.
///
/// # Errors
///
/// Returns a dependency error when the connection URI or TLS settings are
/// rejected by the driver.
pub async fn connect(config: &StoreConfig) -> Result<Database> {
    let mut options = ClientOptions::parse(config.connection_uri())
        .await
        .map_err(|e| Error::dependency_with_source("invalid store connection options", e))?;

    if let Some(ca_file) = &config.ca_file {
        let mut tls = TlsOptions::default();
        tls.ca_file_path = Some(PathBuf::from(ca_file));
        if let Some(cert_file) = &config.cert_file {
            tls.cert_key_file_path = Some(PathBuf::from(cert_file));
        }
        options.tls = Some(Tls::Enabled(tls));
    }

    let client = Client::with_options(options)
        .map_err(|e| Error::dependency_with_source("failed to build store client", e))?;
    Ok(client.database(&config.name))
}

/// Idempotently creates every secondary index, bounded to 30 seconds.
///
/// Pre-existing identical indexes are a no-op on the server side.
///
/// # Errors
///
/// Returns a dependency error when index creation fails or times out.
pub async fn ensure_indexes(db: &Database) -> Result<()> {
    let ensure = async {
        create_collection_indexes(db, EVENTS_COLLECTION, &event_indexes()).await?;
        create_collection_indexes(db, LOCKS_COLLECTION, &lock_indexes()).await?;
        create_collection_indexes(db, CATALOGS_COLLECTION, &catalog_indexes()).await?;
        Ok(())
    };
    tokio::time::timeout(INDEX_TIMEOUT, ensure)
        .await
        .map_err(|_| Error::dependency("index ensuring timed out after 30s"))?
}

async fn create_collection_indexes(
    db: &Database,
    collection: &str,
    specs: &[IndexSpec],
) -> Result<()> {
    let models: Vec<IndexModel> = specs.iter().map(to_index_model).collect();
    db.collection::<Document>(collection)
        .create_indexes(models, None)
        .await
        .map_err(|e| {
            Error::dependency_with_source(format!("failed to create {collection} indexes"), e)
        })?;
    tracing::info!(collection, indexes = specs.len(), "indexes ensured");
    Ok(())
}

fn to_index_model(spec: &IndexSpec) -> IndexModel {
    let mut keys = Document::new();
    for (field, order) in &spec.keys {
        keys.insert((*field).to_string(), order.direction());
    }

    let mut options = IndexOptions::default();
    options.name = Some(spec.name.to_string());
    if spec.unique {
        options.unique = Some(true);
    }
    if spec.sparse {
        options.sparse = Some(true);
    }
    if let Some(field) = spec.partial_nonempty {
        options.partial_filter_expression = Some(doc! { field: { "$gt": "" } });
    }

    IndexModel::builder().keys(keys).options(options).build()
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        ErrorKind::BulkWrite(bulk) => bulk
            .write_errors
            .as_ref()
            .is_some_and(|errors| errors.iter().any(|e| e.code == 11000)),
        _ => false,
    }
}

fn storage_err(context: &str, err: mongodb::error::Error) -> Error {
    Error::dependency_with_source(context.to_string(), err)
}

fn event_lookup_doc(lookup: &EventLookup) -> Document {
    match lookup {
        EventLookup::Id(id) => doc! { "metadata.id": id },
        EventLookup::SlackId(slack_id) => doc! { "metadata.slack_id": slack_id },
    }
}

fn lock_lookup_doc(lookup: &LockLookup) -> Document {
    match lookup {
        LockLookup::Id(id) => doc! { "id": id },
        LockLookup::EventId(event_id) => doc! { "event_id": event_id },
        LockLookup::Key {
            service,
            environment,
            resource,
        } => doc! {
            "service": service,
            "environment": environment,
            "resource": resource,
        },
    }
}

fn bounds_doc(bounds: DateBounds) -> Document {
    let mut range = Document::new();
    if let Some(gte) = bounds.gte {
        range.insert("$gte", gte);
    }
    if let Some(lte) = bounds.lte {
        range.insert("$lte", lte);
    }
    range
}

fn event_filter_doc(filter: &EventFilter) -> Document {
    let mut document = Document::new();
    if let Some(source) = &filter.source {
        document.insert("attributes.source", source);
    }
    if let Some(event_type) = filter.event_type {
        document.insert("attributes.type", event_type.to_string());
    }
    if let Some(priority) = filter.priority {
        document.insert("attributes.priority", priority.to_string());
    }
    if let Some(environment) = filter.environment {
        document.insert("attributes.environment", environment.to_string());
    }
    if let Some(status) = filter.status {
        document.insert("attributes.status", status.to_string());
    }
    if let Some(service) = &filter.service {
        document.insert("attributes.service", service);
    }
    if !filter.start_date.is_empty() {
        document.insert("attributes.start_date.seconds", bounds_doc(filter.start_date));
    }
    document
}

fn stats_filter_doc(filter: &StatsFilter) -> Document {
    let mut document = doc! {
        "metadata.created_at.seconds": {
            "$gte": filter.created_gte,
            "$lte": filter.created_lte,
        },
    };
    if !filter.environments.is_empty() {
        let values: Vec<Bson> = filter
            .environments
            .iter()
            .map(|v| Bson::String(v.to_string()))
            .collect();
        document.insert("attributes.environment", doc! { "$in": values });
    }
    if let Some(impact) = filter.impact {
        document.insert("attributes.impact", impact);
    }
    if !filter.priorities.is_empty() {
        let values: Vec<Bson> = filter
            .priorities
            .iter()
            .map(|v| Bson::String(v.to_string()))
            .collect();
        document.insert("attributes.priority", doc! { "$in": values });
    }
    if !filter.types.is_empty() {
        let values: Vec<Bson> = filter
            .types
            .iter()
            .map(|v| Bson::String(v.to_string()))
            .collect();
        document.insert("attributes.type", doc! { "$in": values });
    }
    if !filter.statuses.is_empty() {
        let values: Vec<Bson> = filter
            .statuses
            .iter()
            .map(|v| Bson::String(v.to_string()))
            .collect();
        document.insert("attributes.status", doc! { "$in": values });
    }
    if let Some(source) = &filter.source {
        document.insert("attributes.source", source);
    }
    if let Some(service) = &filter.service {
        document.insert("attributes.service", service);
    }
    document
}

fn to_document<T: serde::Serialize>(value: &T) -> Result<Document> {
    mongodb::bson::to_document(value)
        .map_err(|e| Error::internal(format!("document serialization failed: {e}")))
}

fn int_field(document: &Document, key: &str) -> i64 {
    match document.get(key) {
        Some(Bson::Int32(v)) => i64::from(*v),
        Some(Bson::Int64(v)) => *v,
        Some(Bson::Double(v)) => *v as i64,
        _ => 0,
    }
}

/// MongoDB-backed event repository.
#[derive(Debug, Clone)]
pub struct MongoEventRepository {
    collection: Collection<Event>,
}

impl MongoEventRepository {
    /// Creates the repository over the `events` collection.
    #[must_use]
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(EVENTS_COLLECTION),
        }
    }
}

#[async_trait]
impl EventRepository for MongoEventRepository {
    async fn list(&self) -> Result<Vec<Event>> {
        let cursor = self
            .collection
            .find(Document::new(), None)
            .await
            .map_err(|e| storage_err("failed to list events", e))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| storage_err("failed to read events cursor", e))
    }

    async fn get(&self, lookup: &EventLookup) -> Result<Option<Event>> {
        self.collection
            .find_one(event_lookup_doc(lookup), None)
            .await
            .map_err(|e| storage_err("failed to get event", e))
    }

    async fn create(&self, mut event: Event) -> Result<Event> {
        event.metadata.id = Uuid::new_v4().to_string();
        event.metadata.created_at = Timestamp::now();

        self.collection.insert_one(&event, None).await.map_err(|e| {
            if is_duplicate_key(&e) {
                Error::conflict(format!("duplicate key: event id {}", event.metadata.id))
            } else {
                storage_err("failed to insert event", e)
            }
        })?;
        Ok(event)
    }

    async fn update(&self, lookup: &EventLookup, event: Event) -> Result<Event> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let update = doc! { "$set": to_document(&event)? };
        self.collection
            .find_one_and_update(event_lookup_doc(lookup), update, options)
            .await
            .map_err(|e| storage_err("failed to update event", e))?
            .ok_or_else(|| Error::internal("update returned no document"))
    }

    async fn delete(&self, lookup: &EventLookup) -> Result<()> {
        self.collection
            .delete_one(event_lookup_doc(lookup), None)
            .await
            .map_err(|e| storage_err("failed to delete event", e))?;
        Ok(())
    }

    async fn search(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let cursor = self
            .collection
            .find(event_filter_doc(filter), None)
            .await
            .map_err(|e| storage_err("failed to search events", e))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| storage_err("failed to read search cursor", e))
    }

    async fn count_with_filter(&self, filter: &StatsFilter) -> Result<u64> {
        self.collection
            .count_documents(stats_filter_doc(filter), None)
            .await
            .map_err(|e| storage_err("failed to count events", e))
    }

    async fn aggregate_by_month(
        &self,
        filter: &StatsFilter,
        group_by_service: bool,
    ) -> Result<Vec<MonthlyBucket>> {
        let mut group_id = doc! {
            "year": { "$year": "$bucket_date" },
            "month": { "$month": "$bucket_date" },
        };
        if group_by_service {
            group_id.insert("service", "$attributes.service");
        }

        let pipeline = vec![
            doc! { "$match": stats_filter_doc(filter) },
            doc! { "$addFields": {
                "bucket_date": {
                    "$toDate": { "$multiply": ["$metadata.created_at.seconds", 1000_i64] },
                },
            }},
            doc! { "$group": { "_id": group_id, "count": { "$sum": 1 } } },
            doc! { "$sort": { "_id.year": 1, "_id.month": 1, "_id.service": 1 } },
        ];

        let cursor = self
            .collection
            .aggregate(pipeline, None)
            .await
            .map_err(|e| storage_err("failed to aggregate events by month", e))?;
        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| storage_err("failed to read aggregation cursor", e))?;

        let mut buckets = Vec::with_capacity(documents.len());
        for document in documents {
            let id = document
                .get_document("_id")
                .map_err(|e| Error::internal(format!("malformed aggregation bucket: {e}")))?;
            buckets.push(MonthlyBucket {
                year: i32::try_from(int_field(id, "year")).unwrap_or_default(),
                month: u32::try_from(int_field(id, "month")).unwrap_or_default(),
                count: u64::try_from(int_field(&document, "count")).unwrap_or_default(),
                service: group_by_service
                    .then(|| id.get_str("service").unwrap_or_default().to_string()),
            });
        }
        Ok(buckets)
    }
}

/// MongoDB-backed lock repository.
#[derive(Debug, Clone)]
pub struct MongoLockRepository {
    collection: Collection<Lock>,
}

impl MongoLockRepository {
    /// Creates the repository over the `locks` collection.
    #[must_use]
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(LOCKS_COLLECTION),
        }
    }
}

#[async_trait]
impl LockRepository for MongoLockRepository {
    async fn list(&self) -> Result<Vec<Lock>> {
        let cursor = self
            .collection
            .find(Document::new(), None)
            .await
            .map_err(|e| storage_err("failed to list locks", e))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| storage_err("failed to read locks cursor", e))
    }

    async fn get(&self, lookup: &LockLookup) -> Result<Option<Lock>> {
        self.collection
            .find_one(lock_lookup_doc(lookup), None)
            .await
            .map_err(|e| storage_err("failed to get lock", e))
    }

    async fn create(&self, mut lock: Lock) -> Result<Lock> {
        lock.id = Uuid::new_v4().to_string();
        lock.created_at = Timestamp::now();

        // The unique lock-key index turns the second of two concurrent
        // creates into a duplicate-key failure here.
        self.collection.insert_one(&lock, None).await.map_err(|e| {
            if is_duplicate_key(&e) {
                Error::conflict(format!(
                    "duplicate key: lock ({}, {}, {})",
                    lock.service, lock.environment, lock.resource
                ))
            } else {
                storage_err("failed to insert lock", e)
            }
        })?;
        Ok(lock)
    }

    async fn update(&self, lookup: &LockLookup, lock: Lock) -> Result<Lock> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let update = doc! { "$set": to_document(&lock)? };
        self.collection
            .find_one_and_update(lock_lookup_doc(lookup), update, options)
            .await
            .map_err(|e| storage_err("failed to update lock", e))?
            .ok_or_else(|| Error::internal("update returned no document"))
    }

    async fn unlock(&self, lookup: &LockLookup) -> Result<u64> {
        let result = self
            .collection
            .delete_one(lock_lookup_doc(lookup), None)
            .await
            .map_err(|e| storage_err("failed to delete lock", e))?;
        Ok(result.deleted_count)
    }
}

/// MongoDB-backed catalog repository.
#[derive(Debug, Clone)]
pub struct MongoCatalogRepository {
    collection: Collection<CatalogEntry>,
}

impl MongoCatalogRepository {
    /// Creates the repository over the `catalogs` collection.
    #[must_use]
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(CATALOGS_COLLECTION),
        }
    }
}

#[async_trait]
impl CatalogRepository for MongoCatalogRepository {
    async fn list(&self) -> Result<Vec<CatalogEntry>> {
        let cursor = self
            .collection
            .find(Document::new(), None)
            .await
            .map_err(|e| storage_err("failed to list catalogs", e))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| storage_err("failed to read catalogs cursor", e))
    }

    async fn get(&self, name: &str) -> Result<Option<CatalogEntry>> {
        self.collection
            .find_one(doc! { "name": name }, None)
            .await
            .map_err(|e| storage_err("failed to get catalog", e))
    }

    async fn upsert(&self, name: &str, entry: CatalogEntry) -> Result<CatalogEntry> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let update = doc! { "$set": to_document(&entry)? };
        self.collection
            .find_one_and_update(doc! { "name": name }, update, options)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    Error::conflict(format!("duplicate key: catalog {name}"))
                } else {
                    storage_err("failed to upsert catalog", e)
                }
            })?
            .ok_or_else(|| Error::internal("upsert returned no document"))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.collection
            .delete_one(doc! { "name": name }, None)
            .await
            .map_err(|e| storage_err("failed to delete catalog", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexes::LOCK_KEY_INDEX;
    use tracker_core::{Environment, EventType, Priority, Status};

    #[test]
    fn event_filter_doc_shape() {
        let filter = EventFilter {
            service: Some("api".to_string()),
            status: Some(Status::InProgress),
            event_type: Some(EventType::Deployment),
            start_date: DateBounds {
                gte: Some(100),
                lte: Some(200),
            },
            ..EventFilter::default()
        };
        let document = event_filter_doc(&filter);
        assert_eq!(document.get_str("attributes.service").unwrap(), "api");
        assert_eq!(document.get_str("attributes.status").unwrap(), "in_progress");
        assert_eq!(document.get_str("attributes.type").unwrap(), "deployment");
        let range = document
            .get_document("attributes.start_date.seconds")
            .unwrap();
        assert_eq!(range.get_i64("$gte").unwrap(), 100);
        assert_eq!(range.get_i64("$lte").unwrap(), 200);
    }

    #[test]
    fn stats_filter_doc_always_keys_created_at() {
        let filter = StatsFilter {
            created_gte: 10,
            created_lte: 20,
            environments: vec![Environment::Production, Environment::Uat],
            impact: Some(true),
            priorities: vec![Priority::P1],
            ..StatsFilter::default()
        };
        let document = stats_filter_doc(&filter);
        let range = document
            .get_document("metadata.created_at.seconds")
            .unwrap();
        assert_eq!(range.get_i64("$gte").unwrap(), 10);
        assert_eq!(range.get_i64("$lte").unwrap(), 20);
        assert!(document.get_document("attributes.environment").is_ok());
        assert_eq!(document.get_bool("attributes.impact").unwrap(), true);
    }

    #[test]
    fn index_model_carries_partial_filter() {
        let spec = lock_indexes()
            .into_iter()
            .find(|s| s.name == LOCK_KEY_INDEX)
            .unwrap();
        let model = to_index_model(&spec);
        let options = model.options.expect("options set");
        assert_eq!(options.unique, Some(true));
        let partial = options.partial_filter_expression.expect("partial filter");
        assert_eq!(
            partial.get_document("service").unwrap().get_str("$gt").unwrap(),
            ""
        );
    }

    #[test]
    fn event_documents_roundtrip_through_bson() {
        let mut event = Event::default();
        event.metadata.id = "abc".to_string();
        event.metadata.created_at = Timestamp {
            seconds: 42,
            nanos: 7,
        };
        event.attributes.status = Status::Start;
        let document = to_document(&event).unwrap();
        assert_eq!(
            document
                .get_document("metadata")
                .unwrap()
                .get_str("id")
                .unwrap(),
            "abc"
        );
        let roundtrip: Event = mongodb::bson::from_document(document).unwrap();
        assert_eq!(roundtrip, event);
    }
}
