//! Integration tests for the event-lock coordinator over in-memory
//! repositories and a recording metrics sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use tracker_core::{Environment, Error, Event, EventType, Priority, Result, Status};
use tracker_engine::{
    CreateEventRequest, CreateLockRequest, EventAttributesRequest, EventEngine, LockArbiter,
    RecordingLifecycleMetrics, UpdateEventRequest,
};
use tracker_store::{
    EventFilter, EventLookup, EventRepository, LockRepository, MemoryEventRepository,
    MemoryLockRepository, StatsFilter, StatsQuery,
};

struct Harness {
    engine: EventEngine,
    arbiter: LockArbiter,
    events: Arc<MemoryEventRepository>,
    locks: Arc<MemoryLockRepository>,
    metrics: Arc<RecordingLifecycleMetrics>,
}

fn harness() -> Harness {
    let events = Arc::new(MemoryEventRepository::new());
    let locks = Arc::new(MemoryLockRepository::new());
    let metrics = Arc::new(RecordingLifecycleMetrics::new());
    let arbiter = LockArbiter::new(locks.clone(), events.clone());
    let engine = EventEngine::new(events.clone(), arbiter.clone(), metrics.clone());
    Harness {
        engine,
        arbiter,
        events,
        locks,
        metrics,
    }
}

fn deployment_request(service: &str, owner: &str) -> CreateEventRequest {
    CreateEventRequest {
        title: "rollout".to_string(),
        attributes: EventAttributesRequest {
            event_type: EventType::Deployment,
            status: Status::Start,
            service: service.to_string(),
            environment: Environment::Production,
            owner: owner.to_string(),
            ..EventAttributesRequest::default()
        },
        ..CreateEventRequest::default()
    }
}

fn update_request(event: &Event, status: Status) -> UpdateEventRequest {
    UpdateEventRequest {
        id: event.metadata.id.clone(),
        slack_id: String::new(),
        title: event.title.clone(),
        attributes: EventAttributesRequest {
            message: event.attributes.message.clone(),
            source: event.attributes.source.clone(),
            event_type: event.attributes.event_type,
            priority: event.attributes.priority,
            impact: event.attributes.impact,
            environment: event.attributes.environment,
            owner: event.attributes.owner.clone(),
            related_id: event.attributes.related_id.clone(),
            service: event.attributes.service.clone(),
            status,
            ..EventAttributesRequest::default()
        },
        links: event.links.clone(),
    }
}

#[tokio::test]
async fn coordinated_create_links_lock_and_event() -> Result<()> {
    let h = harness();
    let event = h.engine.create_event(deployment_request("api", "alice")).await?;

    assert!(tracker_core::is_uuid(&event.metadata.id));
    assert!(!event.metadata.created_at.is_zero());
    assert_eq!(event.changelog.len(), 1);
    assert_eq!(event.changelog[0].user, "alice");

    let locks = h.arbiter.list_locks().await?;
    assert_eq!(locks.len(), 1);
    let lock = &locks[0];
    assert_eq!(lock.service, "api");
    assert_eq!(lock.environment, "production");
    assert_eq!(lock.resource, "deployment");
    assert_eq!(lock.who, "alice");
    assert_eq!(lock.event_id, event.metadata.id);
    Ok(())
}

#[tokio::test]
async fn contested_create_names_holder() -> Result<()> {
    let h = harness();
    h.engine.create_event(deployment_request("api", "alice")).await?;

    let err = h
        .engine
        .create_event(deployment_request("api", "bob"))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    let message = err.to_string();
    assert!(message.contains("api"));
    assert!(message.contains("production"));
    Ok(())
}

#[tokio::test]
async fn direct_lock_conflict_names_holder_and_ids() -> Result<()> {
    let h = harness();
    let held = h
        .arbiter
        .create_lock(CreateLockRequest {
            service: "api".to_string(),
            who: "alice".to_string(),
            environment: "production".to_string(),
            resource: "deployment".to_string(),
            event_id: String::new(),
        })
        .await?;

    let err = h
        .arbiter
        .create_lock(CreateLockRequest {
            service: "api".to_string(),
            who: "bob".to_string(),
            environment: "production".to_string(),
            resource: "deployment".to_string(),
            event_id: String::new(),
        })
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    let message = err.to_string();
    assert!(message.contains("alice"));
    assert!(message.contains(&held.id));
    Ok(())
}

#[tokio::test]
async fn concurrent_lock_creates_one_winner() {
    let h = harness();
    let request = || CreateLockRequest {
        service: "api".to_string(),
        who: "racer".to_string(),
        environment: "production".to_string(),
        resource: "deployment".to_string(),
        event_id: String::new(),
    };

    let (a, b) = tokio::join!(
        h.arbiter.create_lock(request()),
        h.arbiter.create_lock(request())
    );
    let successes = usize::from(a.is_ok()) + usize::from(b.is_ok());
    assert_eq!(successes, 1, "exactly one acquisition must win");
    let loser = if a.is_err() { a } else { b };
    assert!(loser.unwrap_err().is_conflict());
}

#[tokio::test]
async fn unlock_by_event_id_is_idempotent() -> Result<()> {
    let h = harness();
    let event = h.engine.create_event(deployment_request("api", "alice")).await?;

    h.arbiter.unlock_by_event_id(&event.metadata.id).await?;
    h.arbiter.unlock_by_event_id(&event.metadata.id).await?;
    assert!(h.locks.list().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn terminal_transition_releases_lock_and_emits_once() -> Result<()> {
    let h = harness();
    let event = h.engine.create_event(deployment_request("api", "alice")).await?;
    assert_eq!(h.metrics.count_total(), 1);
    assert_eq!(h.metrics.observation_total(), 0);

    let updated = h
        .engine
        .update_event(update_request(&event, Status::Success))
        .await?;

    assert!(updated.metadata.duration_seconds >= 0);
    assert!(updated.metadata.duration_seconds <= 1);
    assert_eq!(h.metrics.count_total(), 2);
    assert_eq!(h.metrics.observation_total(), 1);
    assert!(h.locks.list().await?.is_empty(), "lock must be released");
    assert!(updated
        .changelog
        .iter()
        .any(|e| e.change_type == tracker_core::ChangeType::StatusChanged));

    // A second update at success must not emit again.
    let again = h
        .engine
        .update_event(update_request(&updated, Status::Success))
        .await?;
    assert_eq!(h.metrics.count_total(), 2);
    assert_eq!(h.metrics.observation_total(), 1);
    assert!(again.changelog.len() >= updated.changelog.len());
    Ok(())
}

#[tokio::test]
async fn changelog_is_append_only_and_monotonic() -> Result<()> {
    let h = harness();
    let mut event = h.engine.create_event(deployment_request("api", "alice")).await?;
    let mut previous_len = event.changelog.len();
    let first_entry = event.changelog[0].clone();

    for status in [Status::InProgress, Status::Success, Status::Success] {
        event = h.engine.update_event(update_request(&event, status)).await?;
        assert!(event.changelog.len() >= previous_len);
        assert_eq!(event.changelog[0], first_entry, "seed entry must not change");
        for pair in event.changelog.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
        previous_len = event.changelog.len();
    }
    Ok(())
}

#[tokio::test]
async fn owner_only_change_is_an_approval() -> Result<()> {
    let h = harness();
    let event = h.engine.create_event(deployment_request("api", "alice")).await?;

    let mut req = update_request(&event, event.attributes.status);
    req.attributes.owner = "bob".to_string();
    let updated = h.engine.update_event(req).await?;

    let last = updated.changelog.last().unwrap();
    assert_eq!(last.change_type, tracker_core::ChangeType::Approved);
    assert!(last.comment.contains("bob"));
    Ok(())
}

#[tokio::test]
async fn priority_change_appends_updated_entry() -> Result<()> {
    let h = harness();
    let event = h.engine.create_event(deployment_request("api", "alice")).await?;

    let mut req = update_request(&event, event.attributes.status);
    req.attributes.priority = Priority::P1;
    let updated = h.engine.update_event(req).await?;

    let last = updated.changelog.last().unwrap();
    assert_eq!(last.change_type, tracker_core::ChangeType::Updated);
    assert_eq!(last.field, "priority");
    Ok(())
}

#[tokio::test]
async fn ticket_link_appends_linked_entry() -> Result<()> {
    let h = harness();
    let event = h.engine.create_event(deployment_request("api", "alice")).await?;

    let mut req = update_request(&event, event.attributes.status);
    req.links.ticket = "OPS-42".to_string();
    let updated = h.engine.update_event(req).await?;

    let last = updated.changelog.last().unwrap();
    assert_eq!(last.change_type, tracker_core::ChangeType::Linked);
    assert_eq!(last.new_value, "OPS-42");
    Ok(())
}

#[tokio::test]
async fn slack_id_is_one_shot() -> Result<()> {
    let h = harness();
    let event = h.engine.create_event(deployment_request("api", "alice")).await?;

    let updated = h.engine.add_slack_id(&event.metadata.id, "CXYZ").await?;
    assert_eq!(updated.metadata.slack_id, "CXYZ");
    assert_eq!(
        updated.changelog.last().unwrap().change_type,
        tracker_core::ChangeType::Linked
    );

    let err = h
        .engine
        .add_slack_id(&event.metadata.id, "COTHER")
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(err.to_string().contains("CXYZ"));

    let err = h.engine.add_slack_id(&event.metadata.id, "").await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_) | Error::Validation(_)));

    // Lookup by the attached slack id resolves the same event.
    let by_slack = h.engine.get_event("CXYZ").await?;
    assert_eq!(by_slack.metadata.id, event.metadata.id);
    Ok(())
}

#[tokio::test]
async fn related_event_sets_duration() -> Result<()> {
    let h = harness();
    let related = h.engine.create_event(deployment_request("api", "alice")).await?;
    h.engine
        .update_event(update_request(&related, Status::Success))
        .await?;

    let mut req = deployment_request("api", "alice");
    req.attributes.event_type = EventType::Incident;
    req.attributes.related_id = related.metadata.id.clone();
    let event = h.engine.create_event(req).await?;

    // Both events were created within this test, so the derived duration
    // stays inside the one-second tolerance.
    assert!(event.metadata.duration_seconds >= 0);
    assert!(event.metadata.duration_seconds <= 1);
    Ok(())
}

#[tokio::test]
async fn missing_related_event_is_not_found() {
    let h = harness();
    let mut req = deployment_request("api", "alice");
    req.attributes.related_id = "f47ac10b-58cc-4372-a567-0e02b2c3d479".to_string();
    let err = h.engine.create_event(req).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("f47ac10b"));
}

#[tokio::test]
async fn changelog_pagination_defaults_and_bounds() -> Result<()> {
    let h = harness();
    let event = h.engine.create_event(deployment_request("api", "alice")).await?;

    let page = h
        .engine
        .get_event_changelog(&event.metadata.id, None, None)
        .await?;
    assert_eq!(page.total_count, 1);
    assert_eq!(page.changelog.len(), 1);

    let out_of_range = h
        .engine
        .get_event_changelog(&event.metadata.id, Some(7), Some(50))
        .await?;
    assert!(out_of_range.changelog.is_empty());
    assert_eq!(out_of_range.total_count, 1);

    let tiny_pages = h
        .engine
        .get_event_changelog(&event.metadata.id, Some(1), Some(0))
        .await?;
    assert!(tiny_pages.changelog.is_empty());
    Ok(())
}

#[tokio::test]
async fn monthly_stats_sorted_by_year_month_service() -> Result<()> {
    let h = harness();
    // Six events, 2/2/2 across Jan..Mar 2024 and services {a,b}, inserted
    // out of order.
    let seeds = [
        ("b", "2024-03-10T08:00:00Z"),
        ("a", "2024-01-05T08:00:00Z"),
        ("b", "2024-01-20T08:00:00Z"),
        ("a", "2024-03-01T08:00:00Z"),
        ("b", "2024-02-14T08:00:00Z"),
        ("a", "2024-02-02T08:00:00Z"),
    ];
    for (service, date) in seeds {
        let mut req = deployment_request(service, "seed");
        req.attributes.event_type = EventType::Incident;
        let mut event = h.engine.create_event(req).await?;
        let seconds = tracker_store::filter::parse_date(date)?.timestamp();
        event.metadata.created_at = tracker_core::Timestamp { seconds, nanos: 0 };
        h.events
            .update(&EventLookup::Id(event.metadata.id.clone()), event)
            .await?;
    }

    let query = StatsQuery {
        start_date: "2024-01-01".to_string(),
        end_date: "2024-03-31".to_string(),
        ..StatsQuery::default()
    };
    let report = h.engine.get_event_stats_by_month(&query, true).await?;
    assert_eq!(report.total_count, 6);
    let keys: Vec<_> = report
        .stats
        .iter()
        .map(|s| (s.year, s.month, s.service.clone()))
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

    let stats = h.engine.get_event_stats(&query).await?;
    assert_eq!(stats.total_count, 6);
    Ok(())
}

#[tokio::test]
async fn today_events_only_sees_current_day() -> Result<()> {
    let h = harness();
    let mut req = deployment_request("api", "alice");
    req.attributes.event_type = EventType::Incident;
    req.attributes.start_date = chrono::Utc::now().to_rfc3339();
    h.engine.create_event(req).await?;

    let page = h.engine.today_events().await?;
    assert_eq!(page.total_count, 1);
    Ok(())
}

#[tokio::test]
async fn search_requires_a_filter() {
    let h = harness();
    let err = h
        .engine
        .search_events(&tracker_store::SearchQuery::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "no filter for search events");
}

/// Event repository wrapper that fails `create` on demand, to exercise the
/// coordinator's compensating lock release.
struct FlakyEventRepository {
    inner: MemoryEventRepository,
    fail_create: AtomicBool,
}

#[async_trait]
impl EventRepository for FlakyEventRepository {
    async fn list(&self) -> Result<Vec<Event>> {
        self.inner.list().await
    }
    async fn get(&self, lookup: &EventLookup) -> Result<Option<Event>> {
        self.inner.get(lookup).await
    }
    async fn create(&self, event: Event) -> Result<Event> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::dependency("simulated event insert failure"));
        }
        self.inner.create(event).await
    }
    async fn update(&self, lookup: &EventLookup, event: Event) -> Result<Event> {
        self.inner.update(lookup, event).await
    }
    async fn delete(&self, lookup: &EventLookup) -> Result<()> {
        self.inner.delete(lookup).await
    }
    async fn search(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        self.inner.search(filter).await
    }
    async fn count_with_filter(&self, filter: &StatsFilter) -> Result<u64> {
        self.inner.count_with_filter(filter).await
    }
    async fn aggregate_by_month(
        &self,
        filter: &StatsFilter,
        group_by_service: bool,
    ) -> Result<Vec<tracker_store::MonthlyBucket>> {
        self.inner.aggregate_by_month(filter, group_by_service).await
    }
}

#[tokio::test]
async fn failed_event_create_leaves_no_orphan_lock() -> Result<()> {
    let events = Arc::new(FlakyEventRepository {
        inner: MemoryEventRepository::new(),
        fail_create: AtomicBool::new(true),
    });
    let locks = Arc::new(MemoryLockRepository::new());
    let metrics = Arc::new(RecordingLifecycleMetrics::new());
    let arbiter = LockArbiter::new(locks.clone(), events.clone());
    let engine = EventEngine::new(events.clone(), arbiter.clone(), metrics);

    let err = engine
        .create_event(deployment_request("api", "alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Dependency { .. }));
    assert!(
        arbiter.list_locks().await?.is_empty(),
        "compensating release must remove the lock"
    );

    // The key is immediately reusable.
    events.fail_create.store(false, Ordering::SeqCst);
    let event = engine.create_event(deployment_request("api", "alice")).await?;
    let locks = arbiter.list_locks().await?;
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0].event_id, event.metadata.id);
    Ok(())
}

#[tokio::test]
async fn unlock_receipt_counts_deletion() -> Result<()> {
    let h = harness();
    let lock = h
        .arbiter
        .create_lock(CreateLockRequest {
            service: "api".to_string(),
            who: "alice".to_string(),
            environment: "uat".to_string(),
            resource: "operation".to_string(),
            event_id: String::new(),
        })
        .await?;

    let receipt = h.arbiter.unlock(&lock.id).await?;
    assert_eq!(receipt.message, "lock deleted");
    assert_eq!(receipt.deleted_count, 1);

    let err = h.arbiter.unlock(&lock.id).await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn unlock_cross_posts_changelog_to_event() -> Result<()> {
    let h = harness();
    let event = h.engine.create_event(deployment_request("api", "alice")).await?;
    let locks = h.arbiter.list_locks().await?;

    h.arbiter.unlock(&locks[0].id).await?;
    let reloaded = h.engine.get_event(&event.metadata.id).await?;
    assert_eq!(
        reloaded.changelog.last().unwrap().change_type,
        tracker_core::ChangeType::Unlocked
    );
    Ok(())
}
