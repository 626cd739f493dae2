//! Event engine: lifecycle CRUD, changelog derivation, statistics, and
//! coordination with the lock arbiter.
//!
//! Coordination order is fixed: on create, the lock is acquired *before* the
//! event is persisted (fail fast when contested) and released again if the
//! persist fails, so a failed create never strands a lock. On update, the
//! event is persisted first and the release runs second; a failed release is
//! downgraded to a warning because the update already committed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use tracker_core::policy::{resource_for, should_create_lock, should_release_lock};
use tracker_core::{
    is_uuid, ChangeType, ChangelogEntry, Environment, Error, Event, EventAttributes, EventLinks,
    EventMetadata, EventType, Priority, Result, Status, Timestamp,
};
use tracker_store::filter::parse_date;
use tracker_store::{
    EventFilter, EventLookup, EventRepository, SearchQuery, StatsFilter, StatsQuery,
};

use crate::lock::{CreateLockRequest, LockArbiter, UpdateLockRequest};
use crate::metrics::LifecycleMetrics;

/// Event attributes as accepted from clients: dates arrive as strings in any
/// of the tolerated layouts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct EventAttributesRequest {
    /// Free-form description.
    pub message: String,
    /// Originating system.
    pub source: String,
    /// Activity kind.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Priority.
    pub priority: Priority,
    /// User-visible impact.
    pub impact: bool,
    /// Environment.
    pub environment: Environment,
    /// Owning user.
    pub owner: String,
    /// Related event id.
    pub related_id: String,
    /// Target service.
    pub service: String,
    /// Lifecycle status.
    pub status: Status,
    /// Start instant, tolerant ISO-8601 string.
    pub start_date: String,
    /// End instant, tolerant ISO-8601 string.
    pub end_date: String,
    /// People to keep informed.
    pub stakeholders: Vec<String>,
    /// Notification channels already used.
    pub notifications: Vec<String>,
}

impl EventAttributesRequest {
    /// Converts into stored attributes, parsing the date strings.
    ///
    /// # Errors
    ///
    /// Returns a validation error when a non-empty date does not match any
    /// accepted layout.
    pub fn into_attributes(self) -> Result<EventAttributes> {
        let start_date = parse_optional_date(&self.start_date)?;
        let end_date = parse_optional_date(&self.end_date)?;
        Ok(EventAttributes {
            message: self.message,
            source: self.source,
            event_type: self.event_type,
            priority: self.priority,
            impact: self.impact,
            environment: self.environment,
            owner: self.owner,
            related_id: self.related_id,
            service: self.service,
            status: self.status,
            start_date,
            end_date,
            stakeholders: self.stakeholders,
            notifications: self.notifications,
        })
    }
}

fn parse_optional_date(input: &str) -> Result<Option<Timestamp>> {
    if input.is_empty() {
        return Ok(None);
    }
    parse_date(input).map(|dt| Some(Timestamp::from_datetime(dt)))
}

/// Request to create an event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateEventRequest {
    /// Short title.
    pub title: String,
    /// Attributes.
    pub attributes: EventAttributesRequest,
    /// External links.
    pub links: EventLinks,
    /// Optional external id to attach at creation.
    pub slack_id: String,
}

/// Request to update an event. Resolution key is `slack_id` when non-empty,
/// `id` otherwise.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateEventRequest {
    /// Event id (UUID).
    pub id: String,
    /// External id, used as the resolution key when non-empty.
    pub slack_id: String,
    /// New title.
    pub title: String,
    /// New attributes.
    pub attributes: EventAttributesRequest,
    /// New links.
    pub links: EventLinks,
}

/// A changelog entry as accepted from clients; the timestamp defaults to
/// the server clock when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct NewChangelogEntry {
    /// When the change happened; defaults to now.
    pub timestamp: Option<Timestamp>,
    /// Who made the change.
    pub user: String,
    /// Change kind.
    pub change_type: ChangeType,
    /// Field that changed.
    pub field: String,
    /// Prior value.
    pub old_value: String,
    /// New value.
    pub new_value: String,
    /// Free-form annotation.
    pub comment: String,
}

/// A list of events with its count.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventPage {
    /// Matching events.
    pub events: Vec<Event>,
    /// Number of events returned.
    pub total_count: u64,
}

/// One page of an event's changelog.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChangelogPage {
    /// Entries in the requested page.
    pub changelog: Vec<ChangelogEntry>,
    /// Total entries across all pages.
    pub total_count: u64,
}

/// Count of events in a date range.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventStats {
    /// Matching event count.
    pub total_count: u64,
    /// Echo of the requested range start.
    pub start_date: String,
    /// Echo of the requested range end.
    pub end_date: String,
}

/// One month bucket of the stats aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MonthlyStats {
    /// Calendar year (UTC).
    pub year: i32,
    /// Calendar month, 1-12 (UTC).
    pub month: u32,
    /// Events in the bucket.
    pub count: u64,
    /// Service, empty unless grouping by service.
    #[serde(default)]
    pub service: String,
}

/// Month-bucketed statistics.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MonthlyStatsReport {
    /// Buckets sorted ascending by `(year, month, service)`.
    pub stats: Vec<MonthlyStats>,
    /// Sum over all buckets.
    pub total_count: u64,
    /// Echo of the requested range start.
    pub start_date: String,
    /// Echo of the requested range end.
    pub end_date: String,
}

/// The event lifecycle engine.
#[derive(Clone)]
pub struct EventEngine {
    events: Arc<dyn EventRepository>,
    locks: LockArbiter,
    metrics: Arc<dyn LifecycleMetrics>,
}

impl EventEngine {
    /// Creates an engine over the given collaborators.
    #[must_use]
    pub fn new(
        events: Arc<dyn EventRepository>,
        locks: LockArbiter,
        metrics: Arc<dyn LifecycleMetrics>,
    ) -> Self {
        Self {
            events,
            locks,
            metrics,
        }
    }

    /// Creates an event, acquiring the key lock first when the coordinator
    /// policy requires one.
    ///
    /// # Errors
    ///
    /// - `NotFound` when `related_id` does not resolve
    /// - `Conflict` when the key lock is already held
    /// - `Dependency` for storage failures; if the lock was already
    ///   acquired it is released before returning
    pub async fn create_event(&self, req: CreateEventRequest) -> Result<Event> {
        let attributes = req.attributes.into_attributes()?;
        let mut event = Event {
            title: req.title,
            attributes,
            links: req.links,
            metadata: EventMetadata {
                slack_id: req.slack_id,
                ..EventMetadata::default()
            },
            changelog: Vec::new(),
        };

        if !event.attributes.related_id.is_empty() {
            let related_id = event.attributes.related_id.clone();
            let related = self
                .events
                .get(&EventLookup::Id(related_id.clone()))
                .await?
                .ok_or_else(|| {
                    Error::not_found(format!(
                        "no event found in tracker for attributes.related_id {related_id}"
                    ))
                })?;
            event.metadata.duration_seconds =
                related.metadata.created_at.seconds_until(Timestamp::now());
        }

        let user = event.acting_user().to_string();
        event.append_changelog(ChangeType::Created, user.clone(), "", "", "", "Event created");

        let event_type = event.attributes.event_type;
        let status = event.attributes.status;
        let environment = event.attributes.environment;
        let service = event.attributes.service.clone();

        // Lock first, fail fast if contested.
        let mut held = None;
        if should_create_lock(event_type, status) {
            let lock_req = CreateLockRequest {
                service: service.clone(),
                who: user,
                environment: environment.to_string(),
                resource: resource_for(event_type).to_string(),
                event_id: String::new(),
            };
            match self.locks.create_lock(lock_req).await {
                Ok(lock) => held = Some(lock),
                Err(err) if err.is_conflict() => {
                    tracing::error!(
                        service = %service,
                        environment = %environment,
                        resource = resource_for(event_type),
                        error = %err,
                        "failed to create lock"
                    );
                    // Keep the holder-naming arbiter message in the
                    // user-facing error.
                    return Err(Error::conflict(format!(
                        "cannot create event: {err}. Please unlock it first"
                    )));
                }
                Err(err) => {
                    return Err(Error::dependency(format!(
                        "cannot create event: failed to create lock - {err}"
                    )));
                }
            }
        }

        let created = match self.events.create(event).await {
            Ok(created) => created,
            Err(err) => {
                // Compensating release: a lock without its event must not
                // survive the failed create.
                if let Some(lock) = held {
                    if let Err(release_err) = self.locks.unlock(&lock.id).await {
                        tracing::warn!(
                            lock_id = %lock.id,
                            error = %release_err,
                            "failed to release orphan lock after event create failure"
                        );
                    }
                }
                return Err(err);
            }
        };

        // Attach the event id to the lock; the event is already committed,
        // so a failure here only costs the back-reference.
        if let Some(lock) = held {
            let attach = UpdateLockRequest {
                event_id: created.metadata.id.clone(),
                ..UpdateLockRequest::default()
            };
            match self.locks.update_lock(&lock.id, attach).await {
                Ok(_) => tracing::info!(
                    lock_id = %lock.id,
                    event_id = %created.metadata.id,
                    service = %service,
                    environment = %environment,
                    "lock updated with event_id"
                ),
                Err(err) => tracing::warn!(
                    lock_id = %lock.id,
                    event_id = %created.metadata.id,
                    service = %service,
                    environment = %environment,
                    error = %err,
                    "failed to update lock with event_id"
                ),
            }
        }

        self.metrics.record_status(&service, status, environment);

        tracing::info!(
            title = %created.title,
            message = %created.attributes.message,
            priority = %created.attributes.priority,
            environment = %created.attributes.environment,
            owner = %created.attributes.owner,
            impact = created.attributes.impact,
            service = %created.attributes.service,
            status = %created.attributes.status,
            r#type = %created.attributes.event_type,
            pull_request = %created.links.pull_request_link,
            id = %created.metadata.id,
            created_at = %created.metadata.created_at.to_rfc3339(),
            "event created"
        );
        Ok(created)
    }

    /// Gets an event by UUID or, when the input is not a UUID, by slack id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` naming the lookup key.
    pub async fn get_event(&self, key: &str) -> Result<Event> {
        if is_uuid(key) {
            self.events
                .get(&EventLookup::Id(key.to_string()))
                .await?
                .ok_or_else(|| Error::not_found(format!("no event found in tracker for id {key}")))
        } else {
            self.events
                .get(&EventLookup::SlackId(key.to_string()))
                .await?
                .ok_or_else(|| {
                    Error::not_found(format!("no event found in tracker for slack id {key}"))
                })
        }
    }

    /// Lists every event.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn list_events(&self) -> Result<EventPage> {
        let events = self.events.list().await?;
        Ok(EventPage {
            total_count: events.len() as u64,
            events,
        })
    }

    /// Searches events with the search filter.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty filter or bad dates.
    pub async fn search_events(&self, query: &SearchQuery) -> Result<EventPage> {
        let filter = EventFilter::from_query(query)?;
        let events = self.events.search(&filter).await?;
        Ok(EventPage {
            total_count: events.len() as u64,
            events,
        })
    }

    /// Lists the events of the current UTC day.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn today_events(&self) -> Result<EventPage> {
        let today = chrono::Utc::now().format("%Y-%m-%d");
        let query = SearchQuery {
            start_date: format!("{today}T00:00:00Z"),
            end_date: format!("{today}T23:59:59Z"),
            ..SearchQuery::default()
        };
        self.search_events(&query).await
    }

    /// Updates an event, deriving changelog entries from the diff and
    /// releasing the key lock on terminal transitions.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` naming the resolution key when the event is
    /// absent. Lock release failures are logged, never propagated.
    pub async fn update_event(&self, req: UpdateEventRequest) -> Result<Event> {
        // Resolve by whichever key was supplied; exactly one query.
        let (lookup, miss) = if req.slack_id.is_empty() {
            (
                EventLookup::Id(req.id.clone()),
                format!("no event found in tracker for id {}", req.id),
            )
        } else {
            (
                EventLookup::SlackId(req.slack_id.clone()),
                format!("no event found in tracker for slack id {}", req.slack_id),
            )
        };
        let current = self
            .events
            .get(&lookup)
            .await?
            .ok_or_else(|| Error::not_found(miss))?;

        let attributes = req.attributes.into_attributes()?;
        let mut event = Event {
            title: req.title,
            attributes,
            links: req.links,
            metadata: EventMetadata {
                id: current.metadata.id.clone(),
                slack_id: if req.slack_id.is_empty() {
                    current.metadata.slack_id.clone()
                } else {
                    req.slack_id
                },
                created_at: current.metadata.created_at,
                duration_seconds: current.metadata.duration_seconds,
            },
            changelog: current.changelog.clone(),
        };

        let status = event.attributes.status;
        if status.is_terminal() && !current.attributes.status.is_terminal() {
            let duration = current.metadata.created_at.seconds_until(Timestamp::now());
            event.metadata.duration_seconds = duration;
            let service = &event.attributes.service;
            let environment = event.attributes.environment;
            self.metrics.record_status(service, status, environment);
            self.metrics
                .observe_duration(service, status, environment, duration as f64);
        }

        let user = event.acting_user().to_string();

        // An approval is an ownership change with nothing else moving.
        let is_approval = current.attributes.owner != event.attributes.owner
            && current.attributes.status == event.attributes.status
            && current.attributes.priority == event.attributes.priority
            && current.title == event.title;

        let untouched_len = event.changelog.len();
        if current.attributes.status != event.attributes.status {
            event.append_changelog(
                ChangeType::StatusChanged,
                user.clone(),
                "status",
                current.attributes.status.to_string(),
                event.attributes.status.to_string(),
                "Status updated",
            );
        }
        if current.links.ticket != event.links.ticket && !event.links.ticket.is_empty() {
            let new_ticket = event.links.ticket.clone();
            event.append_changelog(
                ChangeType::Linked,
                user.clone(),
                "ticket",
                current.links.ticket.clone(),
                new_ticket,
                "Jira ticket linked",
            );
        }
        if current.attributes.priority != event.attributes.priority {
            event.append_changelog(
                ChangeType::Updated,
                user.clone(),
                "priority",
                current.attributes.priority.to_string(),
                event.attributes.priority.to_string(),
                "Priority updated",
            );
        }
        if current.title != event.title {
            let new_title = event.title.clone();
            event.append_changelog(
                ChangeType::Updated,
                user.clone(),
                "title",
                current.title.clone(),
                new_title,
                "Title updated",
            );
        }
        if event.changelog.len() == untouched_len {
            if is_approval {
                let comment = format!("Event approved by {user}");
                event.append_changelog(ChangeType::Approved, user.clone(), "", "", "", comment);
            } else {
                event.append_changelog(ChangeType::Updated, user.clone(), "", "", "", "Event updated");
            }
        }

        let updated = self.events.update(&lookup, event).await?;

        if should_release_lock(updated.attributes.event_type, updated.attributes.status) {
            match self.locks.unlock_by_event_id(&updated.metadata.id).await {
                Ok(()) => tracing::info!(
                    event_id = %updated.metadata.id,
                    service = %updated.attributes.service,
                    status = %updated.attributes.status,
                    "lock released for event"
                ),
                Err(err) => tracing::warn!(
                    event_id = %updated.metadata.id,
                    service = %updated.attributes.service,
                    error = %err,
                    "failed to release lock"
                ),
            }
        }

        Ok(updated)
    }

    /// Deletes an event by id.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn delete_event(&self, id: &str) -> Result<()> {
        self.events.delete(&EventLookup::Id(id.to_string())).await
    }

    /// Appends a caller-provided changelog entry.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` naming the id when the event is absent.
    pub async fn add_changelog_entry(&self, id: &str, entry: NewChangelogEntry) -> Result<Event> {
        let lookup = EventLookup::Id(id.to_string());
        let mut event = self
            .events
            .get(&lookup)
            .await?
            .ok_or_else(|| Error::not_found(format!("event not found with id {id}")))?;

        let entry = ChangelogEntry {
            timestamp: entry.timestamp.unwrap_or_else(Timestamp::now),
            user: entry.user,
            change_type: entry.change_type,
            field: entry.field,
            old_value: entry.old_value,
            new_value: entry.new_value,
            comment: entry.comment,
        };
        tracing::info!(
            event_id = id,
            user = %entry.user,
            change_type = %entry.change_type,
            "changelog entry added"
        );
        event.changelog.push(entry);

        self.events.update(&lookup, event).await
    }

    /// Returns one page of an event's changelog.
    ///
    /// Defaults: page 1, 50 entries per page. Out-of-range pages return an
    /// empty slice with the true total.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` naming the id when the event is absent.
    pub async fn get_event_changelog(
        &self,
        id: &str,
        page: Option<u32>,
        per_page: Option<u32>,
    ) -> Result<ChangelogPage> {
        let event = self
            .events
            .get(&EventLookup::Id(id.to_string()))
            .await?
            .ok_or_else(|| Error::not_found(format!("event not found with id {id}")))?;

        let page = page.unwrap_or(1);
        let per_page = per_page.unwrap_or(50) as usize;
        let total_count = event.changelog.len();

        let start = page.saturating_sub(1) as usize * per_page;
        if start >= total_count {
            return Ok(ChangelogPage {
                changelog: Vec::new(),
                total_count: total_count as u64,
            });
        }
        let end = (start + per_page).min(total_count);

        Ok(ChangelogPage {
            changelog: event.changelog[start..end].to_vec(),
            total_count: total_count as u64,
        })
    }

    /// Attaches a slack id to an event. One-shot: fails once a slack id is
    /// set.
    ///
    /// # Errors
    ///
    /// - `NotFound` naming the id when the event is absent
    /// - `Validation` when `slack_id` is empty
    /// - `Conflict` naming the existing slack id when one is already set
    pub async fn add_slack_id(&self, id: &str, slack_id: &str) -> Result<Event> {
        let lookup = EventLookup::Id(id.to_string());
        let mut event = self
            .events
            .get(&lookup)
            .await?
            .ok_or_else(|| Error::not_found(format!("event not found with id {id}")))?;

        if slack_id.is_empty() {
            return Err(Error::validation("slack_id cannot be empty"));
        }
        if !event.metadata.slack_id.is_empty() {
            return Err(Error::conflict(format!(
                "event already has a slack_id: {}",
                event.metadata.slack_id
            )));
        }

        event.metadata.slack_id = slack_id.to_string();
        let user = event.acting_user().to_string();
        event.append_changelog(
            ChangeType::Linked,
            user,
            "slack_id",
            "",
            slack_id,
            "Slack message linked",
        );

        let updated = self.events.update(&lookup, event).await?;
        tracing::info!(event_id = id, slack_id, "slack_id added to event");
        Ok(updated)
    }

    /// Counts events matching the stats filter.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the date pair is missing or inverted.
    pub async fn get_event_stats(&self, query: &StatsQuery) -> Result<EventStats> {
        let filter = StatsFilter::from_query(query)?;
        let total_count = self.events.count_with_filter(&filter).await?;

        tracing::info!(
            start_date = %query.start_date,
            end_date = %query.end_date,
            count = total_count,
            "event stats retrieved"
        );
        Ok(EventStats {
            total_count,
            start_date: query.start_date.clone(),
            end_date: query.end_date.clone(),
        })
    }

    /// Buckets events matching the stats filter by UTC `(year, month)`,
    /// optionally grouped by service.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the date pair is missing or inverted.
    pub async fn get_event_stats_by_month(
        &self,
        query: &StatsQuery,
        group_by_service: bool,
    ) -> Result<MonthlyStatsReport> {
        let filter = StatsFilter::from_query(query)?;
        let buckets = self
            .events
            .aggregate_by_month(&filter, group_by_service)
            .await?;

        let mut total_count = 0;
        let stats: Vec<MonthlyStats> = buckets
            .into_iter()
            .map(|bucket| {
                total_count += bucket.count;
                MonthlyStats {
                    year: bucket.year,
                    month: bucket.month,
                    count: bucket.count,
                    service: bucket.service.unwrap_or_default(),
                }
            })
            .collect();

        tracing::info!(
            start_date = %query.start_date,
            end_date = %query.end_date,
            months_count = stats.len(),
            total_count,
            group_by_service,
            "event stats by month retrieved"
        );
        Ok(MonthlyStatsReport {
            stats,
            total_count,
            start_date: query.start_date.clone(),
            end_date: query.end_date.clone(),
        })
    }
}
