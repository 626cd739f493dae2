//! Event domain model: the record of a software-change activity.
//!
//! An [`Event`] bundles attributes (what happened, where, with what
//! priority), links to external systems, server-minted metadata, and an
//! append-only changelog. Events are never mutated in place; every update
//! path goes through the engine, which derives changelog entries from the
//! diff before persisting.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::time::Timestamp;

/// The kind of software-change activity an event records.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Zero value; omitted from filters.
    #[default]
    UnknownType,
    /// A software deployment.
    Deployment,
    /// A manual or automated operation on a running system.
    Operation,
    /// A detected configuration drift.
    Drift,
    /// A production incident.
    Incident,
}

impl EventType {
    /// Returns true for the zero value.
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        matches!(self, Self::UnknownType)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnknownType => "unknown_type",
            Self::Deployment => "deployment",
            Self::Operation => "operation",
            Self::Drift => "drift",
            Self::Incident => "incident",
        };
        f.write_str(s)
    }
}

/// Event priority, p1 (highest) through p5.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Zero value; omitted from filters.
    #[default]
    UnknownPriority,
    /// Highest priority.
    P1,
    /// High priority.
    P2,
    /// Medium priority.
    P3,
    /// Low priority.
    P4,
    /// Lowest priority.
    P5,
}

impl Priority {
    /// Returns true for the zero value.
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        matches!(self, Self::UnknownPriority)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnknownPriority => "unknown_priority",
            Self::P1 => "p1",
            Self::P2 => "p2",
            Self::P3 => "p3",
            Self::P4 => "p4",
            Self::P5 => "p5",
        };
        f.write_str(s)
    }
}

/// Deployment environment an event applies to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Zero value; omitted from filters.
    #[default]
    UnknownEnvironment,
    /// Development environment.
    Development,
    /// Integration environment.
    Integration,
    /// User-acceptance testing environment.
    Uat,
    /// Pre-production environment.
    Preproduction,
    /// Production environment.
    Production,
    /// Maintenance (MCO) environment.
    Mco,
}

impl Environment {
    /// Returns true for the zero value.
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        matches!(self, Self::UnknownEnvironment)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnknownEnvironment => "unknown_environment",
            Self::Development => "development",
            Self::Integration => "integration",
            Self::Uat => "uat",
            Self::Preproduction => "preproduction",
            Self::Production => "production",
            Self::Mco => "mco",
        };
        f.write_str(s)
    }
}

/// Lifecycle status of an event.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Zero value; omitted from filters.
    #[default]
    UnknownStatus,
    /// The activity has started.
    Start,
    /// The activity failed. Terminal.
    Failure,
    /// The activity succeeded. Terminal.
    Success,
    /// An error was observed.
    Error,
    /// A warning was observed.
    Warning,
    /// Informational note.
    Information,
    /// An incident was opened.
    Open,
    /// An incident was closed.
    Close,
    /// The activity is in progress.
    InProgress,
    /// The activity is finished. Terminal.
    Done,
}

impl Status {
    /// Returns true for the zero value.
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        matches!(self, Self::UnknownStatus)
    }

    /// Returns true for terminal statuses (`success`, `failure`, `done`).
    ///
    /// Reaching a terminal status fixes the event duration and releases any
    /// lock held on the event's behalf.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Done)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnknownStatus => "unknown_status",
            Self::Start => "start",
            Self::Failure => "failure",
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Information => "information",
            Self::Open => "open",
            Self::Close => "close",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// The kind of change a changelog entry records.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// Event was created.
    #[default]
    Created,
    /// A field changed with no more specific kind.
    Updated,
    /// The status changed.
    StatusChanged,
    /// An external reference (ticket, slack message) was attached.
    Linked,
    /// Ownership was taken over with nothing else changing.
    Approved,
    /// A lock was acquired on the event's behalf.
    Locked,
    /// The lock held on the event's behalf was released.
    Unlocked,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::StatusChanged => "status_changed",
            Self::Linked => "linked",
            Self::Approved => "approved",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
        };
        f.write_str(s)
    }
}

/// An immutable, timestamped note appended to an event's changelog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChangelogEntry {
    /// When the change happened.
    pub timestamp: Timestamp,
    /// Who made the change.
    pub user: String,
    /// What kind of change this is.
    pub change_type: ChangeType,
    /// The field that changed, when the change is field-scoped.
    #[serde(default)]
    pub field: String,
    /// The value before the change.
    #[serde(default)]
    pub old_value: String,
    /// The value after the change.
    #[serde(default)]
    pub new_value: String,
    /// Free-form annotation.
    #[serde(default)]
    pub comment: String,
}

/// Descriptive attributes of an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EventAttributes {
    /// Free-form description of the activity.
    #[serde(default)]
    pub message: String,
    /// Originating system (CI pipeline, bot, human).
    #[serde(default)]
    pub source: String,
    /// Activity kind.
    #[serde(default, rename = "type")]
    pub event_type: EventType,
    /// Priority.
    #[serde(default)]
    pub priority: Priority,
    /// Whether the activity has user-visible impact.
    #[serde(default)]
    pub impact: bool,
    /// Environment the activity applies to.
    #[serde(default)]
    pub environment: Environment,
    /// Owning user.
    #[serde(default)]
    pub owner: String,
    /// Optional reference to another event this one relates to.
    #[serde(default)]
    pub related_id: String,
    /// The service the activity targets.
    #[serde(default)]
    pub service: String,
    /// Lifecycle status.
    #[serde(default)]
    pub status: Status,
    /// Scheduled or actual start. Accepted from clients as an ISO-8601
    /// string tolerant to several layouts; persisted as `{seconds, nanos}`.
    #[serde(default)]
    pub start_date: Option<Timestamp>,
    /// Scheduled or actual end, same handling as `start_date`.
    #[serde(default)]
    pub end_date: Option<Timestamp>,
    /// People to keep informed.
    #[serde(default)]
    pub stakeholders: Vec<String>,
    /// Notification channels already used for this event.
    #[serde(default)]
    pub notifications: Vec<String>,
}

/// External references attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EventLinks {
    /// Pull-request or merge-request URL.
    #[serde(default)]
    pub pull_request_link: String,
    /// Ticket key or URL.
    #[serde(default)]
    pub ticket: String,
}

/// Server-minted event metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EventMetadata {
    /// Server-minted UUIDv4, immutable after creation.
    #[serde(default)]
    pub id: String,
    /// Optional external identifier, globally unique when set.
    #[serde(default)]
    pub slack_id: String,
    /// Creation instant, immutable after creation.
    #[serde(default)]
    pub created_at: Timestamp,
    /// Derived duration in seconds. Set from the related event at creation,
    /// or from `created_at` when the event reaches a terminal status.
    #[serde(default)]
    pub duration_seconds: i64,
}

/// A record of a software-change activity with lifecycle status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Event {
    /// Short human-readable title.
    #[serde(default)]
    pub title: String,
    /// Descriptive attributes.
    #[serde(default)]
    pub attributes: EventAttributes,
    /// External references.
    #[serde(default)]
    pub links: EventLinks,
    /// Server-minted metadata.
    #[serde(default)]
    pub metadata: EventMetadata,
    /// Append-only changelog, oldest first.
    #[serde(default)]
    pub changelog: Vec<ChangelogEntry>,
}

impl Event {
    /// The user attributed to system-driven changelog entries when the event
    /// has no owner.
    pub const SYSTEM_USER: &'static str = "system";

    /// Returns the owner, or [`Self::SYSTEM_USER`] when unset.
    #[must_use]
    pub fn acting_user(&self) -> &str {
        if self.attributes.owner.is_empty() {
            Self::SYSTEM_USER
        } else {
            &self.attributes.owner
        }
    }

    /// Appends a changelog entry stamped with the current instant.
    ///
    /// The changelog is append-only; this is the only mutation path.
    pub fn append_changelog(
        &mut self,
        change_type: ChangeType,
        user: impl Into<String>,
        field: impl Into<String>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
        comment: impl Into<String>,
    ) {
        self.changelog.push(ChangelogEntry {
            timestamp: Timestamp::now(),
            user: user.into(),
            change_type,
            field: field.into(),
            old_value: old_value.into(),
            new_value: new_value.into(),
            comment: comment.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(Status::Success.is_terminal());
        assert!(Status::Failure.is_terminal());
        assert!(Status::Done.is_terminal());
        assert!(!Status::Start.is_terminal());
        assert!(!Status::InProgress.is_terminal());
        assert!(!Status::UnknownStatus.is_terminal());
    }

    #[test]
    fn enums_serialize_snake_case() {
        assert_eq!(
            serde_json::to_value(EventType::Deployment).unwrap(),
            "deployment"
        );
        assert_eq!(
            serde_json::to_value(Status::InProgress).unwrap(),
            "in_progress"
        );
        assert_eq!(
            serde_json::to_value(ChangeType::StatusChanged).unwrap(),
            "status_changed"
        );
        assert_eq!(serde_json::to_value(Priority::P2).unwrap(), "p2");
    }

    #[test]
    fn acting_user_defaults_to_system() {
        let mut event = Event::default();
        assert_eq!(event.acting_user(), "system");
        event.attributes.owner = "alice".to_string();
        assert_eq!(event.acting_user(), "alice");
    }

    #[test]
    fn append_changelog_grows_tail() {
        let mut event = Event::default();
        event.append_changelog(ChangeType::Created, "alice", "", "", "", "Event created");
        event.append_changelog(
            ChangeType::StatusChanged,
            "alice",
            "status",
            "start",
            "success",
            "Status updated",
        );
        assert_eq!(event.changelog.len(), 2);
        assert_eq!(event.changelog[0].change_type, ChangeType::Created);
        assert_eq!(event.changelog[1].old_value, "start");
        assert!(event.changelog[0].timestamp <= event.changelog[1].timestamp);
    }

    #[test]
    fn attributes_type_field_renames() {
        let attrs = EventAttributes {
            event_type: EventType::Incident,
            ..EventAttributes::default()
        };
        let json = serde_json::to_value(&attrs).unwrap();
        assert_eq!(json["type"], "incident");
    }
}
