//! Filter builder: translates typed search and stats requests into
//! repository-level predicates.
//!
//! Two variants exist. The *search* filter matches on event attributes with
//! an optional range on `start_date`; it rejects the empty filter. The
//! *stats* filter always keys on `created_at` between two required dates and
//! adds IN / equality predicates for the optional fields.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use tracker_core::{Environment, Error, Event, EventType, Priority, Result, Status};

/// Date layouts accepted by [`parse_date`], tried in order; the first
/// successful parse wins. Offset-carrying layouts are resolved to UTC.
const OFFSET_LAYOUTS: &[&str] = &[
    // 2006-01-02T15:04:05-07:00 / Z07:00
    "%Y-%m-%dT%H:%M:%S%:z",
    // 2006-01-02T15:04:05.999-07:00 / .999Z07:00
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    // 2006-01-02T15:04:05Z0700 / .999Z0700
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    // 2006-01-02T15:04:05-07
    "%Y-%m-%dT%H:%M:%S%#z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
];

/// Layouts without a zone designator, interpreted as UTC.
const NAIVE_LAYOUTS: &[&str] = &[
    // 2006-01-02T15:04:05.999Z / .999
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    // 2006-01-02T15:04
    "%Y-%m-%dT%H:%M",
];

/// Parses a date string by trying the accepted layouts in order.
///
/// Layouts cover full RFC 3339 shapes (with or without fractional seconds,
/// `Z`, `±hh:mm`, `±hhmm`, or `±hh` offsets), zone-less timestamps down to
/// minute precision, an hour-only shape (`2006-01-02T15`), and a bare date.
/// Zone-less inputs are interpreted as UTC.
///
/// # Errors
///
/// Returns a validation error when no layout matches.
pub fn parse_date(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    for layout in OFFSET_LAYOUTS {
        if let Ok(dt) = DateTime::parse_from_str(input, layout) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, layout) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }
    // 2006-01-02T15 (hour only; chrono needs at least minutes)
    if let Some((date, hour)) = input.split_once('T') {
        if let (Ok(date), Ok(hour)) = (
            NaiveDate::parse_from_str(date, "%Y-%m-%d"),
            hour.parse::<u32>(),
        ) {
            if let Some(dt) = date.and_hms_opt(hour, 0, 0) {
                return Ok(Utc.from_utc_datetime(&dt));
            }
        }
    }
    // 2006-01-02 (date only)
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }
    Err(Error::validation(format!(
        "unrecognized date format: {input}"
    )))
}

/// Rejects an inverted date range.
///
/// # Errors
///
/// Returns a validation error naming both endpoints when `end < start`.
pub fn check_date_inverted(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if end < start {
        return Err(Error::validation(format!(
            "start_date {start} and end_date {end} are inversed"
        )));
    }
    Ok(())
}

/// A typed search request over events. Zero-valued enums and empty strings
/// mean "not filtered".
#[derive(Debug, Clone, Default, PartialEq, Deserialize, utoipa::IntoParams, utoipa::ToSchema)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Originating system.
    pub source: String,
    /// Activity kind.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Priority.
    pub priority: Priority,
    /// Environment.
    pub environment: Environment,
    /// Lifecycle status.
    pub status: Status,
    /// Target service.
    pub service: String,
    /// Range start (any accepted date layout).
    pub start_date: String,
    /// Range end (any accepted date layout).
    pub end_date: String,
}

/// Inclusive bounds on a seconds-since-epoch field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateBounds {
    /// Lower bound (`>=`), seconds since epoch.
    pub gte: Option<i64>,
    /// Upper bound (`<=`), seconds since epoch.
    pub lte: Option<i64>,
}

impl DateBounds {
    /// Returns true when neither bound is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.gte.is_none() && self.lte.is_none()
    }

    /// Evaluates the bounds against a field value. Missing field values
    /// never match a bounded predicate.
    #[must_use]
    pub fn contains(&self, seconds: Option<i64>) -> bool {
        if self.is_empty() {
            return true;
        }
        let Some(seconds) = seconds else {
            return false;
        };
        self.gte.map_or(true, |b| seconds >= b) && self.lte.map_or(true, |b| seconds <= b)
    }
}

/// Repository-level predicate for event searches, matched on attributes and
/// an optional `start_date` range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    /// Equality on `attributes.source`.
    pub source: Option<String>,
    /// Equality on `attributes.type`.
    pub event_type: Option<EventType>,
    /// Equality on `attributes.priority`.
    pub priority: Option<Priority>,
    /// Equality on `attributes.environment`.
    pub environment: Option<Environment>,
    /// Equality on `attributes.status`.
    pub status: Option<Status>,
    /// Equality on `attributes.service`.
    pub service: Option<String>,
    /// Bounds on `attributes.start_date.seconds`.
    pub start_date: DateBounds,
}

impl EventFilter {
    /// Builds the predicate from a search query.
    ///
    /// Date pair semantics: both present gives an inclusive range on
    /// `start_date`; only one gives the corresponding one-sided bound.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unparsable or inverted dates, or when
    /// every field is zero-valued ("no filter for search events").
    pub fn from_query(query: &SearchQuery) -> Result<Self> {
        let mut filter = Self::default();

        if !query.source.is_empty() {
            filter.source = Some(query.source.clone());
        }
        if !query.event_type.is_unknown() {
            filter.event_type = Some(query.event_type);
        }
        if !query.priority.is_unknown() {
            filter.priority = Some(query.priority);
        }
        if !query.environment.is_unknown() {
            filter.environment = Some(query.environment);
        }
        if !query.status.is_unknown() {
            filter.status = Some(query.status);
        }
        if !query.service.is_empty() {
            filter.service = Some(query.service.clone());
        }

        match (query.start_date.is_empty(), query.end_date.is_empty()) {
            (false, false) => {
                let start = parse_date(&query.start_date)?;
                let end = parse_date(&query.end_date)?;
                check_date_inverted(start, end)?;
                filter.start_date = DateBounds {
                    gte: Some(start.timestamp()),
                    lte: Some(end.timestamp()),
                };
            }
            (false, true) => {
                let start = parse_date(&query.start_date)?;
                filter.start_date = DateBounds {
                    gte: Some(start.timestamp()),
                    lte: None,
                };
            }
            (true, false) => {
                let end = parse_date(&query.end_date)?;
                filter.start_date = DateBounds {
                    gte: None,
                    lte: Some(end.timestamp()),
                };
            }
            (true, true) => {}
        }

        if filter.is_empty() {
            return Err(Error::validation("no filter for search events"));
        }
        Ok(filter)
    }

    /// Returns true when no predicate is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_none()
            && self.event_type.is_none()
            && self.priority.is_none()
            && self.environment.is_none()
            && self.status.is_none()
            && self.service.is_none()
            && self.start_date.is_empty()
    }

    /// Evaluates the predicate against an event (in-memory backend).
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        let attrs = &event.attributes;
        self.source.as_ref().map_or(true, |v| *v == attrs.source)
            && self.event_type.map_or(true, |v| v == attrs.event_type)
            && self.priority.map_or(true, |v| v == attrs.priority)
            && self.environment.map_or(true, |v| v == attrs.environment)
            && self.status.map_or(true, |v| v == attrs.status)
            && self.service.as_ref().map_or(true, |v| *v == attrs.service)
            && self
                .start_date
                .contains(attrs.start_date.map(|ts| ts.seconds))
    }
}

/// A typed statistics request. `start_date` and `end_date` are required;
/// everything else is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(default)]
pub struct StatsQuery {
    /// Range start (required).
    pub start_date: String,
    /// Range end (required).
    pub end_date: String,
    /// IN filter on environments.
    pub environments: Vec<Environment>,
    /// Equality on impact.
    pub impact: Option<bool>,
    /// IN filter on priorities.
    pub priorities: Vec<Priority>,
    /// IN filter on types.
    pub types: Vec<EventType>,
    /// IN filter on statuses.
    pub statuses: Vec<Status>,
    /// Equality on source.
    pub source: String,
    /// Equality on service.
    pub service: String,
}

/// Repository-level predicate for statistics, always keyed on `created_at`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsFilter {
    /// Inclusive lower bound on `metadata.created_at.seconds`.
    pub created_gte: i64,
    /// Inclusive upper bound on `metadata.created_at.seconds`.
    pub created_lte: i64,
    /// IN filter on `attributes.environment`.
    pub environments: Vec<Environment>,
    /// Equality on `attributes.impact`.
    pub impact: Option<bool>,
    /// IN filter on `attributes.priority`.
    pub priorities: Vec<Priority>,
    /// IN filter on `attributes.type`.
    pub types: Vec<EventType>,
    /// IN filter on `attributes.status`.
    pub statuses: Vec<Status>,
    /// Equality on `attributes.source`.
    pub source: Option<String>,
    /// Equality on `attributes.service`.
    pub service: Option<String>,
}

impl StatsFilter {
    /// Builds the predicate from a stats query.
    ///
    /// # Errors
    ///
    /// Returns a validation error when either date is missing, unparsable,
    /// or the range is inverted.
    pub fn from_query(query: &StatsQuery) -> Result<Self> {
        if query.start_date.is_empty() || query.end_date.is_empty() {
            return Err(Error::validation("start_date and end_date are required"));
        }
        let start = parse_date(&query.start_date)
            .map_err(|e| Error::validation(format!("invalid start_date: {e}")))?;
        let end = parse_date(&query.end_date)
            .map_err(|e| Error::validation(format!("invalid end_date: {e}")))?;
        check_date_inverted(start, end)?;

        Ok(Self {
            created_gte: start.timestamp(),
            created_lte: end.timestamp(),
            environments: query.environments.clone(),
            impact: query.impact,
            priorities: query.priorities.clone(),
            types: query.types.clone(),
            statuses: query.statuses.clone(),
            source: (!query.source.is_empty()).then(|| query.source.clone()),
            service: (!query.service.is_empty()).then(|| query.service.clone()),
        })
    }

    /// Evaluates the predicate against an event (in-memory backend).
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        let created = event.metadata.created_at.seconds;
        let attrs = &event.attributes;
        created >= self.created_gte
            && created <= self.created_lte
            && (self.environments.is_empty() || self.environments.contains(&attrs.environment))
            && self.impact.map_or(true, |v| v == attrs.impact)
            && (self.priorities.is_empty() || self.priorities.contains(&attrs.priority))
            && (self.types.is_empty() || self.types.contains(&attrs.event_type))
            && (self.statuses.is_empty() || self.statuses.contains(&attrs.status))
            && self.source.as_ref().map_or(true, |v| *v == attrs.source)
            && self.service.as_ref().map_or(true, |v| *v == attrs.service)
    }
}
