//! Timestamp representation shared by all persisted documents.
//!
//! Documents persist instants as a `{seconds, nanos}` pair. This module owns
//! the conversions between that wire shape and [`chrono::DateTime<Utc>`],
//! which the rest of the code uses for arithmetic.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// An instant persisted as seconds + nanoseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub struct Timestamp {
    /// Whole seconds since the Unix epoch.
    pub seconds: i64,
    /// Nanosecond remainder, always in `0..1_000_000_000`.
    pub nanos: i32,
}

impl Timestamp {
    /// Returns the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Converts from a UTC datetime.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self {
            seconds: dt.timestamp(),
            nanos: i32::try_from(dt.timestamp_subsec_nanos()).unwrap_or(0),
        }
    }

    /// Converts to a UTC datetime.
    ///
    /// Out-of-range values clamp to the Unix epoch rather than panic.
    #[must_use]
    pub fn to_datetime(self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.seconds, u32::try_from(self.nanos).unwrap_or(0))
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Renders as RFC 3339 for logs and API responses.
    #[must_use]
    pub fn to_rfc3339(self) -> String {
        self.to_datetime().to_rfc3339()
    }

    /// Whole seconds elapsed between `self` and `other` (`other - self`).
    #[must_use]
    pub fn seconds_until(self, other: Self) -> i64 {
        other.seconds - self.seconds
    }

    /// Returns true when this timestamp is the zero value (never stamped).
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.seconds == 0 && self.nanos == 0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_datetime(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_datetime() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 5).unwrap();
        let ts = Timestamp::from_datetime(dt);
        assert_eq!(ts.to_datetime(), dt);
    }

    #[test]
    fn serializes_as_two_field_document() {
        let ts = Timestamp {
            seconds: 1_700_000_000,
            nanos: 250_000_000,
        };
        let json = serde_json::to_value(ts).unwrap();
        assert_eq!(json["seconds"], 1_700_000_000_i64);
        assert_eq!(json["nanos"], 250_000_000_i32);
    }

    #[test]
    fn seconds_until_is_signed() {
        let early = Timestamp {
            seconds: 100,
            nanos: 0,
        };
        let late = Timestamp {
            seconds: 160,
            nanos: 0,
        };
        assert_eq!(early.seconds_until(late), 60);
        assert_eq!(late.seconds_until(early), -60);
    }

    #[test]
    fn ordering_follows_seconds_then_nanos() {
        let a = Timestamp {
            seconds: 10,
            nanos: 1,
        };
        let b = Timestamp {
            seconds: 10,
            nanos: 2,
        };
        assert!(a < b);
        assert!(!Timestamp::now().is_zero());
    }
}
