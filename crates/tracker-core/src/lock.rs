//! Lock domain model: a mutual-exclusion token scoped to
//! `(service, environment, resource)`.
//!
//! At most one lock may exist per key while its `service` is non-empty; the
//! storage layer enforces this with a unique compound index. The `event_id`
//! back-reference is a lookup hint for status-driven release, not ownership:
//! deleting an event never deletes its lock implicitly.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::time::Timestamp;

/// A held mutual-exclusion token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Lock {
    /// Server-minted UUIDv4.
    #[serde(default)]
    pub id: String,
    /// The locked service.
    #[serde(default)]
    pub service: String,
    /// Who holds the lock.
    #[serde(default)]
    pub who: String,
    /// Environment the lock applies to.
    #[serde(default)]
    pub environment: String,
    /// The kind of activity being serialized (`deployment`, `operation`).
    #[serde(default)]
    pub resource: String,
    /// Back-reference to the owning event. May be empty until the owning
    /// event has been minted.
    #[serde(default)]
    pub event_id: String,
    /// When the lock was acquired.
    #[serde(default)]
    pub created_at: Timestamp,
}

impl Lock {
    /// Returns the uniqueness key `(service, environment, resource)`.
    #[must_use]
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.service, &self.environment, &self.resource)
    }
}

/// Receipt returned when a lock is released.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnlockReceipt {
    /// Human-readable outcome.
    pub message: String,
    /// The released lock id.
    pub id: String,
    /// Number of lock documents deleted (0 or 1).
    pub deleted_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_service_environment_resource() {
        let lock = Lock {
            service: "api".to_string(),
            environment: "production".to_string(),
            resource: "deployment".to_string(),
            ..Lock::default()
        };
        assert_eq!(lock.key(), ("api", "production", "deployment"));
    }
}
