//! Coordinator policy: pure decision functions tying event transitions to
//! lock acquisition and release.
//!
//! The coordinator is the only path that mutates both subsystems in one
//! operation; these functions decide *when* it does so, over
//! `(event type, status)` alone.

use crate::event::{EventType, Status};

/// Returns true when creating an event with this type and status must
/// acquire the key lock first.
///
/// Deployments and operations that start (or are already in progress)
/// serialize on `(service, environment, resource)`.
#[must_use]
pub const fn should_create_lock(event_type: EventType, status: Status) -> bool {
    matches!(event_type, EventType::Deployment | EventType::Operation)
        && matches!(status, Status::Start | Status::InProgress)
}

/// Returns true when an event transitioning to this status must release the
/// lock held on its behalf.
#[must_use]
pub const fn should_release_lock(event_type: EventType, status: Status) -> bool {
    matches!(event_type, EventType::Deployment | EventType::Operation)
        && status.is_terminal()
}

/// Maps an event type to the lock resource it serializes on.
#[must_use]
pub const fn resource_for(event_type: EventType) -> &'static str {
    match event_type {
        EventType::Deployment => "deployment",
        EventType::Operation => "operation",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_lock_only_for_starting_changes() {
        assert!(should_create_lock(EventType::Deployment, Status::Start));
        assert!(should_create_lock(EventType::Deployment, Status::InProgress));
        assert!(should_create_lock(EventType::Operation, Status::Start));
        assert!(!should_create_lock(EventType::Deployment, Status::Success));
        assert!(!should_create_lock(EventType::Incident, Status::Start));
        assert!(!should_create_lock(EventType::Drift, Status::InProgress));
    }

    #[test]
    fn release_lock_only_on_terminal() {
        assert!(should_release_lock(EventType::Deployment, Status::Success));
        assert!(should_release_lock(EventType::Deployment, Status::Failure));
        assert!(should_release_lock(EventType::Operation, Status::Done));
        assert!(!should_release_lock(EventType::Deployment, Status::Start));
        assert!(!should_release_lock(EventType::Incident, Status::Success));
    }

    #[test]
    fn resource_names() {
        assert_eq!(resource_for(EventType::Deployment), "deployment");
        assert_eq!(resource_for(EventType::Operation), "operation");
        assert_eq!(resource_for(EventType::Incident), "unknown");
        assert_eq!(resource_for(EventType::UnknownType), "unknown");
    }
}
