//! # tracker-core
//!
//! Core domain types and shared primitives for the tracker service:
//!
//! - **Events**: the record of a software-change activity, with an
//!   append-only changelog
//! - **Locks**: mutual-exclusion tokens keyed on
//!   `(service, environment, resource)`
//! - **Catalog**: the service and deliverable inventory
//! - **Coordinator policy**: pure decisions tying event transitions to lock
//!   acquisition and release
//! - **Errors**: the shared error kinds every component maps onto
//!
//! `tracker-core` is the only crate allowed to define shared primitives; the
//! storage, engine, and API crates all speak these types.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]

pub mod catalog;
pub mod error;
pub mod event;
pub mod links;
pub mod lock;
pub mod observability;
pub mod policy;
pub mod time;

pub use catalog::{CatalogEntry, CatalogType, UsedDeliverable};
pub use error::{Error, Result};
pub use event::{
    ChangeType, ChangelogEntry, Environment, Event, EventAttributes, EventLinks, EventMetadata,
    EventType, Priority, Status,
};
pub use lock::{Lock, UnlockReceipt};
pub use time::Timestamp;

/// Returns true when the input parses as a UUID.
///
/// Event lookups dispatch on this: UUID inputs address `metadata.id`,
/// anything else addresses `metadata.slack_id`.
#[must_use]
pub fn is_uuid(input: &str) -> bool {
    uuid::Uuid::parse_str(input).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_detection() {
        assert!(is_uuid("f47ac10b-58cc-4372-a567-0e02b2c3d479"));
        assert!(!is_uuid("C0123456789"));
        assert!(!is_uuid(""));
    }
}
