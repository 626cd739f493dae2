//! Secondary-index specifications, shared by every backend.
//!
//! The specs are plain data: the MongoDB backend turns them into
//! `IndexModel`s at startup, and the in-memory backend enforces the unique
//! ones on insert. Index ensuring is idempotent; pre-existing identical
//! indexes are a no-op.
//!
//! The unique compound index on locks `(service, environment, resource)` is
//! what closes the create-lock race: two concurrent creates on the same key
//! reach the store, and exactly one survives the constraint.

/// Sort order of one indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl IndexOrder {
    /// The MongoDB key direction.
    #[must_use]
    pub const fn direction(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

/// Declarative description of one secondary index.
#[derive(Debug, Clone)]
pub struct IndexSpec {
    /// Stable index name.
    pub name: &'static str,
    /// Indexed fields in order.
    pub keys: Vec<(&'static str, IndexOrder)>,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
    /// Whether documents missing the field are skipped.
    pub sparse: bool,
    /// When set, restricts the index to documents where this field compares
    /// greater than the empty string (partial filter; `$gt: ""`).
    pub partial_nonempty: Option<&'static str>,
}

impl IndexSpec {
    fn single(name: &'static str, field: &'static str, order: IndexOrder) -> Self {
        Self {
            name,
            keys: vec![(field, order)],
            unique: false,
            sparse: false,
            partial_nonempty: None,
        }
    }
}

/// Name of the unique lock-key index.
pub const LOCK_KEY_INDEX: &str = "idx_lock_key";

/// Index specifications for the `events` collection.
#[must_use]
pub fn event_indexes() -> Vec<IndexSpec> {
    vec![
        // Unique on metadata.id; the partial filter skips documents where
        // the id is empty ($gt, because $ne is unsupported in partial
        // filter expressions).
        IndexSpec {
            name: "idx_metadata_id",
            keys: vec![("metadata.id", IndexOrder::Asc)],
            unique: true,
            sparse: false,
            partial_nonempty: Some("metadata.id"),
        },
        // Non-unique: several events may share a slack id historically.
        IndexSpec {
            name: "idx_metadata_slack_id",
            keys: vec![("metadata.slack_id", IndexOrder::Asc)],
            unique: false,
            sparse: true,
            partial_nonempty: None,
        },
        IndexSpec {
            name: "idx_attributes_related_id",
            keys: vec![("attributes.related_id", IndexOrder::Asc)],
            unique: false,
            sparse: true,
            partial_nonempty: None,
        },
        IndexSpec {
            name: "idx_service_env_status",
            keys: vec![
                ("attributes.service", IndexOrder::Asc),
                ("attributes.environment", IndexOrder::Asc),
                ("attributes.status", IndexOrder::Asc),
            ],
            unique: false,
            sparse: false,
            partial_nonempty: None,
        },
        IndexSpec::single(
            "idx_start_date",
            "attributes.start_date.seconds",
            IndexOrder::Desc,
        ),
        IndexSpec::single("idx_source", "attributes.source", IndexOrder::Asc),
        IndexSpec::single("idx_type", "attributes.type", IndexOrder::Asc),
        IndexSpec::single("idx_priority", "attributes.priority", IndexOrder::Asc),
        IndexSpec {
            name: "idx_timeline",
            keys: vec![
                ("attributes.start_date.seconds", IndexOrder::Desc),
                ("attributes.service", IndexOrder::Asc),
                ("attributes.environment", IndexOrder::Asc),
            ],
            unique: false,
            sparse: false,
            partial_nonempty: None,
        },
        IndexSpec::single(
            "idx_created_at",
            "metadata.created_at.seconds",
            IndexOrder::Desc,
        ),
    ]
}

/// Index specifications for the `locks` collection.
#[must_use]
pub fn lock_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec {
            name: "idx_lock_id",
            keys: vec![("id", IndexOrder::Asc)],
            unique: true,
            sparse: false,
            partial_nonempty: Some("id"),
        },
        // The mutual-exclusion constraint: at most one lock per
        // (service, environment, resource) while service is non-empty.
        IndexSpec {
            name: LOCK_KEY_INDEX,
            keys: vec![
                ("service", IndexOrder::Asc),
                ("environment", IndexOrder::Asc),
                ("resource", IndexOrder::Asc),
            ],
            unique: true,
            sparse: false,
            partial_nonempty: Some("service"),
        },
        IndexSpec::single("idx_lock_created_at", "created_at.seconds", IndexOrder::Asc),
        IndexSpec {
            name: "idx_lock_env_resource",
            keys: vec![
                ("environment", IndexOrder::Asc),
                ("resource", IndexOrder::Asc),
            ],
            unique: false,
            sparse: false,
            partial_nonempty: None,
        },
    ]
}

/// Index specifications for the `catalogs` collection.
#[must_use]
pub fn catalog_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec {
            name: "idx_catalog_name",
            keys: vec![("name", IndexOrder::Asc)],
            unique: true,
            sparse: false,
            partial_nonempty: Some("name"),
        },
        IndexSpec::single("idx_catalog_platform", "platform", IndexOrder::Asc),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_index_is_unique_and_partial() {
        let specs = lock_indexes();
        let key_index = specs
            .iter()
            .find(|s| s.name == LOCK_KEY_INDEX)
            .expect("lock key index present");
        assert!(key_index.unique);
        assert_eq!(key_index.partial_nonempty, Some("service"));
        assert_eq!(key_index.keys.len(), 3);
    }

    #[test]
    fn event_id_index_is_unique() {
        let specs = event_indexes();
        let id_index = specs.iter().find(|s| s.name == "idx_metadata_id").unwrap();
        assert!(id_index.unique);
        let slack_index = specs
            .iter()
            .find(|s| s.name == "idx_metadata_slack_id")
            .unwrap();
        assert!(!slack_index.unique);
        assert!(slack_index.sparse);
    }

    #[test]
    fn index_names_are_distinct_per_collection() {
        for specs in [event_indexes(), lock_indexes(), catalog_indexes()] {
            let mut names: Vec<_> = specs.iter().map(|s| s.name).collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), specs.len());
        }
    }
}
