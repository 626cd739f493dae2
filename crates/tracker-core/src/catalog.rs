//! Catalog domain model: the service and deliverable inventory.
//!
//! Catalog entries are keyed by `name` and upserted on every write. The
//! version triple (`available_versions`, `latest_version`,
//! `reference_version`) is maintained by a dedicated operation and survives
//! ordinary upserts untouched.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::time::Timestamp;

/// The kind of a catalog entry.
///
/// `package`, `chart`, `container` and `module` entries are *deliverables*:
/// versioned artifacts referenced by `project` entries.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CatalogType {
    /// Zero value.
    #[default]
    UnknownCatalogType,
    /// A top-level project that consumes deliverables.
    Project,
    /// A versioned package.
    Package,
    /// A Helm chart.
    Chart,
    /// A container image.
    Container,
    /// A reusable infrastructure module.
    Module,
}

impl CatalogType {
    /// Returns true for deliverable kinds (package, chart, container, module).
    #[must_use]
    pub const fn is_deliverable(self) -> bool {
        matches!(
            self,
            Self::Package | Self::Chart | Self::Container | Self::Module
        )
    }

    /// Returns true for project entries.
    #[must_use]
    pub const fn is_project(self) -> bool {
        matches!(self, Self::Project)
    }
}

impl fmt::Display for CatalogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnknownCatalogType => "unknown_catalog_type",
            Self::Project => "project",
            Self::Package => "package",
            Self::Chart => "chart",
            Self::Container => "container",
            Self::Module => "module",
        };
        f.write_str(s)
    }
}

/// A deliverable referenced by a project, with the version it actually uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UsedDeliverable {
    /// The deliverable's catalog name.
    #[serde(default)]
    pub name: String,
    /// The version the project is pinned to.
    #[serde(default)]
    pub version_used: String,
}

/// A catalog entry, keyed by `name`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CatalogEntry {
    /// Unique entry name.
    #[serde(default)]
    pub name: String,
    /// Entry kind.
    #[serde(default, rename = "type")]
    pub catalog_type: CatalogType,
    /// Current version of the entry itself.
    #[serde(default)]
    pub version: String,
    /// Owning team or user.
    #[serde(default)]
    pub owner: String,
    /// Implementation languages.
    #[serde(default)]
    pub languages: String,
    /// Hosting platform.
    #[serde(default)]
    pub platform: String,
    /// Source repository URL.
    #[serde(default)]
    pub repository: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Documentation or landing-page link.
    #[serde(default)]
    pub link: String,
    /// Names of entries this one depends on.
    #[serde(default)]
    pub dependencies_in: Vec<String>,
    /// Names of entries depending on this one.
    #[serde(default)]
    pub dependencies_out: Vec<String>,
    /// Service-level agreement description.
    #[serde(default)]
    pub sla: String,
    /// Deliverables a project entry consumes, with pinned versions.
    #[serde(default)]
    pub used_deliverables: Vec<UsedDeliverable>,
    /// Team communication channels.
    #[serde(default)]
    pub communication_channels: Vec<String>,
    /// Monitoring dashboard links.
    #[serde(default)]
    pub dashboard_links: Vec<String>,
    /// Short vulnerability posture summary.
    #[serde(default)]
    pub vulnerability_summary: String,
    /// Published versions of a deliverable.
    #[serde(default)]
    pub available_versions: Vec<String>,
    /// Newest published version.
    #[serde(default)]
    pub latest_version: String,
    /// The version consumers SHOULD be using; divergence is "outdated".
    #[serde(default)]
    pub reference_version: String,
    /// When the entry was first created.
    #[serde(default)]
    pub created_at: Timestamp,
    /// When the entry was last written.
    #[serde(default)]
    pub updated_at: Timestamp,
}

impl CatalogEntry {
    /// Copies the version triple from another entry.
    ///
    /// Ordinary upserts preserve the triple of the stored entry; only the
    /// dedicated version update replaces it.
    pub fn preserve_versions_from(&mut self, existing: &Self) {
        self.available_versions = existing.available_versions.clone();
        self.latest_version = existing.latest_version.clone();
        self.reference_version = existing.reference_version.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deliverable_partition() {
        assert!(CatalogType::Package.is_deliverable());
        assert!(CatalogType::Chart.is_deliverable());
        assert!(CatalogType::Container.is_deliverable());
        assert!(CatalogType::Module.is_deliverable());
        assert!(!CatalogType::Project.is_deliverable());
        assert!(CatalogType::Project.is_project());
        assert!(!CatalogType::UnknownCatalogType.is_deliverable());
    }

    #[test]
    fn preserve_versions_copies_triple() {
        let existing = CatalogEntry {
            available_versions: vec!["1.0".to_string(), "2.0".to_string()],
            latest_version: "2.0".to_string(),
            reference_version: "2.0".to_string(),
            ..CatalogEntry::default()
        };
        let mut incoming = CatalogEntry {
            name: "api".to_string(),
            version: "3.0".to_string(),
            ..CatalogEntry::default()
        };
        incoming.preserve_versions_from(&existing);
        assert_eq!(incoming.latest_version, "2.0");
        assert_eq!(incoming.reference_version, "2.0");
        assert_eq!(incoming.available_versions.len(), 2);
        assert_eq!(incoming.version, "3.0");
    }
}
