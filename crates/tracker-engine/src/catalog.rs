//! Catalog service: CRUD over the service inventory plus compliance
//! reporting.
//!
//! Writes are upserts keyed by `name`. The version triple is owned by
//! [`CatalogService::update_versions`]; ordinary upserts carry the stored
//! triple forward untouched, as does `created_at`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use tracker_core::{CatalogEntry, CatalogType, Error, Result, Timestamp, UsedDeliverable};
use tracker_store::CatalogRepository;

use crate::compliance::{self, ComplianceReport};

/// Request to create or update a catalog entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateUpdateCatalogRequest {
    /// Entry name (required).
    pub name: String,
    /// Entry kind.
    #[serde(rename = "type")]
    pub catalog_type: CatalogType,
    /// Current version (required).
    pub version: String,
    /// Owning team or user (required).
    pub owner: String,
    /// Implementation languages.
    pub languages: String,
    /// Hosting platform.
    pub platform: String,
    /// Source repository URL.
    pub repository: String,
    /// Free-form description.
    pub description: String,
    /// Documentation link.
    pub link: String,
    /// Names of entries this one depends on.
    pub dependencies_in: Vec<String>,
    /// Names of entries depending on this one.
    pub dependencies_out: Vec<String>,
    /// Service-level agreement description.
    pub sla: String,
    /// Deliverables a project consumes.
    pub used_deliverables: Vec<UsedDeliverable>,
    /// Team communication channels.
    pub communication_channels: Vec<String>,
    /// Monitoring dashboard links.
    pub dashboard_links: Vec<String>,
    /// Vulnerability posture summary.
    pub vulnerability_summary: String,
}

/// Request to replace the version triple of an entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateVersionsRequest {
    /// Published versions.
    pub available_versions: Vec<String>,
    /// Newest published version.
    pub latest_version: String,
    /// Version consumers should be using.
    pub reference_version: String,
}

/// A list of catalog entries with its count.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogPage {
    /// Entries.
    pub catalogs: Vec<CatalogEntry>,
    /// Number of entries returned.
    pub total_count: u64,
}

/// The catalog service.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CatalogRepository>,
}

impl CatalogService {
    /// Creates the service over a catalog repository.
    #[must_use]
    pub fn new(store: Arc<dyn CatalogRepository>) -> Self {
        Self { store }
    }

    /// Creates or updates an entry, preserving the stored version triple
    /// and creation instant.
    ///
    /// # Errors
    ///
    /// Returns a validation error when `name`, `owner`, or `version` is
    /// missing.
    pub async fn create_update(&self, req: CreateUpdateCatalogRequest) -> Result<CatalogEntry> {
        if req.name.is_empty() {
            return Err(Error::validation("name is required"));
        }
        if req.owner.is_empty() {
            return Err(Error::validation("owner is required"));
        }
        if req.version.is_empty() {
            return Err(Error::validation("version is required"));
        }

        let existing = self.store.get(&req.name).await?;

        let mut entry = CatalogEntry {
            name: req.name.clone(),
            catalog_type: req.catalog_type,
            version: req.version,
            owner: req.owner,
            languages: req.languages,
            platform: req.platform,
            repository: req.repository,
            description: req.description,
            link: req.link,
            dependencies_in: req.dependencies_in,
            dependencies_out: req.dependencies_out,
            sla: req.sla,
            used_deliverables: req.used_deliverables,
            communication_channels: req.communication_channels,
            dashboard_links: req.dashboard_links,
            vulnerability_summary: req.vulnerability_summary,
            updated_at: Timestamp::now(),
            ..CatalogEntry::default()
        };

        let log_message = if let Some(existing) = &existing {
            entry.preserve_versions_from(existing);
            entry.created_at = existing.created_at;
            "catalog updated"
        } else {
            entry.created_at = Timestamp::now();
            tracing::info!(name = %req.name, "catalog not found, creating new one");
            "catalog created"
        };

        let stored = self.store.upsert(&req.name, entry).await.map_err(|err| {
            tracing::error!(name = %req.name, error = %err, "failed to update catalog");
            err
        })?;

        tracing::info!(
            name = %stored.name,
            r#type = %stored.catalog_type,
            owner = %stored.owner,
            version = %stored.version,
            platform = %stored.platform,
            created_at = %stored.created_at.to_rfc3339(),
            updated_at = %stored.updated_at.to_rfc3339(),
            "{log_message}"
        );
        Ok(stored)
    }

    /// Gets an entry by name.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` naming the entry.
    pub async fn get(&self, name: &str) -> Result<CatalogEntry> {
        self.store
            .get(name)
            .await?
            .ok_or_else(|| Error::not_found(format!("no catalog found in tracker for name {name}")))
    }

    /// Lists every entry.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn list(&self) -> Result<CatalogPage> {
        let catalogs = self.store.list().await?;
        Ok(CatalogPage {
            total_count: catalogs.len() as u64,
            catalogs,
        })
    }

    /// Deletes an entry by name.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.store.delete(name).await
    }

    /// Replaces only the version triple of an existing entry.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` naming the entry when absent.
    pub async fn update_versions(
        &self,
        name: &str,
        req: UpdateVersionsRequest,
    ) -> Result<CatalogEntry> {
        let mut entry = self
            .store
            .get(name)
            .await?
            .ok_or_else(|| Error::not_found(format!("catalog {name} not found")))?;

        entry.available_versions = req.available_versions;
        entry.latest_version = req.latest_version;
        entry.reference_version = req.reference_version;
        entry.updated_at = Timestamp::now();

        let updated = self.store.upsert(name, entry).await?;
        tracing::info!(
            name = %updated.name,
            latest_version = %updated.latest_version,
            reference_version = %updated.reference_version,
            available_versions = updated.available_versions.len(),
            "catalog versions updated"
        );
        Ok(updated)
    }

    /// Computes the version-compliance report over the full catalog.
    ///
    /// # Errors
    ///
    /// Propagates repository failures from the catalog listing.
    pub async fn version_compliance(&self) -> Result<ComplianceReport> {
        let entries = self.store.list().await?;
        let report = compliance::compute(&entries);
        tracing::info!(
            total_projects = report.summary.total_projects,
            compliant_projects = report.summary.compliant_projects,
            overall_compliance = report.summary.overall_compliance_percentage,
            "version compliance check completed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_store::MemoryCatalogRepository;

    fn service() -> CatalogService {
        CatalogService::new(Arc::new(MemoryCatalogRepository::new()))
    }

    fn valid_request(name: &str) -> CreateUpdateCatalogRequest {
        CreateUpdateCatalogRequest {
            name: name.to_string(),
            owner: "platform".to_string(),
            version: "1.0".to_string(),
            catalog_type: CatalogType::Project,
            ..CreateUpdateCatalogRequest::default()
        }
    }

    #[tokio::test]
    async fn required_fields_are_validated() {
        let svc = service();
        for req in [
            CreateUpdateCatalogRequest::default(),
            CreateUpdateCatalogRequest {
                name: "x".to_string(),
                ..CreateUpdateCatalogRequest::default()
            },
            CreateUpdateCatalogRequest {
                name: "x".to_string(),
                owner: "o".to_string(),
                ..CreateUpdateCatalogRequest::default()
            },
        ] {
            assert!(matches!(
                svc.create_update(req).await,
                Err(Error::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn upsert_preserves_version_triple_and_created_at() -> Result<()> {
        let svc = service();
        let created = svc.create_update(valid_request("api")).await?;
        assert!(!created.created_at.is_zero());

        svc.update_versions(
            "api",
            UpdateVersionsRequest {
                available_versions: vec!["1.0".to_string(), "2.0".to_string()],
                latest_version: "2.0".to_string(),
                reference_version: "2.0".to_string(),
            },
        )
        .await?;

        let mut update = valid_request("api");
        update.version = "1.1".to_string();
        let updated = svc.create_update(update).await?;

        assert_eq!(updated.latest_version, "2.0");
        assert_eq!(updated.reference_version, "2.0");
        assert_eq!(updated.available_versions.len(), 2);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.version, "1.1");
        Ok(())
    }

    #[tokio::test]
    async fn update_versions_requires_existing_entry() {
        let svc = service();
        let err = svc
            .update_versions("ghost", UpdateVersionsRequest::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn get_names_missing_entry() {
        let svc = service();
        let err = svc.get("missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn list_counts_entries() -> Result<()> {
        let svc = service();
        svc.create_update(valid_request("a")).await?;
        svc.create_update(valid_request("b")).await?;
        let page = svc.list().await?;
        assert_eq!(page.total_count, 2);

        svc.delete("a").await?;
        assert_eq!(svc.list().await?.total_count, 1);
        Ok(())
    }
}
