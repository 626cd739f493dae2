//! Compliance calculator: per-project deliverable-version compliance
//! derived from the catalog.
//!
//! Catalog entries partition into *deliverables* (package, chart, container,
//! module) and *projects*. For each `(name, version_used)` a project pins, a
//! usage is outdated when the deliverable declares a reference version and
//! the pinned version differs. Output ordering is deterministic: projects
//! and deliverable stats sort by name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use tracker_core::{CatalogEntry, CatalogType};

/// One deliverable usage inside a project, with its compliance flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeliverableUsage {
    /// Deliverable name.
    pub name: String,
    /// Deliverable kind.
    #[serde(rename = "type")]
    pub catalog_type: CatalogType,
    /// Version the project pins.
    pub current_version: String,
    /// Newest published version of the deliverable.
    pub latest_version: String,
    /// The version projects should be using.
    pub reference_version: String,
    /// True when a reference version exists and the pin differs.
    pub is_outdated: bool,
    /// True when a latest version exists and the pin matches it.
    pub is_latest: bool,
}

/// Compliance of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProjectCompliance {
    /// Project name.
    pub project_name: String,
    /// Every resolvable deliverable usage.
    pub deliverables: Vec<DeliverableUsage>,
    /// Usages flagged outdated.
    pub outdated_count: u32,
    /// Resolvable usages.
    pub total_count: u32,
    /// `100 * (total - outdated) / total`, or 0 when the project uses
    /// nothing resolvable.
    pub compliance_percentage: f32,
}

/// Aggregate stats for one deliverable across all projects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeliverableComplianceStats {
    /// Deliverable name.
    pub name: String,
    /// Deliverable kind.
    #[serde(rename = "type")]
    pub catalog_type: CatalogType,
    /// Projects using the deliverable.
    pub projects_using: u32,
    /// Projects using it at an outdated version.
    pub projects_outdated: u32,
    /// Newest published version.
    pub latest_version: String,
    /// Reference version.
    pub reference_version: String,
}

/// Roll-up across all projects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ComplianceSummary {
    /// Projects in the catalog.
    pub total_projects: u32,
    /// Projects with zero outdated usages.
    pub compliant_projects: u32,
    /// Projects with at least one outdated usage.
    pub non_compliant_projects: u32,
    /// `100 * compliant / total`, or 0 without projects.
    pub overall_compliance_percentage: f32,
    /// Per-deliverable aggregates, sorted by name.
    pub deliverable_stats: Vec<DeliverableComplianceStats>,
}

/// Full compliance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ComplianceReport {
    /// Per-project compliance, sorted by project name.
    pub projects: Vec<ProjectCompliance>,
    /// Roll-up summary.
    pub summary: ComplianceSummary,
}

/// Computes the compliance report over the full catalog.
#[must_use]
pub fn compute(entries: &[CatalogEntry]) -> ComplianceReport {
    let mut deliverables: BTreeMap<&str, &CatalogEntry> = BTreeMap::new();
    let mut projects: BTreeMap<&str, &CatalogEntry> = BTreeMap::new();
    for entry in entries {
        if entry.catalog_type.is_deliverable() {
            deliverables.insert(entry.name.as_str(), entry);
        } else if entry.catalog_type.is_project() {
            projects.insert(entry.name.as_str(), entry);
        }
    }

    let total_projects = projects.len() as u32;
    let mut compliant_projects = 0;
    let mut deliverable_stats: BTreeMap<&str, DeliverableComplianceStats> = BTreeMap::new();
    let mut project_compliances = Vec::with_capacity(projects.len());

    for project in projects.values() {
        let mut usages = Vec::new();
        let mut outdated_count = 0u32;
        let mut total_count = 0u32;

        for used in &project.used_deliverables {
            // Usages of deliverables absent from the catalog are skipped.
            let Some(deliverable) = deliverables.get(used.name.as_str()) else {
                continue;
            };
            total_count += 1;

            let current_version = used.version_used.clone();
            let is_outdated = !deliverable.reference_version.is_empty()
                && current_version != deliverable.reference_version;
            let is_latest = !deliverable.latest_version.is_empty()
                && current_version == deliverable.latest_version;
            if is_outdated {
                outdated_count += 1;
            }

            usages.push(DeliverableUsage {
                name: used.name.clone(),
                catalog_type: deliverable.catalog_type,
                current_version,
                latest_version: deliverable.latest_version.clone(),
                reference_version: deliverable.reference_version.clone(),
                is_outdated,
                is_latest,
            });

            let stats = deliverable_stats
                .entry(deliverable.name.as_str())
                .or_insert_with(|| DeliverableComplianceStats {
                    name: deliverable.name.clone(),
                    catalog_type: deliverable.catalog_type,
                    projects_using: 0,
                    projects_outdated: 0,
                    latest_version: deliverable.latest_version.clone(),
                    reference_version: deliverable.reference_version.clone(),
                });
            stats.projects_using += 1;
            if is_outdated {
                stats.projects_outdated += 1;
            }
        }

        let compliance_percentage = if total_count > 0 {
            (total_count - outdated_count) as f32 / total_count as f32 * 100.0
        } else {
            0.0
        };
        if outdated_count == 0 {
            compliant_projects += 1;
        }

        project_compliances.push(ProjectCompliance {
            project_name: project.name.clone(),
            deliverables: usages,
            outdated_count,
            total_count,
            compliance_percentage,
        });
    }

    let overall_compliance_percentage = if total_projects > 0 {
        compliant_projects as f32 / total_projects as f32 * 100.0
    } else {
        0.0
    };

    ComplianceReport {
        projects: project_compliances,
        summary: ComplianceSummary {
            total_projects,
            compliant_projects,
            non_compliant_projects: total_projects - compliant_projects,
            overall_compliance_percentage,
            deliverable_stats: deliverable_stats.into_values().collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_core::UsedDeliverable;

    fn deliverable(name: &str, latest: &str, reference: &str) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            catalog_type: CatalogType::Package,
            latest_version: latest.to_string(),
            reference_version: reference.to_string(),
            ..CatalogEntry::default()
        }
    }

    fn project(name: &str, uses: &[(&str, &str)]) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            catalog_type: CatalogType::Project,
            used_deliverables: uses
                .iter()
                .map(|(n, v)| UsedDeliverable {
                    name: (*n).to_string(),
                    version_used: (*v).to_string(),
                })
                .collect(),
            ..CatalogEntry::default()
        }
    }

    #[test]
    fn half_outdated_project_is_fifty_percent() {
        let entries = vec![
            deliverable("lib-a", "2.0", "2.0"),
            deliverable("lib-b", "3.0", "3.0"),
            project("app", &[("lib-a", "2.0"), ("lib-b", "1.0")]),
        ];
        let report = compute(&entries);

        assert_eq!(report.projects.len(), 1);
        let app = &report.projects[0];
        assert_eq!(app.total_count, 2);
        assert_eq!(app.outdated_count, 1);
        assert!((app.compliance_percentage - 50.0).abs() < f32::EPSILON);

        // Compliant iff outdated_count == 0, so one half-outdated project
        // makes the overall rate 0%.
        assert_eq!(report.summary.total_projects, 1);
        assert_eq!(report.summary.compliant_projects, 0);
        assert_eq!(report.summary.non_compliant_projects, 1);
        assert!((report.summary.overall_compliance_percentage - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn outdated_pin_counts_against_deliverable() {
        let entries = vec![
            deliverable("dep", "2.0", "2.0"),
            project("p", &[("dep", "1.0")]),
        ];
        let report = compute(&entries);

        assert_eq!(report.projects[0].compliance_percentage, 0.0);
        let stats = &report.summary.deliverable_stats;
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].projects_using, 1);
        assert_eq!(stats[0].projects_outdated, 1);
        assert_eq!(stats[0].latest_version, "2.0");
        assert_eq!(stats[0].reference_version, "2.0");
    }

    #[test]
    fn missing_reference_version_never_outdates() {
        let entries = vec![
            deliverable("dep", "2.0", ""),
            project("p", &[("dep", "1.0")]),
        ];
        let report = compute(&entries);
        let usage = &report.projects[0].deliverables[0];
        assert!(!usage.is_outdated);
        assert!(!usage.is_latest);
        assert_eq!(report.summary.compliant_projects, 1);
    }

    #[test]
    fn latest_flag_requires_exact_match() {
        let entries = vec![
            deliverable("dep", "2.0", "1.5"),
            project("p", &[("dep", "2.0")]),
        ];
        let report = compute(&entries);
        let usage = &report.projects[0].deliverables[0];
        assert!(usage.is_latest);
        assert!(usage.is_outdated);
    }

    #[test]
    fn unresolvable_usages_are_skipped() {
        let entries = vec![project("p", &[("ghost", "1.0")])];
        let report = compute(&entries);
        assert_eq!(report.projects[0].total_count, 0);
        assert_eq!(report.projects[0].compliance_percentage, 0.0);
        assert!(report.summary.deliverable_stats.is_empty());
        // No resolvable usages means no outdated usages: compliant.
        assert_eq!(report.summary.compliant_projects, 1);
    }

    #[test]
    fn output_is_sorted_by_name() {
        let entries = vec![
            deliverable("zeta", "1.0", "1.0"),
            deliverable("alpha", "1.0", "1.0"),
            project("p2", &[("zeta", "1.0"), ("alpha", "1.0")]),
            project("p1", &[("alpha", "1.0")]),
        ];
        let report = compute(&entries);
        let names: Vec<_> = report.projects.iter().map(|p| &p.project_name).collect();
        assert_eq!(names, vec!["p1", "p2"]);
        let stats: Vec<_> = report
            .summary
            .deliverable_stats
            .iter()
            .map(|s| &s.name)
            .collect();
        assert_eq!(stats, vec!["alpha", "zeta"]);
    }

    #[test]
    fn empty_catalog_yields_zeroed_summary() {
        let report = compute(&[]);
        assert!(report.projects.is_empty());
        assert_eq!(report.summary.total_projects, 0);
        assert_eq!(report.summary.overall_compliance_percentage, 0.0);
    }
}
