//! `OpenAPI` specification generation for the tracker REST API.
//!
//! Served at `/swagger.json` and rendered by the `/docs` UI shell.

use utoipa::OpenApi;

/// `OpenAPI` documentation for the tracker REST API (`/api/v1alpha1/*`).
#[derive(OpenApi)]
#[openapi(
    info(
        title = "tracker API",
        description = "Operational change-event tracker: events, locks, catalog"
    ),
    paths(
        crate::routes::events::create_event,
        crate::routes::events::list_events,
        crate::routes::events::search_events,
        crate::routes::events::today_events,
        crate::routes::events::get_event,
        crate::routes::events::update_event,
        crate::routes::events::delete_event,
        crate::routes::events::get_event_changelog,
        crate::routes::events::add_changelog_entry,
        crate::routes::events::add_slack_id,
        crate::routes::events::event_stats,
        crate::routes::events::event_stats_by_month,
        crate::routes::locks::create_lock,
        crate::routes::locks::list_locks,
        crate::routes::locks::get_lock,
        crate::routes::locks::update_lock,
        crate::routes::locks::unlock,
        crate::routes::catalogs::create_update_catalog,
        crate::routes::catalogs::list_catalogs,
        crate::routes::catalogs::get_catalog,
        crate::routes::catalogs::delete_catalog,
        crate::routes::catalogs::update_versions,
        crate::routes::catalogs::version_compliance,
    ),
    components(schemas(
        crate::error::ApiErrorBody,
        crate::routes::events::EventResponse,
        crate::routes::events::StatsByMonthRequest,
        crate::routes::events::AddSlackIdRequest,
        crate::routes::locks::LockResponse,
        crate::routes::locks::LockPage,
        crate::routes::catalogs::CatalogResponse,
        tracker_core::Event,
        tracker_core::event::EventAttributes,
        tracker_core::event::EventLinks,
        tracker_core::event::EventMetadata,
        tracker_core::ChangelogEntry,
        tracker_core::ChangeType,
        tracker_core::EventType,
        tracker_core::Priority,
        tracker_core::Environment,
        tracker_core::Status,
        tracker_core::Timestamp,
        tracker_core::Lock,
        tracker_core::UnlockReceipt,
        tracker_core::CatalogEntry,
        tracker_core::CatalogType,
        tracker_core::UsedDeliverable,
        tracker_engine::CreateEventRequest,
        tracker_engine::UpdateEventRequest,
        tracker_engine::EventAttributesRequest,
        tracker_engine::NewChangelogEntry,
        tracker_engine::EventPage,
        tracker_engine::ChangelogPage,
        tracker_engine::EventStats,
        tracker_engine::MonthlyStats,
        tracker_engine::MonthlyStatsReport,
        tracker_engine::CreateLockRequest,
        tracker_engine::UpdateLockRequest,
        tracker_engine::CreateUpdateCatalogRequest,
        tracker_engine::UpdateVersionsRequest,
        tracker_engine::CatalogPage,
        tracker_engine::ComplianceReport,
        tracker_engine::ComplianceSummary,
        tracker_engine::ProjectCompliance,
        tracker_engine::compliance::DeliverableUsage,
        tracker_engine::compliance::DeliverableComplianceStats,
        tracker_store::SearchQuery,
        tracker_store::StatsQuery,
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_contains_every_route_group() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string(&spec).expect("spec serializes");
        assert!(json.contains("/api/v1alpha1/events"));
        assert!(json.contains("/api/v1alpha1/locks"));
        assert!(json.contains("/api/v1alpha1/catalogs"));
        assert!(json.contains("/api/v1alpha1/events/stats/by-month"));
    }
}
