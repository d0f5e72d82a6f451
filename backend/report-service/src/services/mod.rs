/// Business logic layer for report-service
///
/// - Listing: cache-aside enriched report listings
/// - Dashboard: cache-aside admin statistics
/// - Reports: write paths and their invalidation trigger points
/// - Notifications: bounded email queue drained off the request path
pub mod dashboard;
pub mod enrichment;
pub mod invalidation;
pub mod listing;
pub mod notifications;
pub mod reports;

pub use dashboard::DashboardService;
pub use enrichment::EnrichmentAggregator;
pub use invalidation::InvalidationCoordinator;
pub use listing::ReportListingService;
pub use notifications::{
    notification_queue, spawn_notification_dispatcher, LogMailer, Mailer, Notification,
    NotificationQueue, SmtpMailer,
};
pub use reports::ReportService;

use crate::repository::ReportStore;
use civic_cache::{ttl, KeyValueCache};
use std::sync::Arc;
use std::time::Duration;

/// Tunables shared by the read and write paths
#[derive(Debug, Clone, Copy)]
pub struct CoreSettings {
    pub listing_ttl_secs: u64,
    pub dashboard_ttl_secs: u64,
    pub query_timeout: Duration,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            listing_ttl_secs: ttl::REPORT_LISTING,
            dashboard_ttl_secs: ttl::ADMIN_DASHBOARD,
            query_timeout: Duration::from_millis(5_000),
        }
    }
}

/// All services wired over one store and one cache
#[derive(Clone)]
pub struct ReportCore {
    pub listing: ReportListingService,
    pub dashboard: DashboardService,
    pub reports: ReportService,
    pub invalidation: InvalidationCoordinator,
}

impl ReportCore {
    pub fn new(
        store: Arc<dyn ReportStore>,
        cache: Arc<dyn KeyValueCache>,
        notifications: NotificationQueue,
        settings: CoreSettings,
    ) -> Self {
        let invalidation = InvalidationCoordinator::new(cache.clone());

        Self {
            listing: ReportListingService::new(
                store.clone(),
                cache.clone(),
                settings.listing_ttl_secs,
                settings.query_timeout,
            ),
            dashboard: DashboardService::new(
                store.clone(),
                cache,
                settings.dashboard_ttl_secs,
                settings.query_timeout,
            ),
            reports: ReportService::new(store, invalidation.clone(), notifications),
            invalidation,
        }
    }
}
