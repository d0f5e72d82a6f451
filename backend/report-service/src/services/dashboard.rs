// Dashboard service - cached admin statistics over all reports
use crate::domain::{DashboardSnapshot, IssueType, ReportStatus};
use crate::error::ServiceResult;
use crate::metrics::{READ_CACHE_EVENTS, RECOMPUTE_DURATION_SECONDS};
use crate::repository::{with_deadline, ReportStore};
use chrono::{DateTime, Utc};
use civic_cache::{get_json, set_json, CacheKey, KeyValueCache};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn ReportStore>,
    cache: Arc<dyn KeyValueCache>,
    ttl_secs: u64,
    query_timeout: Duration,
}

impl DashboardService {
    pub fn new(
        store: Arc<dyn ReportStore>,
        cache: Arc<dyn KeyValueCache>,
        ttl_secs: u64,
        query_timeout: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            ttl_secs,
            query_timeout,
        }
    }

    /// Get dashboard statistics, recomputing only on cache miss
    pub async fn dashboard_snapshot(&self) -> ServiceResult<DashboardSnapshot> {
        let key = CacheKey::admin_dashboard();

        match get_json::<DashboardSnapshot>(self.cache.as_ref(), &key).await {
            Ok(Some(cached)) => {
                debug!(key = %key, "Dashboard cache HIT");
                READ_CACHE_EVENTS.with_label_values(&["dashboard", "hit"]).inc();
                return Ok(cached);
            }
            Ok(None) => {
                debug!(key = %key, "Dashboard cache MISS");
                READ_CACHE_EVENTS.with_label_values(&["dashboard", "miss"]).inc();
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Dashboard cache read failed; reading from store");
                READ_CACHE_EVENTS.with_label_values(&["dashboard", "error"]).inc();
            }
        }

        let timer = RECOMPUTE_DURATION_SECONDS
            .with_label_values(&["dashboard"])
            .start_timer();

        let (by_status, avg_resolution_secs, by_type) = tokio::try_join!(
            with_deadline(self.query_timeout, self.store.count_reports_by_status()),
            with_deadline(self.query_timeout, self.store.average_resolution_secs()),
            with_deadline(self.query_timeout, self.store.count_reports_by_type()),
        )?;

        timer.observe_duration();

        let snapshot = build_snapshot(by_status, avg_resolution_secs, by_type, Utc::now());

        if let Err(e) = set_json(self.cache.as_ref(), &key, &snapshot, self.ttl_secs).await {
            warn!(key = %key, error = %e, "Dashboard cache write failed");
        }

        Ok(snapshot)
    }
}

/// Seconds to days, rounded to one decimal; no Fixed reports means zero
pub fn resolution_days(avg_resolution_secs: Option<f64>) -> f64 {
    match avg_resolution_secs {
        Some(secs) if secs.is_finite() && secs > 0.0 => {
            (secs / SECONDS_PER_DAY * 10.0).round() / 10.0
        }
        _ => 0.0,
    }
}

pub fn build_snapshot(
    by_status: Vec<(ReportStatus, i64)>,
    avg_resolution_secs: Option<f64>,
    by_type: Vec<(IssueType, i64)>,
    generated_at: DateTime<Utc>,
) -> DashboardSnapshot {
    let count_of = |wanted: ReportStatus| {
        by_status
            .iter()
            .filter(|(status, _)| *status == wanted)
            .map(|(_, count)| *count)
            .sum::<i64>()
    };

    let mut type_counts: BTreeMap<IssueType, i64> =
        IssueType::ALL.into_iter().map(|t| (t, 0)).collect();
    for (issue_type, count) in by_type {
        *type_counts.entry(issue_type).or_insert(0) += count;
    }

    DashboardSnapshot {
        total: by_status.iter().map(|(_, count)| *count).sum(),
        pending: count_of(ReportStatus::Pending),
        fixed: count_of(ReportStatus::Fixed),
        avg_resolution: resolution_days(avg_resolution_secs),
        by_type: type_counts,
        generated_at,
    }
}
