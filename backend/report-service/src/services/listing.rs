//! Cache-aside read path for enriched report listings
//!
//! Concurrent misses on the same key each recompute and overwrite the entry. There is
//! no single-flight lock; the duplicate work is bounded by the number of requests that
//! miss the same key inside one recomputation.

use crate::domain::{EnrichedReport, ListingQuery};
use crate::error::ServiceResult;
use crate::metrics::{READ_CACHE_EVENTS, RECOMPUTE_DURATION_SECONDS};
use crate::repository::{with_deadline, ReportStore};
use crate::services::enrichment::EnrichmentAggregator;
use civic_cache::{get_json, set_json, KeyValueCache};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ReportListingService {
    store: Arc<dyn ReportStore>,
    cache: Arc<dyn KeyValueCache>,
    enrichment: EnrichmentAggregator,
    ttl_secs: u64,
    query_timeout: Duration,
}

impl ReportListingService {
    pub fn new(
        store: Arc<dyn ReportStore>,
        cache: Arc<dyn KeyValueCache>,
        ttl_secs: u64,
        query_timeout: Duration,
    ) -> Self {
        Self {
            enrichment: EnrichmentAggregator::new(store.clone(), query_timeout),
            store,
            cache,
            ttl_secs,
            query_timeout,
        }
    }

    /// List reports from raw filter strings.
    ///
    /// Unknown filter values are rejected before the cache or store is touched.
    pub async fn list_reports(
        &self,
        status_filter: Option<&str>,
        type_filter: Option<&str>,
        requester_id: Option<Uuid>,
    ) -> ServiceResult<Vec<EnrichedReport>> {
        let query = ListingQuery::parse(status_filter, type_filter, requester_id)?;
        self.list(query).await
    }

    pub async fn list(&self, query: ListingQuery) -> ServiceResult<Vec<EnrichedReport>> {
        let key = query.cache_key();

        match get_json::<Vec<EnrichedReport>>(self.cache.as_ref(), &key).await {
            Ok(Some(cached)) => {
                debug!(key = %key, reports = cached.len(), "Listing cache HIT");
                READ_CACHE_EVENTS.with_label_values(&["listing", "hit"]).inc();
                return Ok(cached);
            }
            Ok(None) => {
                debug!(key = %key, "Listing cache MISS");
                READ_CACHE_EVENTS.with_label_values(&["listing", "miss"]).inc();
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Listing cache read failed; reading from store");
                READ_CACHE_EVENTS.with_label_values(&["listing", "error"]).inc();
            }
        }

        let timer = RECOMPUTE_DURATION_SECONDS
            .with_label_values(&["listing"])
            .start_timer();

        let reports = with_deadline(
            self.query_timeout,
            self.store.find_reports(query.store_filter()),
        )
        .await?;
        let enriched = self.enrichment.enrich(reports, query.requester).await?;

        timer.observe_duration();

        if let Err(e) = set_json(self.cache.as_ref(), &key, &enriched, self.ttl_secs).await {
            warn!(key = %key, error = %e, "Listing cache write failed");
        }

        Ok(enriched)
    }
}
