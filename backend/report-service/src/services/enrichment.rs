//! Engagement enrichment for report listings
//!
//! A listing of N reports costs exactly three grouped store queries (upvote counts,
//! comment counts, requester membership), issued concurrently, regardless of N.

use crate::domain::{EnrichedReport, Report};
use crate::error::StoreResult;
use crate::repository::{with_deadline, ReportStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct EnrichmentAggregator {
    store: Arc<dyn ReportStore>,
    query_timeout: Duration,
}

impl EnrichmentAggregator {
    pub fn new(store: Arc<dyn ReportStore>, query_timeout: Duration) -> Self {
        Self {
            store,
            query_timeout,
        }
    }

    /// Attach upvote/comment counts and requester membership, preserving input order.
    ///
    /// Fails as a whole if any of the aggregate queries fails.
    pub async fn enrich(
        &self,
        reports: Vec<Report>,
        requester: Option<Uuid>,
    ) -> StoreResult<Vec<EnrichedReport>> {
        if reports.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::with_capacity(reports.len());
        let report_ids: Vec<Uuid> = reports
            .iter()
            .map(|r| r.id)
            .filter(|id| seen.insert(*id))
            .collect();

        let upvotes = with_deadline(
            self.query_timeout,
            self.store.count_upvotes_by_report(&report_ids),
        );
        let comments = with_deadline(
            self.query_timeout,
            self.store.count_comments_by_report(&report_ids),
        );
        let membership = async {
            match requester {
                Some(user_id) => {
                    with_deadline(
                        self.query_timeout,
                        self.store.upvoted_report_ids(user_id, &report_ids),
                    )
                    .await
                }
                None => Ok(Vec::new()),
            }
        };

        let (upvote_counts, comment_counts, upvoted) =
            tokio::try_join!(upvotes, comments, membership)?;

        debug!(
            reports = reports.len(),
            distinct = report_ids.len(),
            upvoted = upvoted.len(),
            "Enriched report listing"
        );

        Ok(merge_engagement(
            reports,
            upvote_counts,
            comment_counts,
            upvoted,
        ))
    }
}

/// Join grouped aggregates onto reports by id; absent entries count as zero/false
pub fn merge_engagement(
    reports: Vec<Report>,
    upvote_counts: Vec<(Uuid, i64)>,
    comment_counts: Vec<(Uuid, i64)>,
    upvoted: Vec<Uuid>,
) -> Vec<EnrichedReport> {
    let upvote_counts: HashMap<Uuid, i64> = upvote_counts.into_iter().collect();
    let comment_counts: HashMap<Uuid, i64> = comment_counts.into_iter().collect();
    let upvoted: HashSet<Uuid> = upvoted.into_iter().collect();

    reports
        .into_iter()
        .map(|report| EnrichedReport {
            upvote_count: upvote_counts.get(&report.id).copied().unwrap_or(0).max(0),
            comment_count: comment_counts.get(&report.id).copied().unwrap_or(0).max(0),
            has_upvoted: upvoted.contains(&report.id),
            report,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GeoPoint, IssueType, ReportStatus};
    use chrono::Utc;

    fn report() -> Report {
        let now = Utc::now();
        Report {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            issue_type: IssueType::Pothole,
            location: GeoPoint {
                longitude: 0.0,
                latitude: 0.0,
            },
            address: "Main St".to_string(),
            description: "Deep pothole".to_string(),
            images: vec![],
            status: ReportStatus::Pending,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_merge_preserves_order_and_defaults() {
        let (a, b, c) = (report(), report(), report());
        let ids = [a.id, b.id, c.id];

        let enriched = merge_engagement(
            vec![a, b, c],
            vec![(ids[2], 4), (ids[0], 1)],
            vec![(ids[1], 3)],
            vec![ids[2]],
        );

        let order: Vec<Uuid> = enriched.iter().map(|e| e.report.id).collect();
        assert_eq!(order, ids);

        assert_eq!(enriched[0].upvote_count, 1);
        assert_eq!(enriched[0].comment_count, 0);
        assert!(!enriched[0].has_upvoted);

        assert_eq!(enriched[1].upvote_count, 0);
        assert_eq!(enriched[1].comment_count, 3);

        assert_eq!(enriched[2].upvote_count, 4);
        assert!(enriched[2].has_upvoted);
    }

    #[test]
    fn test_merge_ignores_unknown_ids() {
        let a = report();
        let enriched = merge_engagement(
            vec![a],
            vec![(Uuid::new_v4(), 9)],
            vec![],
            vec![Uuid::new_v4()],
        );

        assert_eq!(enriched[0].upvote_count, 0);
        assert!(!enriched[0].has_upvoted);
    }
}
