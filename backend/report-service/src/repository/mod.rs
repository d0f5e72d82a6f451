//! Document store access
//!
//! `ReportStore` is the narrow surface the caching core needs from the three
//! collections (reports, comments, upvotes). `PgReportStore` is the production
//! implementation; tests substitute an in-memory store.

mod postgres;

pub use postgres::PgReportStore;

use crate::domain::{Comment, IssueType, Report, ReportFilter, ReportStatus, Upvote};
use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

#[async_trait::async_trait]
pub trait ReportStore: Send + Sync {
    // ========== Reports ==========

    /// Reports matching `filter`, newest first
    async fn find_reports(&self, filter: ReportFilter) -> StoreResult<Vec<Report>>;

    async fn find_report(&self, report_id: Uuid) -> StoreResult<Option<Report>>;

    async fn insert_report(&self, report: &Report) -> StoreResult<()>;

    /// Write the owner-editable fields of `report`. Only matches while the report is still
    /// Pending and owned by `owner_id`; `false` means nothing was written.
    async fn update_pending_report(&self, owner_id: Uuid, report: &Report) -> StoreResult<bool>;

    /// Set status, rejection reason and `updated_at`, leaving every other field alone.
    /// Returns the row as written, or `None` when the report does not exist.
    async fn update_report_status(
        &self,
        report_id: Uuid,
        status: ReportStatus,
        rejection_reason: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<Report>>;

    /// Delete a report together with its comments and upvotes
    async fn delete_report(&self, report_id: Uuid) -> StoreResult<bool>;

    // ========== Engagement aggregates ==========

    /// Grouped upvote counts; reports without upvotes are absent
    async fn count_upvotes_by_report(&self, report_ids: &[Uuid]) -> StoreResult<Vec<(Uuid, i64)>>;

    /// Grouped comment counts; reports without comments are absent
    async fn count_comments_by_report(&self, report_ids: &[Uuid])
        -> StoreResult<Vec<(Uuid, i64)>>;

    /// Subset of `report_ids` upvoted by `user_id`
    async fn upvoted_report_ids(&self, user_id: Uuid, report_ids: &[Uuid]) -> StoreResult<Vec<Uuid>>;

    // ========== Upvotes ==========

    /// Fails with `StoreError::Duplicate` when (user, report) already exists
    async fn insert_upvote(&self, upvote: &Upvote) -> StoreResult<()>;

    async fn delete_upvote(&self, user_id: Uuid, report_id: Uuid) -> StoreResult<bool>;

    // ========== Comments ==========

    async fn find_comment(&self, comment_id: Uuid) -> StoreResult<Option<Comment>>;

    async fn insert_comment(&self, comment: &Comment) -> StoreResult<()>;

    async fn update_comment(&self, comment: &Comment) -> StoreResult<bool>;

    async fn delete_comment(&self, comment_id: Uuid) -> StoreResult<bool>;

    // ========== Dashboard aggregates ==========

    async fn count_reports_by_status(&self) -> StoreResult<Vec<(ReportStatus, i64)>>;

    /// Mean of `updated_at - created_at` in seconds over Fixed reports; `None` when there are none
    async fn average_resolution_secs(&self) -> StoreResult<Option<f64>>;

    async fn count_reports_by_type(&self) -> StoreResult<Vec<(IssueType, i64)>>;
}

/// Email lookup for notification delivery
#[async_trait::async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn email_for(&self, user_id: Uuid) -> StoreResult<Option<String>>;
}

/// Run a store query under a deadline
pub async fn with_deadline<F, T>(deadline: Duration, query: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(deadline, query).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(deadline)),
    }
}
