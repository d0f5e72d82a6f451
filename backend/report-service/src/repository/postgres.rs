use super::{ContactDirectory, ReportStore};
use crate::domain::{Comment, GeoPoint, IssueType, Report, ReportFilter, ReportStatus, Upvote};
use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const REPORT_COLUMNS: &str = r#"
    id, user_id, issue_type, longitude, latitude, address, description, images,
    status, rejection_reason, created_at, updated_at
"#;

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: Uuid,
    user_id: Uuid,
    issue_type: String,
    longitude: f64,
    latitude: f64,
    address: String,
    description: String,
    images: Vec<String>,
    status: String,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReportRow> for Report {
    type Error = StoreError;

    fn try_from(row: ReportRow) -> StoreResult<Self> {
        let issue_type = IssueType::parse(&row.issue_type)
            .ok_or_else(|| StoreError::Corrupt(format!("report {} issue_type {}", row.id, row.issue_type)))?;
        let status = ReportStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("report {} status {}", row.id, row.status)))?;

        Ok(Report {
            id: row.id,
            user_id: row.user_id,
            issue_type,
            location: GeoPoint {
                longitude: row.longitude,
                latitude: row.latitude,
            },
            address: row.address,
            description: row.description,
            images: row.images,
            status,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    user_id: Uuid,
    report_id: Uuid,
    text: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            user_id: row.user_id,
            report_id: row.report_id,
            text: row.text,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn map_unique_violation(err: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate(what.to_string());
        }
    }
    StoreError::Database(err)
}

/// PostgreSQL-backed document store
#[derive(Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReportStore for PgReportStore {
    async fn find_reports(&self, filter: ReportFilter) -> StoreResult<Vec<Report>> {
        let sql = format!(
            r#"
            SELECT {REPORT_COLUMNS}
            FROM reports
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR issue_type = $2)
            ORDER BY created_at DESC
            "#
        );

        let rows = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.issue_type.map(|t| t.as_str()))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Report::try_from).collect()
    }

    async fn find_report(&self, report_id: Uuid) -> StoreResult<Option<Report>> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1");

        let row = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(report_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Report::try_from).transpose()
    }

    async fn insert_report(&self, report: &Report) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reports (
                id, user_id, issue_type, longitude, latitude, address, description, images,
                status, rejection_reason, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(report.id)
        .bind(report.user_id)
        .bind(report.issue_type.as_str())
        .bind(report.location.longitude)
        .bind(report.location.latitude)
        .bind(&report.address)
        .bind(&report.description)
        .bind(&report.images)
        .bind(report.status.as_str())
        .bind(&report.rejection_reason)
        .bind(report.created_at)
        .bind(report.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "report id"))?;

        Ok(())
    }

    async fn update_pending_report(&self, owner_id: Uuid, report: &Report) -> StoreResult<bool> {
        // status is never written here; a report that left Pending matches no row
        let result = sqlx::query(
            r#"
            UPDATE reports
            SET issue_type = $3, longitude = $4, latitude = $5, address = $6, description = $7,
                images = $8, updated_at = $9
            WHERE id = $1 AND user_id = $2 AND status = 'Pending'
            "#,
        )
        .bind(report.id)
        .bind(owner_id)
        .bind(report.issue_type.as_str())
        .bind(report.location.longitude)
        .bind(report.location.latitude)
        .bind(&report.address)
        .bind(&report.description)
        .bind(&report.images)
        .bind(report.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_report_status(
        &self,
        report_id: Uuid,
        status: ReportStatus,
        rejection_reason: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<Report>> {
        let sql = format!(
            r#"
            UPDATE reports
            SET status = $2, rejection_reason = $3, updated_at = $4
            WHERE id = $1
            RETURNING {REPORT_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(report_id)
            .bind(status.as_str())
            .bind(rejection_reason)
            .bind(updated_at)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Report::try_from).transpose()
    }

    async fn delete_report(&self, report_id: Uuid) -> StoreResult<bool> {
        // comments and upvotes go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM reports WHERE id = $1")
            .bind(report_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_upvotes_by_report(&self, report_ids: &[Uuid]) -> StoreResult<Vec<(Uuid, i64)>> {
        if report_ids.is_empty() {
            return Ok(Vec::new());
        }

        let counts = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT report_id, COUNT(*) AS count
            FROM upvotes
            WHERE report_id = ANY($1)
            GROUP BY report_id
            "#,
        )
        .bind(report_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }

    async fn count_comments_by_report(
        &self,
        report_ids: &[Uuid],
    ) -> StoreResult<Vec<(Uuid, i64)>> {
        if report_ids.is_empty() {
            return Ok(Vec::new());
        }

        let counts = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT report_id, COUNT(*) AS count
            FROM comments
            WHERE report_id = ANY($1)
            GROUP BY report_id
            "#,
        )
        .bind(report_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }

    async fn upvoted_report_ids(&self, user_id: Uuid, report_ids: &[Uuid]) -> StoreResult<Vec<Uuid>> {
        if report_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT report_id
            FROM upvotes
            WHERE user_id = $1 AND report_id = ANY($2)
            "#,
        )
        .bind(user_id)
        .bind(report_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn insert_upvote(&self, upvote: &Upvote) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO upvotes (id, user_id, report_id, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(upvote.id)
        .bind(upvote.user_id)
        .bind(upvote.report_id)
        .bind(upvote.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "upvote (user_id, report_id)"))?;

        Ok(())
    }

    async fn delete_upvote(&self, user_id: Uuid, report_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM upvotes WHERE user_id = $1 AND report_id = $2")
            .bind(user_id)
            .bind(report_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_comment(&self, comment_id: Uuid) -> StoreResult<Option<Comment>> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, user_id, report_id, text, created_at, updated_at
            FROM comments
            WHERE id = $1
            "#,
        )
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Comment::from))
    }

    async fn insert_comment(&self, comment: &Comment) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO comments (id, user_id, report_id, text, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(comment.id)
        .bind(comment.user_id)
        .bind(comment.report_id)
        .bind(&comment.text)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_comment(&self, comment: &Comment) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE comments SET text = $2, updated_at = $3 WHERE id = $1")
            .bind(comment.id)
            .bind(&comment.text)
            .bind(comment.updated_at)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_comment(&self, comment_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_reports_by_status(&self) -> StoreResult<Vec<(ReportStatus, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) AS count FROM reports GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(status, count)| {
                ReportStatus::parse(&status)
                    .map(|s| (s, count))
                    .ok_or_else(|| StoreError::Corrupt(format!("report status {}", status)))
            })
            .collect()
    }

    async fn average_resolution_secs(&self) -> StoreResult<Option<f64>> {
        let avg: Option<f64> = sqlx::query_scalar(
            r#"
            SELECT AVG(EXTRACT(EPOCH FROM (updated_at - created_at)))::float8
            FROM reports
            WHERE status = $1
            "#,
        )
        .bind(ReportStatus::Fixed.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(avg)
    }

    async fn count_reports_by_type(&self) -> StoreResult<Vec<(IssueType, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT issue_type, COUNT(*) AS count FROM reports GROUP BY issue_type",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(issue_type, count)| {
                IssueType::parse(&issue_type)
                    .map(|t| (t, count))
                    .ok_or_else(|| StoreError::Corrupt(format!("report issue_type {}", issue_type)))
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ContactDirectory for PgReportStore {
    async fn email_for(&self, user_id: Uuid) -> StoreResult<Option<String>> {
        let email: Option<String> = sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(email)
    }
}
