// Report service - write paths for reports, upvotes and comments
//
// Every mutation writes the store first and only then invalidates the cache. Invalidation and
// notification failures never fail the mutation.
use crate::domain::{
    Comment, CommentInput, NewReport, Report, ReportStatus, ReportUpdate, Upvote, UpvoteToggle,
};
use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::repository::ReportStore;
use crate::services::invalidation::InvalidationCoordinator;
use crate::services::notifications::{Notification, NotificationQueue};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn ReportStore>,
    invalidation: InvalidationCoordinator,
    notifications: NotificationQueue,
}

impl ReportService {
    pub fn new(
        store: Arc<dyn ReportStore>,
        invalidation: InvalidationCoordinator,
        notifications: NotificationQueue,
    ) -> Self {
        Self {
            store,
            invalidation,
            notifications,
        }
    }

    async fn load_report(&self, report_id: Uuid) -> ServiceResult<Report> {
        self.store
            .find_report(report_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("report {}", report_id)))
    }

    async fn load_comment(&self, comment_id: Uuid) -> ServiceResult<Comment> {
        self.store
            .find_comment(comment_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("comment {}", comment_id)))
    }

    async fn load_owned_report(&self, actor_id: Uuid, report_id: Uuid) -> ServiceResult<Report> {
        let report = self.load_report(report_id).await?;
        if report.user_id != actor_id {
            return Err(ServiceError::Forbidden(
                "only the report owner can modify this report".to_string(),
            ));
        }
        Ok(report)
    }

    async fn load_authored_comment(
        &self,
        actor_id: Uuid,
        comment_id: Uuid,
    ) -> ServiceResult<Comment> {
        let comment = self.load_comment(comment_id).await?;
        if comment.user_id != actor_id {
            return Err(ServiceError::Forbidden(
                "only the comment author can modify this comment".to_string(),
            ));
        }
        Ok(comment)
    }

    // ========== Reports ==========

    pub async fn create_report(&self, owner_id: Uuid, input: NewReport) -> ServiceResult<Report> {
        input.validate()?;

        let now = Utc::now();
        let report = Report {
            id: Uuid::new_v4(),
            user_id: owner_id,
            issue_type: input.issue_type,
            location: input.location,
            address: input.address.trim().to_string(),
            description: input.description.trim().to_string(),
            images: input.images,
            status: ReportStatus::Pending,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_report(&report).await?;
        info!(report_id = %report.id, user_id = %owner_id, issue_type = %report.issue_type, "Report created");

        self.invalidation.invalidate(owner_id).await;
        self.notifications.enqueue(Notification::ReportReceived {
            user_id: owner_id,
            report_id: report.id,
            issue_type: report.issue_type,
        });

        Ok(report)
    }

    pub async fn edit_report(
        &self,
        actor_id: Uuid,
        report_id: Uuid,
        update: ReportUpdate,
    ) -> ServiceResult<Report> {
        update.validate()?;

        let mut report = self.load_owned_report(actor_id, report_id).await?;
        if report.status != ReportStatus::Pending {
            return Err(ServiceError::Conflict(format!(
                "report is {} and can no longer be edited",
                report.status
            )));
        }

        if let Some(issue_type) = update.issue_type {
            report.issue_type = issue_type;
        }
        if let Some(location) = update.location {
            report.location = location;
        }
        if let Some(address) = update.address {
            report.address = address.trim().to_string();
        }
        if let Some(description) = update.description {
            report.description = description.trim().to_string();
        }
        if let Some(images) = update.images {
            report.images = images;
        }
        report.updated_at = Utc::now();

        if !self.store.update_pending_report(actor_id, &report).await? {
            // triaged or deleted since it was loaded
            return Err(match self.store.find_report(report_id).await? {
                Some(current) => ServiceError::Conflict(format!(
                    "report is {} and can no longer be edited",
                    current.status
                )),
                None => ServiceError::NotFound(format!("report {}", report_id)),
            });
        }
        debug!(%report_id, user_id = %actor_id, "Report edited");

        self.invalidation.invalidate(report.user_id).await;
        Ok(report)
    }

    pub async fn delete_report(&self, actor_id: Uuid, report_id: Uuid) -> ServiceResult<()> {
        let report = self.load_owned_report(actor_id, report_id).await?;

        if !self.store.delete_report(report_id).await? {
            return Err(ServiceError::NotFound(format!("report {}", report_id)));
        }
        info!(%report_id, user_id = %actor_id, "Report deleted");

        self.invalidation.invalidate(report.user_id).await;
        Ok(())
    }

    // ========== Upvotes ==========

    /// Remove the actor's upvote if present, otherwise add one
    pub async fn toggle_upvote(&self, actor_id: Uuid, report_id: Uuid) -> ServiceResult<UpvoteToggle> {
        self.load_report(report_id).await?;

        let upvoted = if self.store.delete_upvote(actor_id, report_id).await? {
            false
        } else {
            let upvote = Upvote {
                id: Uuid::new_v4(),
                user_id: actor_id,
                report_id,
                created_at: Utc::now(),
            };
            match self.store.insert_upvote(&upvote).await {
                Ok(()) => true,
                // a concurrent toggle inserted first
                Err(StoreError::Duplicate(_)) => true,
                Err(e) => return Err(e.into()),
            }
        };

        // the write has committed; a failed count below must not leave the listing stale
        self.invalidation.invalidate(actor_id).await;

        let upvote_count = self
            .store
            .count_upvotes_by_report(&[report_id])
            .await?
            .into_iter()
            .find(|(id, _)| *id == report_id)
            .map(|(_, count)| count)
            .unwrap_or(0);

        debug!(%report_id, user_id = %actor_id, upvoted, upvote_count, "Upvote toggled");

        Ok(UpvoteToggle {
            upvoted,
            upvote_count,
        })
    }

    // ========== Comments ==========

    pub async fn add_comment(
        &self,
        actor_id: Uuid,
        report_id: Uuid,
        input: CommentInput,
    ) -> ServiceResult<Comment> {
        input.validate()?;
        let report = self.load_report(report_id).await?;

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            user_id: actor_id,
            report_id,
            text: input.text.trim().to_string(),
            created_at: now,
            updated_at: now,
        };

        self.store.insert_comment(&comment).await?;
        debug!(comment_id = %comment.id, %report_id, user_id = %actor_id, "Comment added");

        self.invalidation
            .invalidate_users(&[report.user_id, actor_id])
            .await;
        Ok(comment)
    }

    pub async fn edit_comment(
        &self,
        actor_id: Uuid,
        comment_id: Uuid,
        input: CommentInput,
    ) -> ServiceResult<Comment> {
        input.validate()?;

        let mut comment = self.load_authored_comment(actor_id, comment_id).await?;
        comment.text = input.text.trim().to_string();
        comment.updated_at = Utc::now();

        if !self.store.update_comment(&comment).await? {
            return Err(ServiceError::NotFound(format!("comment {}", comment_id)));
        }
        debug!(%comment_id, user_id = %actor_id, "Comment edited");

        Ok(comment)
    }

    pub async fn delete_comment(&self, actor_id: Uuid, comment_id: Uuid) -> ServiceResult<()> {
        let comment = self.load_authored_comment(actor_id, comment_id).await?;
        let report = self.load_report(comment.report_id).await?;

        if !self.store.delete_comment(comment_id).await? {
            return Err(ServiceError::NotFound(format!("comment {}", comment_id)));
        }
        debug!(%comment_id, user_id = %actor_id, "Comment deleted");

        self.invalidation
            .invalidate_users(&[report.user_id, actor_id])
            .await;
        Ok(())
    }

    // ========== Admin ==========

    /// Move a report to `status`. A rejection reason is required for Rejected and cleared
    /// for every other status.
    pub async fn update_status(
        &self,
        admin_id: Uuid,
        report_id: Uuid,
        status: ReportStatus,
        rejection_reason: Option<String>,
    ) -> ServiceResult<Report> {
        let rejection_reason = rejection_reason
            .map(|reason| reason.trim().to_string())
            .filter(|reason| !reason.is_empty());

        let rejection_reason = match (status, rejection_reason) {
            (ReportStatus::Rejected, Some(reason)) => Some(reason),
            (ReportStatus::Rejected, None) => {
                return Err(ServiceError::InvalidInput(
                    "a rejection reason is required when rejecting a report".to_string(),
                ))
            }
            (_, _) => None,
        };

        let report = self
            .store
            .update_report_status(report_id, status, rejection_reason.as_deref(), Utc::now())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("report {}", report_id)))?;
        info!(%report_id, %admin_id, status = %status, "Report status updated");

        self.invalidation.invalidate_dashboard().await;
        self.invalidation.invalidate(report.user_id).await;
        self.notifications.enqueue(Notification::StatusChanged {
            user_id: report.user_id,
            report_id,
            status,
            rejection_reason: report.rejection_reason.clone(),
        });

        Ok(report)
    }
}
