/// Report handlers - HTTP endpoints for listings, reports, upvotes and comments
use crate::domain::{CommentInput, NewReport, ReportUpdate};
use crate::error::ServiceResult;
use crate::middleware::{Requester, UserId};
use crate::services::ReportCore;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListReportsQuery {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub issue_type: Option<String>,
}

/// List enriched reports for the caller
pub async fn list_reports(
    core: web::Data<ReportCore>,
    requester: Requester,
    query: web::Query<ListReportsQuery>,
) -> ServiceResult<HttpResponse> {
    let reports = core
        .listing
        .list_reports(
            query.status.as_deref(),
            query.issue_type.as_deref(),
            requester.0,
        )
        .await?;

    Ok(HttpResponse::Ok().json(reports))
}

pub async fn create_report(
    core: web::Data<ReportCore>,
    user_id: UserId,
    req: web::Json<NewReport>,
) -> ServiceResult<HttpResponse> {
    let report = core.reports.create_report(user_id.0, req.into_inner()).await?;
    Ok(HttpResponse::Created().json(report))
}

pub async fn update_report(
    core: web::Data<ReportCore>,
    user_id: UserId,
    path: web::Path<Uuid>,
    req: web::Json<ReportUpdate>,
) -> ServiceResult<HttpResponse> {
    let report = core
        .reports
        .edit_report(user_id.0, path.into_inner(), req.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(report))
}

pub async fn delete_report(
    core: web::Data<ReportCore>,
    user_id: UserId,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    core.reports
        .delete_report(user_id.0, path.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn toggle_upvote(
    core: web::Data<ReportCore>,
    user_id: UserId,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    let toggle = core
        .reports
        .toggle_upvote(user_id.0, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(toggle))
}

pub async fn add_comment(
    core: web::Data<ReportCore>,
    user_id: UserId,
    path: web::Path<Uuid>,
    req: web::Json<CommentInput>,
) -> ServiceResult<HttpResponse> {
    let comment = core
        .reports
        .add_comment(user_id.0, path.into_inner(), req.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(comment))
}

pub async fn update_comment(
    core: web::Data<ReportCore>,
    user_id: UserId,
    path: web::Path<Uuid>,
    req: web::Json<CommentInput>,
) -> ServiceResult<HttpResponse> {
    let comment = core
        .reports
        .edit_comment(user_id.0, path.into_inner(), req.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(comment))
}

pub async fn delete_comment(
    core: web::Data<ReportCore>,
    user_id: UserId,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    core.reports
        .delete_comment(user_id.0, path.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
