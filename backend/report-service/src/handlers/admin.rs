/// Admin handlers - report triage and dashboard
use crate::domain::ReportStatus;
use crate::error::ServiceResult;
use crate::middleware::AdminId;
use crate::services::ReportCore;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: ReportStatus,
    pub rejection_reason: Option<String>,
}

pub async fn update_status(
    core: web::Data<ReportCore>,
    admin: AdminId,
    path: web::Path<Uuid>,
    req: web::Json<UpdateStatusRequest>,
) -> ServiceResult<HttpResponse> {
    let UpdateStatusRequest {
        status,
        rejection_reason,
    } = req.into_inner();

    let report = core
        .reports
        .update_status(admin.0, path.into_inner(), status, rejection_reason)
        .await?;
    Ok(HttpResponse::Ok().json(report))
}

pub async fn dashboard(core: web::Data<ReportCore>, _admin: AdminId) -> ServiceResult<HttpResponse> {
    let snapshot = core.dashboard.dashboard_snapshot().await?;
    Ok(HttpResponse::Ok().json(snapshot))
}
