/// HTTP handlers for report-service
///
/// - Reports: listings, report CRUD, upvotes, comments
/// - Admin: status triage and the dashboard
pub mod admin;
pub mod reports;

use crate::error::ServiceError;
use crate::metrics::serve_metrics;
use actix_web::{web, HttpResponse};

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "report-service",
    }))
}

/// Register every route under the service root
pub fn configure(cfg: &mut web::ServiceConfig) {
    // extractor rejections answer with the same JSON body as service errors
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ServiceError::InvalidInput(err.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        ServiceError::InvalidInput(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        ServiceError::InvalidInput(err.to_string()).into()
    }));

    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(serve_metrics))
        .service(
            web::scope("/api/v1")
                .service(
                    web::scope("/reports")
                        .route("", web::get().to(reports::list_reports))
                        .route("", web::post().to(reports::create_report))
                        .route("/{id}", web::put().to(reports::update_report))
                        .route("/{id}", web::delete().to(reports::delete_report))
                        .route("/{id}/upvote", web::post().to(reports::toggle_upvote))
                        .route("/{id}/comments", web::post().to(reports::add_comment)),
                )
                .service(
                    web::scope("/comments")
                        .route("/{id}", web::put().to(reports::update_comment))
                        .route("/{id}", web::delete().to(reports::delete_comment)),
                )
                .service(
                    web::scope("/admin")
                        .route("/reports/{id}/status", web::patch().to(admin::update_status))
                        .route("/dashboard", web::get().to(admin::dashboard)),
                ),
        );
}
