use actix_web::{HttpResponse, Result, web};
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::AppConfig;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub app: String,
    pub env: String,
}

/// Liveness only; does not touch the database or the ephemeral store.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health(app: web::Data<AppConfig>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        app: app.name.clone(),
        env: app.env.clone(),
    }))
}

pub fn health_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health));
}
