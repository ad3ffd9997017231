use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::handlers::health::HealthResponse;
use crate::models::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::passenger_signup,
        handlers::auth::passenger_verify,
        handlers::health::health,
    ),
    components(
        schemas(
            SignupRequest,
            SignupResponse,
            VerifyRequest,
            VerifyResponse,
            UserRole,
            ApiError,
            SignupApiResponse,
            VerifyApiResponse,
            HealthResponse,
        )
    ),
    tags(
        (name = "auth", description = "Passenger signup via phone OTP"),
        (name = "health", description = "Liveness check"),
    ),
    info(
        title = "OTP Signup API",
        version = "0.1.0",
        description = "Phone number signup with one-time passcodes"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
