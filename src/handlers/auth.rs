use actix_web::{HttpResponse, ResponseError, Result, web};

use crate::error::AppError;
use crate::models::*;
use crate::services::SignupService;

#[utoipa::path(
    post,
    path = "/auth/passenger/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "OTP issued and sent", body = SignupApiResponse),
        (status = 400, description = "Invalid phone number or name", body = ApiError),
        (status = 409, description = "Phone number already registered", body = ApiError),
        (status = 429, description = "Too many signup attempts", body = ApiError),
        (status = 503, description = "Delivery or store unavailable", body = ApiError)
    )
)]
pub async fn passenger_signup(
    signup_service: web::Data<SignupService>,
    request: web::Json<SignupRequest>,
) -> Result<HttpResponse> {
    match signup_service
        .request_signup(&request.name, &request.phone_number)
        .await
    {
        Ok(response) => Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
            response,
            "OTP sent successfully",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/passenger/verify",
    tag = "auth",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Account created, tokens issued", body = VerifyApiResponse),
        (status = 400, description = "Malformed phone number, name or code", body = ApiError),
        (status = 401, description = "OTP is invalid or expired", body = ApiError),
        (status = 409, description = "Account already exists", body = ApiError),
        (status = 429, description = "Too many verification attempts", body = ApiError),
        (status = 503, description = "Store unavailable", body = ApiError)
    )
)]
pub async fn passenger_verify(
    signup_service: web::Data<SignupService>,
    request: web::Json<VerifyRequest>,
) -> Result<HttpResponse> {
    let request = request.into_inner();
    match signup_service
        .verify_signup(&request.phone_number, &request.otp_code, &request.name)
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            response,
            "Signup completed successfully",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

/// Renders unreadable bodies through the same error envelope as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        AppError::ValidationError(format!("Invalid request body: {err}")).into()
    })
}

pub fn auth_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth/passenger")
            .app_data(json_config())
            .route("/signup", web::post().to(passenger_signup))
            .route("/verify", web::post().to(passenger_verify)),
    );
}
