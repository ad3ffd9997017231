use chrono::{DateTime, Utc};
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[sea_orm(string_value = "passenger")]
    Passenger,
    #[sea_orm(string_value = "captain")]
    Captain,
    #[sea_orm(string_value = "both")]
    Both,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Passenger => write!(f, "passenger"),
            UserRole::Captain => write!(f, "captain"),
            UserRole::Both => write!(f, "both"),
        }
    }
}

/// A durable account, unique per canonical phone among live rows.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub phone_number: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignupRequest {
    #[schema(example = "Ahmed Ali")]
    pub name: String,
    #[schema(example = "+962 79 123 4567")]
    pub phone_number: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignupResponse {
    pub message: String,
    #[schema(example = "+962791234567")]
    pub phone_number: String,
    /// Seconds until the issued code expires.
    pub expires_in: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyRequest {
    #[schema(example = "+962791234567")]
    pub phone_number: String,
    #[schema(example = "123456")]
    pub otp_code: String,
    #[schema(example = "Ahmed Ali")]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: Uuid,
    pub phone_number: String,
    pub name: String,
    pub role: UserRole,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}
