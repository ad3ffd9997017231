use crate::error::{AppError, AppResult};
use crate::models::{Identity, UserRole};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const LEEWAY_SECONDS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub user_id: Uuid,
    pub phone_number: String,
    pub role: UserRole,
    pub token_type: TokenKind,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// Why a presented token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is invalid")]
    Invalid,
    #[error("token has expired")]
    Expired,
}

/// Stateless HS256 token issuer shared by every worker.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_token_expires_in: i64,
    refresh_token_expires_in: i64,
}

impl JwtService {
    pub fn new(
        secret: &str,
        issuer: &str,
        access_expires_in: i64,
        refresh_expires_in: i64,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            access_token_expires_in: access_expires_in,
            refresh_token_expires_in: refresh_expires_in,
        }
    }

    pub fn issue_token(
        &self,
        identity: &Identity,
        kind: TokenKind,
        ttl: Duration,
    ) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.id.to_string(),
            user_id: identity.id,
            phone_number: identity.phone_number.clone(),
            role: identity.role,
            token_type: kind,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(AppError::JwtError)
    }

    pub fn issue_access_token(&self, identity: &Identity) -> AppResult<String> {
        self.issue_token(
            identity,
            TokenKind::Access,
            Duration::seconds(self.access_token_expires_in),
        )
    }

    pub fn issue_refresh_token(&self, identity: &Identity) -> AppResult<String> {
        self.issue_token(
            identity,
            TokenKind::Refresh,
            Duration::seconds(self.refresh_token_expires_in),
        )
    }

    /// Check signature, issuer and time bounds. No revocation list is consulted.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = LEEWAY_SECONDS;
        validation.validate_nbf = true;
        validation.set_issuer(&[self.issuer.as_str()]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.validate(token)?;
        if claims.token_type != TokenKind::Access {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.validate(token)?;
        if claims.token_type != TokenKind::Refresh {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }

    pub fn get_access_token_expires_in(&self) -> i64 {
        self.access_token_expires_in
    }
}
