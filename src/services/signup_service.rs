//! Two-step phone signup: request a code, then verify it to create the account.
//!
//! Per-phone state is never stored as a field. It follows from what exists:
//! no challenge and no identity means nothing is in flight; a live challenge means a code
//! is outstanding; an identity row means signup is complete. Coordination between
//! concurrent requests goes through the shared stores only, and the unique-phone
//! constraint in the account repository is the single authority on "one account per
//! phone". The existence checks before it only save work.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::external::OtpSender;
use crate::models::{SignupResponse, VerifyResponse};
use crate::repositories::{AccountRepository, CreateOutcome};
use crate::services::{ChallengeOutcome, ChallengeStore, RateLimiter};
use crate::store::EphemeralStore;
use crate::utils::{JwtService, canonical_phone, generate_numeric_code, validate_name};

const INVALID_OTP: &str = "OTP is invalid or expired";

#[derive(Debug, Clone)]
pub struct SignupSettings {
    pub otp_length: usize,
    pub otp_ttl: Duration,
    pub hash_cost: u32,
    pub otp_per_hour: u64,
    pub max_verify_attempts: u64,
    pub attempt_window: Duration,
    /// Upper bound for any single store or repository call.
    pub store_timeout: Duration,
}

impl From<&Config> for SignupSettings {
    fn from(config: &Config) -> Self {
        Self {
            otp_length: config.otp.length,
            otp_ttl: config.otp.ttl(),
            hash_cost: config.otp.hash_cost,
            otp_per_hour: config.rate_limit.otp_per_hour,
            max_verify_attempts: config.rate_limit.max_verify_attempts,
            attempt_window: Duration::from_secs(config.rate_limit.attempt_window),
            store_timeout: config.store.timeout(),
        }
    }
}

#[derive(Clone)]
pub struct SignupService {
    accounts: Arc<dyn AccountRepository>,
    challenges: ChallengeStore,
    rate_limiter: RateLimiter,
    sender: Arc<dyn OtpSender>,
    jwt_service: JwtService,
    settings: SignupSettings,
}

impl SignupService {
    pub fn new(
        settings: SignupSettings,
        store: Arc<dyn EphemeralStore>,
        accounts: Arc<dyn AccountRepository>,
        sender: Arc<dyn OtpSender>,
        jwt_service: JwtService,
    ) -> Self {
        let challenges =
            ChallengeStore::new(store.clone(), settings.hash_cost, settings.attempt_window);
        let rate_limiter = RateLimiter::new(
            store,
            challenges.clone(),
            settings.otp_per_hour,
            settings.max_verify_attempts,
        );

        Self {
            accounts,
            challenges,
            rate_limiter,
            sender,
            jwt_service,
            settings,
        }
    }

    /// Issue a code for `raw_phone` and hand it to the delivery channel.
    pub async fn request_signup(&self, name: &str, raw_phone: &str) -> AppResult<SignupResponse> {
        let phone = canonical_phone(raw_phone)?;
        validate_name(name)?;

        self.fail_open("signup rate limit", self.rate_limiter.check_issuance(&phone))
            .await?;

        let exists = self
            .bounded("phone existence check", self.accounts.exists_by_phone(&phone))
            .await?;
        if exists {
            return Err(AppError::AlreadyRegistered(
                "Phone number already registered. Please login instead.".to_string(),
            ));
        }

        let code = generate_numeric_code(self.settings.otp_length)?;
        self.bounded(
            "challenge issue",
            self.challenges.issue(&phone, &code, self.settings.otp_ttl),
        )
        .await?;

        // The challenge stays valid even if delivery fails; the user can ask for a resend.
        if let Err(e) = self.sender.send(&phone, &code, self.settings.otp_ttl).await {
            log::error!("Failed to send OTP to {phone}: {e}");
            return Err(match e {
                AppError::DeliveryUnavailable(msg) => AppError::DeliveryUnavailable(msg),
                other => AppError::DeliveryUnavailable(other.to_string()),
            });
        }

        log::info!("OTP sent successfully to {phone}");

        Ok(SignupResponse {
            message: "OTP sent to phone number".to_string(),
            phone_number: phone,
            expires_in: self.settings.otp_ttl.as_secs(),
        })
    }

    /// Check the code and, on a match, create the passenger account and mint tokens.
    ///
    /// The challenge is cleared only once the account exists and both tokens are minted,
    /// so a failure anywhere earlier leaves the same code usable for a retry.
    pub async fn verify_signup(
        &self,
        raw_phone: &str,
        code: &str,
        name: &str,
    ) -> AppResult<VerifyResponse> {
        let phone = canonical_phone(raw_phone)?;
        let name = validate_name(name)?;

        // Reserved before the code is looked at; a malformed code spends its attempt too.
        self.fail_open("verify rate limit", self.rate_limiter.reserve_verification(&phone))
            .await?;

        if !self.is_well_formed_code(code) {
            return Err(AppError::ValidationError(format!(
                "OTP code must be {} digits",
                self.settings.otp_length
            )));
        }

        match self
            .bounded("challenge verify", self.challenges.verify(&phone, code))
            .await?
        {
            ChallengeOutcome::Match => {}
            ChallengeOutcome::NotFound => {
                return Err(AppError::AuthError(INVALID_OTP.to_string()));
            }
            ChallengeOutcome::Mismatch => {
                log::warn!("Invalid OTP attempt for {phone}");
                return Err(AppError::AuthError(INVALID_OTP.to_string()));
            }
        }

        let existing = self
            .bounded("identity lookup", self.accounts.get_by_phone(&phone))
            .await?;
        if existing.is_some() {
            self.clear_challenge(&phone).await;
            return Err(AppError::AlreadyRegistered(
                "User already exists. Please login instead.".to_string(),
            ));
        }

        let identity = match self
            .bounded("identity create", self.accounts.create(&name, &phone))
            .await?
        {
            CreateOutcome::Created(identity) => identity,
            CreateOutcome::Conflict => {
                self.clear_challenge(&phone).await;
                return Err(AppError::AlreadyRegistered(
                    "User already exists. Please login instead.".to_string(),
                ));
            }
        };

        let access_token = self.jwt_service.issue_access_token(&identity).map_err(|e| {
            log::error!("Failed to generate access token for {}: {e}", identity.id);
            e
        })?;
        let refresh_token = self.jwt_service.issue_refresh_token(&identity).map_err(|e| {
            log::error!("Failed to generate refresh token for {}: {e}", identity.id);
            e
        })?;

        self.clear_challenge(&phone).await;

        log::info!(
            "Passenger signup completed successfully: user {} ({phone})",
            identity.id
        );

        Ok(VerifyResponse {
            access_token,
            refresh_token,
            user_id: identity.id,
            phone_number: identity.phone_number,
            name: identity.name,
            role: identity.role,
            expires_in: self.jwt_service.get_access_token_expires_in(),
        })
    }

    fn is_well_formed_code(&self, code: &str) -> bool {
        code.len() == self.settings.otp_length && code.bytes().all(|b| b.is_ascii_digit())
    }

    /// A challenge left behind here expires on its own.
    async fn clear_challenge(&self, phone: &str) {
        if let Err(e) = self
            .bounded("challenge delete", self.challenges.delete(phone))
            .await
        {
            log::warn!("Failed to delete OTP for {phone}: {e}");
        }
    }

    async fn bounded<T>(
        &self,
        what: &str,
        fut: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.settings.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::StoreUnavailable(format!(
                "{what} timed out after {:?}",
                self.settings.store_timeout
            ))),
        }
    }

    /// Limiter checks may reject, but a limiter that cannot answer never blocks signup.
    async fn fail_open(
        &self,
        what: &str,
        check: impl Future<Output = AppResult<()>>,
    ) -> AppResult<()> {
        match tokio::time::timeout(self.settings.store_timeout, check).await {
            Ok(result) => result,
            Err(_) => {
                log::error!("{what} check timed out; allowing request");
                Ok(())
            }
        }
    }
}
