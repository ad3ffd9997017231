//! Per-phone rate limits for the signup flow.
//!
//! Both windows are counters in the ephemeral store, so every instance behind the load
//! balancer sees the same numbers. Infrastructure failures fail open: a broken limiter
//! is logged and the request proceeds.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::services::ChallengeStore;
use crate::store::EphemeralStore;

const ISSUANCE_WINDOW: Duration = Duration::from_secs(3600);

fn signup_key(phone: &str) -> String {
    format!("signup_attempts:{phone}")
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn EphemeralStore>,
    challenges: ChallengeStore,
    otp_per_hour: u64,
    max_verify_attempts: u64,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn EphemeralStore>,
        challenges: ChallengeStore,
        otp_per_hour: u64,
        max_verify_attempts: u64,
    ) -> Self {
        Self {
            store,
            challenges,
            otp_per_hour,
            max_verify_attempts,
        }
    }

    /// Count one signup request against the hourly issuance cap.
    ///
    /// The increment happens first and the cap is checked on the returned value, so two
    /// instances racing on the same phone cannot both slip under the limit.
    pub async fn check_issuance(&self, phone: &str) -> AppResult<()> {
        let count = match self
            .store
            .incr_with_expiry(&signup_key(phone), ISSUANCE_WINDOW)
            .await
        {
            Ok(count) => count,
            Err(e) => {
                log::error!("Failed to check signup rate limit for {phone}: {e}");
                return Ok(());
            }
        };

        if count > self.otp_per_hour {
            log::warn!("Signup rate limit hit for {phone} ({count} requests this hour)");
            return Err(AppError::RateLimited(
                "Too many signup attempts. Please try again later.".to_string(),
            ));
        }

        Ok(())
    }

    /// Take one verification attempt out of the budget for `phone`.
    ///
    /// Like issuance, the counter is bumped before anything is checked, so a burst of
    /// parallel guesses cannot all read a count under the cap. Every call spends an
    /// attempt; only a fresh challenge (or a completed signup) resets the budget.
    pub async fn reserve_verification(&self, phone: &str) -> AppResult<()> {
        let attempts = match self.challenges.increment_attempts(phone).await {
            Ok(attempts) => attempts,
            Err(e) => {
                log::error!("Failed to check verify rate limit for {phone}: {e}");
                return Ok(());
            }
        };

        if attempts > self.max_verify_attempts {
            log::warn!("Verify attempt cap reached for {phone} ({attempts} attempts)");
            return Err(AppError::RateLimited(
                "Too many verification attempts. Please request a new OTP.".to_string(),
            ));
        }

        Ok(())
    }
}
