use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::store::EphemeralStore;

fn otp_key(phone: &str) -> String {
    format!("otp:{phone}")
}

fn attempts_key(phone: &str) -> String {
    format!("otp_attempts:{phone}")
}

/// Result of checking a candidate code against the live challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeOutcome {
    Match,
    Mismatch,
    /// Never issued, already consumed, or expired.
    NotFound,
}

/// What is persisted for an outstanding code. The code itself is never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub code_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Hashed one-time codes and their failed-attempt counters, one live challenge per phone.
#[derive(Clone)]
pub struct ChallengeStore {
    store: Arc<dyn EphemeralStore>,
    hash_cost: u32,
    attempt_window: Duration,
}

impl ChallengeStore {
    pub fn new(store: Arc<dyn EphemeralStore>, hash_cost: u32, attempt_window: Duration) -> Self {
        Self {
            store,
            hash_cost,
            attempt_window,
        }
    }

    /// Store a fresh challenge for `phone`, replacing any previous one.
    ///
    /// The attempt counter is reset as well: a new issuance cycle re-opens verification.
    pub async fn issue(&self, phone: &str, code: &str, ttl: Duration) -> AppResult<Challenge> {
        let code_hash = hash_code(code, self.hash_cost).await?;
        let created_at = Utc::now();
        let expires_at = created_at
            + chrono::Duration::from_std(ttl)
                .map_err(|e| AppError::InternalError(format!("Invalid OTP ttl: {e}")))?;

        let challenge = Challenge {
            code_hash,
            created_at,
            expires_at,
        };
        let payload = serde_json::to_string(&challenge)
            .map_err(|e| AppError::InternalError(format!("Failed to encode challenge: {e}")))?;

        self.store.set_ex(&otp_key(phone), payload, ttl).await?;
        self.store.del(&[attempts_key(phone).as_str()]).await?;

        Ok(challenge)
    }

    /// Compare `candidate` with the live challenge. Never deletes on a match; the caller
    /// clears the challenge once the account actually exists.
    pub async fn verify(&self, phone: &str, candidate: &str) -> AppResult<ChallengeOutcome> {
        let Some(payload) = self.store.get(&otp_key(phone)).await? else {
            return Ok(ChallengeOutcome::NotFound);
        };

        let challenge: Challenge = match serde_json::from_str(&payload) {
            Ok(challenge) => challenge,
            Err(e) => {
                log::error!("Discarding unreadable challenge for {phone}: {e}");
                return Ok(ChallengeOutcome::NotFound);
            }
        };

        if Utc::now() >= challenge.expires_at {
            return Ok(ChallengeOutcome::NotFound);
        }

        if verify_code(candidate, &challenge.code_hash).await? {
            Ok(ChallengeOutcome::Match)
        } else {
            Ok(ChallengeOutcome::Mismatch)
        }
    }

    /// Remove the challenge and retire its attempt counter. Idempotent.
    pub async fn delete(&self, phone: &str) -> AppResult<()> {
        self.store
            .del(&[otp_key(phone).as_str(), attempts_key(phone).as_str()])
            .await
    }

    pub async fn increment_attempts(&self, phone: &str) -> AppResult<u64> {
        self.store
            .incr_with_expiry(&attempts_key(phone), self.attempt_window)
            .await
    }

    pub async fn get_attempts(&self, phone: &str) -> AppResult<u64> {
        match self.store.get(&attempts_key(phone)).await? {
            Some(v) => v.parse().map_err(|_| {
                AppError::StoreUnavailable(format!("attempt counter for {phone} is corrupt"))
            }),
            None => Ok(0),
        }
    }
}

// bcrypt is deliberately slow, keep it off the async workers.
async fn hash_code(code: &str, cost: u32) -> AppResult<String> {
    let code = code.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(code, cost))
        .await
        .map_err(|e| AppError::InternalError(format!("OTP hashing task failed: {e}")))?
        .map_err(|e| AppError::InternalError(format!("Failed to hash OTP: {e}")))
}

async fn verify_code(candidate: &str, hash: &str) -> AppResult<bool> {
    let candidate = candidate.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(candidate, &hash))
        .await
        .map_err(|e| AppError::InternalError(format!("OTP verify task failed: {e}")))?
        .map_err(|e| AppError::InternalError(format!("Failed to verify OTP: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const PHONE: &str = "+962791234567";

    fn challenges() -> (ChallengeStore, MemoryStore) {
        let memory = MemoryStore::new();
        let store = ChallengeStore::new(Arc::new(memory.clone()), 4, Duration::from_secs(3600));
        (store, memory)
    }

    #[tokio::test]
    async fn test_issue_then_verify() {
        let (store, memory) = challenges();
        store
            .issue(PHONE, "123456", Duration::from_secs(300))
            .await
            .unwrap();

        // Only the hash is at rest.
        let raw = memory.get(&otp_key(PHONE)).await.unwrap().unwrap();
        assert!(!raw.contains("123456"));

        assert_eq!(
            store.verify(PHONE, "123456").await.unwrap(),
            ChallengeOutcome::Match
        );
        assert_eq!(
            store.verify(PHONE, "654321").await.unwrap(),
            ChallengeOutcome::Mismatch
        );
        // A match does not consume the challenge.
        assert_eq!(
            store.verify(PHONE, "123456").await.unwrap(),
            ChallengeOutcome::Match
        );
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous_code() {
        let (store, _) = challenges();
        let ttl = Duration::from_secs(300);
        store.issue(PHONE, "111111", ttl).await.unwrap();
        store.issue(PHONE, "222222", ttl).await.unwrap();

        assert_eq!(
            store.verify(PHONE, "111111").await.unwrap(),
            ChallengeOutcome::Mismatch
        );
        assert_eq!(
            store.verify(PHONE, "222222").await.unwrap(),
            ChallengeOutcome::Match
        );
    }

    #[tokio::test]
    async fn test_unknown_and_deleted_challenges_are_not_found() {
        let (store, _) = challenges();
        assert_eq!(
            store.verify(PHONE, "123456").await.unwrap(),
            ChallengeOutcome::NotFound
        );

        store
            .issue(PHONE, "123456", Duration::from_secs(300))
            .await
            .unwrap();
        store.delete(PHONE).await.unwrap();
        store.delete(PHONE).await.unwrap();
        assert_eq!(
            store.verify(PHONE, "123456").await.unwrap(),
            ChallengeOutcome::NotFound
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_challenge_expires_with_store_ttl() {
        let (store, _) = challenges();
        store
            .issue(PHONE, "123456", Duration::from_secs(300))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(
            store.verify(PHONE, "123456").await.unwrap(),
            ChallengeOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_attempt_counter_lifecycle() {
        let (store, _) = challenges();
        assert_eq!(store.get_attempts(PHONE).await.unwrap(), 0);
        assert_eq!(store.increment_attempts(PHONE).await.unwrap(), 1);
        assert_eq!(store.increment_attempts(PHONE).await.unwrap(), 2);
        assert_eq!(store.get_attempts(PHONE).await.unwrap(), 2);

        // Deleting the challenge retires its counter.
        store.delete(PHONE).await.unwrap();
        assert_eq!(store.get_attempts(PHONE).await.unwrap(), 0);

        // So does a fresh issuance.
        store.increment_attempts(PHONE).await.unwrap();
        store
            .issue(PHONE, "123456", Duration::from_secs(300))
            .await
            .unwrap();
        assert_eq!(store.get_attempts(PHONE).await.unwrap(), 0);
    }
}
