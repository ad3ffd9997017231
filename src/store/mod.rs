//! Ephemeral key/value storage with per-key time-to-live.
//!
//! Challenges and rate windows live here. Every key carries its own expiry so that a
//! flow abandoned halfway (crash, cancelled request) cleans itself up. Counters use
//! [`EphemeralStore::incr_with_expiry`], which fixes the expiry on the first increment
//! and never extends it.
//!
//! [`RedisStore`] is the production backend and is shared by every instance behind the
//! load balancer. [`MemoryStore`] only sees its own process.

pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::AppResult;

#[async_trait]
pub trait EphemeralStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Set `key`, replacing any previous value and expiry.
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> AppResult<()>;

    /// Remove keys; absent keys are ignored.
    async fn del(&self, keys: &[&str]) -> AppResult<()>;

    /// Atomically add one to the counter at `key` and return the new value.
    /// A missing or expired counter starts at 1 with expiry `now + ttl`.
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> AppResult<u64>;
}
