use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError, Script};
use std::sync::LazyLock;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::store::EphemeralStore;

// INCR and the first PEXPIRE must land together, or a crash in between leaves a
// counter that never expires.
static INCR_WITH_EXPIRY: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local count = redis.call('INCR', KEYS[1])
        if count == 1 then
            redis.call('PEXPIRE', KEYS[1], ARGV[1])
        end
        return count
        ",
    )
});

fn store_error(e: RedisError) -> AppError {
    AppError::StoreUnavailable(format!("Redis error: {e}"))
}

fn millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

/// Redis-backed store shared by all instances. `ConnectionManager` reconnects on its
/// own and is cheap to clone per call.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> AppResult<Self> {
        let client = Client::open(url).map_err(store_error)?;
        let conn = ConnectionManager::new(client).await.map_err(store_error)?;
        log::info!("Connected to Redis ephemeral store");
        Ok(Self { conn })
    }
}

#[async_trait]
impl EphemeralStore for RedisStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn del(&self, keys: &[&str]) -> AppResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: u64 = redis::cmd("DEL")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> AppResult<u64> {
        let mut conn = self.conn.clone();
        let count: u64 = INCR_WITH_EXPIRY
            .key(key)
            .arg(millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_malformed_url_is_store_unavailable() {
        let err = RedisStore::connect("not a redis url").await.err().unwrap();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
    }

    #[test]
    fn test_ttl_is_never_rounded_to_zero() {
        assert_eq!(millis(Duration::from_secs(300)), 300_000);
        assert_eq!(millis(Duration::from_micros(10)), 1);
    }

    /// Runs against a live server when `REDIS_URL` is set.
    #[tokio::test]
    async fn test_store_contract_against_live_redis() {
        let Ok(url) = std::env::var("REDIS_URL") else {
            return;
        };
        let store = RedisStore::connect(&url).await.unwrap();
        let key = format!("otp-signup-test:{}", uuid::Uuid::new_v4());
        let counter = format!("{key}:count");

        store
            .set_ex(&key, "hash".to_string(), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("hash"));

        let ttl = Duration::from_secs(30);
        assert_eq!(store.incr_with_expiry(&counter, ttl).await.unwrap(), 1);
        assert_eq!(store.incr_with_expiry(&counter, ttl).await.unwrap(), 2);

        store.del(&[key.as_str(), counter.as_str()]).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), None);
        assert_eq!(store.incr_with_expiry(&counter, ttl).await.unwrap(), 1);
        store.del(&[counter.as_str()]).await.unwrap();
    }
}
