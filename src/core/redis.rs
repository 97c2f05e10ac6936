use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::{cmd, AsyncCommands, Client, ErrorKind, RedisError};
use tokio::sync::RwLock;

#[derive(Clone)]
pub(crate) struct RedisHandle {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

#[derive(Debug, Clone)]
pub(crate) enum RedisHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

impl RedisHandle {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let client = Client::open(self.url.clone())?;
        let manager = ConnectionManager::new(client).await?;
        let mut guard = self.manager.write().await;
        *guard = Some(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        let mut guard = self.manager.write().await;
        *guard = None;
    }

    pub(crate) async fn health(&self) -> RedisHealth {
        let Some(mut manager) = self.manager().await else {
            return RedisHealth::Disconnected;
        };

        match cmd("PING").query_async::<_, String>(&mut manager).await {
            Ok(_) => RedisHealth::Healthy,
            Err(err) => RedisHealth::Unhealthy(err.to_string()),
        }
    }

    /// Fixed-window counter. Allows everything while Redis is unavailable.
    pub(crate) async fn rate_limit(
        &self,
        key: &str,
        limit: u64,
        window_seconds: u64,
    ) -> Result<bool, RedisError> {
        let Some(mut manager) = self.manager().await else {
            return Ok(true);
        };

        let script = redis::Script::new(
            r#"
            local current = redis.call("INCR", KEYS[1])
            if current == 1 then
                redis.call("EXPIRE", KEYS[1], ARGV[1])
            end
            return current
        "#,
        );

        let current: i64 =
            script.key(key).arg(window_seconds as i64).invoke_async(&mut manager).await?;

        Ok(current <= limit as i64)
    }

    pub(crate) async fn push_front(&self, key: &str, value: String) -> Result<(), RedisError> {
        let mut manager = self.require_manager().await?;
        manager.lpush::<_, _, ()>(key, value).await
    }

    pub(crate) async fn pop_back(&self, key: &str) -> Result<Option<String>, RedisError> {
        let mut manager = self.require_manager().await?;
        manager.rpop::<_, Option<String>>(key, None).await
    }

    pub(crate) async fn list_len(&self, key: &str) -> Result<u64, RedisError> {
        let mut manager = self.require_manager().await?;
        manager.llen::<_, u64>(key).await
    }

    async fn manager(&self) -> Option<ConnectionManager> {
        self.manager.read().await.clone()
    }

    async fn require_manager(&self) -> Result<ConnectionManager, RedisError> {
        self.manager()
            .await
            .ok_or_else(|| RedisError::from((ErrorKind::IoError, "redis is not connected")))
    }
}

#[cfg(test)]
mod tests {
    use super::{RedisHandle, RedisHealth};
    use crate::test_support;
    use uuid::Uuid;

    #[tokio::test]
    async fn rate_limit_enforces_limit() {
        let _guard = test_support::env_lock().await;
        let redis = test_support::connect_test_redis().await;

        let key = format!("rate-limit:{}", Uuid::new_v4());
        let first = redis.rate_limit(&key, 1, 5).await.expect("rate limit");
        let second = redis.rate_limit(&key, 1, 5).await.expect("rate limit");

        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn list_operations_are_fifo() {
        let _guard = test_support::env_lock().await;
        let redis = test_support::connect_test_redis().await;

        let key = format!("list:{}", Uuid::new_v4());
        redis.push_front(&key, "first".to_string()).await.expect("push");
        redis.push_front(&key, "second".to_string()).await.expect("push");

        assert_eq!(redis.list_len(&key).await.expect("len"), 2);
        assert_eq!(redis.pop_back(&key).await.expect("pop").as_deref(), Some("first"));
        assert_eq!(redis.pop_back(&key).await.expect("pop").as_deref(), Some("second"));
        assert_eq!(redis.pop_back(&key).await.expect("pop"), None);
    }

    #[tokio::test]
    async fn disconnected_handle_allows_rate_limit_and_rejects_push() {
        let redis = RedisHandle::new("redis://127.0.0.1:1/0".to_string());

        assert!(matches!(redis.health().await, RedisHealth::Disconnected));
        assert!(redis.rate_limit("any", 1, 1).await.expect("rate limit"));
        assert!(redis.push_front("any", "value".to_string()).await.is_err());
    }
}
