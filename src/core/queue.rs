//! Named Redis lists used as at-least-once work queues.
//!
//! Producers `LPUSH` JSON payloads; consumers `RPOP` and sleep briefly when the
//! list is empty. Consumers must tolerate duplicate deliveries.

use redis::RedisError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::redis::RedisHandle;

pub(crate) const GENERATION_QUEUE: &str = "quiz_generation";
pub(crate) const NOTIFICATION_QUEUE: &str = "quiz_notifications";

#[derive(Debug, Error)]
pub(crate) enum QueueError {
    #[error("queue transport failed: {0}")]
    Transport(#[from] RedisError),
    #[error("failed to encode job: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode job payload {payload:?}: {source}")]
    Decode {
        payload: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct GenerationJob {
    pub(crate) request_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct NotificationJob {
    pub(crate) chat_id: String,
    pub(crate) message: String,
}

#[derive(Clone)]
pub(crate) struct JobQueue {
    redis: RedisHandle,
}

impl JobQueue {
    pub(crate) fn new(redis: RedisHandle) -> Self {
        Self { redis }
    }

    pub(crate) async fn enqueue<T: Serialize>(&self, queue: &str, job: &T) -> Result<(), QueueError> {
        let payload = serde_json::to_string(job).map_err(QueueError::Encode)?;
        self.redis.push_front(queue, payload).await?;
        metrics::counter!("queue_jobs_enqueued_total", "queue" => queue.to_string()).increment(1);
        Ok(())
    }

    pub(crate) async fn dequeue<T: DeserializeOwned>(
        &self,
        queue: &str,
    ) -> Result<Option<T>, QueueError> {
        let Some(payload) = self.redis.pop_back(queue).await? else {
            return Ok(None);
        };

        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|source| QueueError::Decode { payload, source })
    }

    pub(crate) async fn depth(&self, queue: &str) -> Result<u64, QueueError> {
        Ok(self.redis.list_len(queue).await?)
    }
}
