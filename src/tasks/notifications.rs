use crate::core::queue::{JobQueue, NotificationJob, QueueError, NOTIFICATION_QUEUE};
use crate::services::telegram::{TelegramClient, TelegramError};

/// Delivers one queued guardian message. Delivery failures are logged and the
/// job is dropped; only queue transport errors surface to the caller.
pub(crate) async fn deliver_next(
    queue: &JobQueue,
    telegram: &TelegramClient,
) -> Result<bool, QueueError> {
    let job = match queue.dequeue::<NotificationJob>(NOTIFICATION_QUEUE).await {
        Ok(Some(job)) => job,
        Ok(None) => return Ok(false),
        Err(QueueError::Decode { payload, source }) => {
            tracing::error!(payload, error = %source, "Dropping malformed notification job");
            return Ok(true);
        }
        Err(err) => return Err(err),
    };

    let outcome = match telegram.send_message(&job.chat_id, &job.message).await {
        Ok(()) => "sent",
        Err(TelegramError::Disabled) => {
            tracing::debug!(chat_id = %job.chat_id, "Telegram disabled, dropping notification");
            "disabled"
        }
        Err(err) => {
            tracing::warn!(chat_id = %job.chat_id, error = %err, "Failed to deliver notification");
            "failed"
        }
    };

    metrics::counter!("notifications_total", "stage" => "delivery", "outcome" => outcome)
        .increment(1);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::telegram::tests::spawn_bot_api;
    use crate::test_support;

    #[tokio::test]
    async fn queued_messages_are_sent_or_dropped() {
        let _guard = test_support::env_lock().await;
        let redis = test_support::connect_test_redis().await;
        let base_url = spawn_bot_api().await;
        let settings = test_support::telegram_test_settings(&base_url, "good-token", true);
        test_support::reset_redis(settings.redis().redis_url()).await.unwrap();
        let telegram = TelegramClient::from_settings(&settings).unwrap();
        let queue = JobQueue::new(redis);

        for chat_id in ["42", "blocked"] {
            let job = NotificationJob { chat_id: chat_id.to_string(), message: "hi".to_string() };
            queue.enqueue(NOTIFICATION_QUEUE, &job).await.unwrap();
        }

        assert!(deliver_next(&queue, &telegram).await.unwrap());
        assert!(deliver_next(&queue, &telegram).await.unwrap());
        assert!(!deliver_next(&queue, &telegram).await.unwrap());
        assert_eq!(queue.depth(NOTIFICATION_QUEUE).await.unwrap(), 0);
    }
}
