use std::sync::Arc;

use sqlx::PgPool;

use crate::core::{config::Settings, queue::JobQueue, redis::RedisHandle};

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    redis: RedisHandle,
    queue: JobQueue,
}

impl AppState {
    pub(crate) fn new(settings: Settings, db: PgPool, redis: RedisHandle) -> Self {
        let queue = JobQueue::new(redis.clone());
        Self { inner: Arc::new(InnerState { settings, db, redis, queue }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn queue(&self) -> &JobQueue {
        &self.inner.queue
    }
}
