mod maintenance;
mod worker;

pub(crate) use maintenance::{fail_stale_requests, requeue_orphaned_requests};
pub(crate) use worker::process_next_job;
