//! Guardian notifications for recorded quiz attempts.
//!
//! Scoring hands a [`ResultNotice`] over after commit; the message is built here
//! and pushed onto the notification queue for the worker to deliver. Every
//! failure on this path is logged and counted, never returned to the caller.

use std::time::Duration;

use sqlx::PgPool;

use crate::core::queue::{JobQueue, NotificationJob, NOTIFICATION_QUEUE};
use crate::core::state::AppState;
use crate::db::types::AttemptVerdict;
use crate::repositories;
use crate::repositories::users::GuardianContact;

const DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub(crate) struct ResultNotice {
    pub(crate) student_id: String,
    pub(crate) quiz_title: String,
    pub(crate) total_score: f64,
    pub(crate) total_points: f64,
    pub(crate) verdict: AttemptVerdict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NotifyOutcome {
    /// No guardian, or the guardian has no chat destination.
    Skipped,
    Enqueued,
    Failed,
}

impl NotifyOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Enqueued => "enqueued",
            Self::Failed => "failed",
        }
    }
}

pub(crate) fn build_result_message(contact: &GuardianContact, notice: &ResultNotice) -> String {
    let verdict = if notice.verdict.is_passed() { "passed ✅" } else { "failed ❌" };
    format!(
        "Hello, <b>{guardian}</b>!\n\n\
         <b>{student}</b> has finished the quiz «{quiz}».\n\
         Score: <b>{score}/{total}</b>\n\
         Result: <b>{verdict}</b>",
        guardian = escape_html(&contact.guardian_name),
        student = escape_html(&contact.student_name),
        quiz = escape_html(&notice.quiz_title),
        score = format_points(notice.total_score),
        total = format_points(notice.total_points),
    )
}

fn format_points(value: f64) -> String {
    if value.fract() == 0.0 {
        return format!("{value:.0}");
    }
    let formatted = format!("{value:.2}");
    formatted.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn escape_html(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub(crate) async fn maybe_notify(
    pool: &PgPool,
    queue: &JobQueue,
    notice: &ResultNotice,
) -> NotifyOutcome {
    let contact = match repositories::users::find_guardian_contact(pool, &notice.student_id).await {
        Ok(Some(contact)) => contact,
        Ok(None) => return record(NotifyOutcome::Skipped),
        Err(err) => {
            tracing::warn!(
                student_id = %notice.student_id,
                error = %err,
                "Failed to look up guardian for quiz result notification"
            );
            return record(NotifyOutcome::Failed);
        }
    };

    let job = NotificationJob {
        chat_id: contact.chat_id.clone(),
        message: build_result_message(&contact, notice),
    };

    match queue.enqueue(NOTIFICATION_QUEUE, &job).await {
        Ok(()) => {
            tracing::debug!(student_id = %notice.student_id, "Quiz result notification enqueued");
            record(NotifyOutcome::Enqueued)
        }
        Err(err) => {
            tracing::warn!(
                student_id = %notice.student_id,
                error = %err,
                "Failed to enqueue quiz result notification"
            );
            record(NotifyOutcome::Failed)
        }
    }
}

fn record(outcome: NotifyOutcome) -> NotifyOutcome {
    metrics::counter!("notifications_total", "stage" => "dispatch", "outcome" => outcome.as_str())
        .increment(1);
    outcome
}

/// Runs [`maybe_notify`] on a detached task with a bounded duration.
pub(crate) fn spawn_result_notice(state: AppState, notice: ResultNotice) {
    tokio::spawn(async move {
        let dispatch = maybe_notify(state.db(), state.queue(), &notice);
        if tokio::time::timeout(DISPATCH_TIMEOUT, dispatch).await.is_err() {
            tracing::warn!(student_id = %notice.student_id, "Quiz result notification timed out");
            record(NotifyOutcome::Failed);
        }
    });
}
