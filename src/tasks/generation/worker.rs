use anyhow::{Context, Result};

use crate::core::queue::{GenerationJob, QueueError, GENERATION_QUEUE};
use crate::core::state::AppState;
use crate::services::quiz_generation::{GenerationOutcome, QuizGenerator};

/// Pulls one generation job off the queue and drives its ledger entry to a
/// terminal state. Returns `false` when the queue was empty.
pub(crate) async fn process_next_job(state: &AppState, generator: &QuizGenerator) -> Result<bool> {
    let job = match state.queue().dequeue::<GenerationJob>(GENERATION_QUEUE).await {
        Ok(Some(job)) => job,
        Ok(None) => return Ok(false),
        Err(QueueError::Decode { payload, source }) => {
            tracing::error!(payload, error = %source, "Dropping malformed generation job");
            return Ok(true);
        }
        Err(err) => return Err(err).context("Failed to dequeue generation job"),
    };

    let request_id = job.request_id;
    let outcome = generator
        .generate(state.db(), &request_id)
        .await
        .with_context(|| format!("Failed to process generation request {request_id}"))?;

    match outcome {
        GenerationOutcome::Skipped => {
            tracing::debug!(request_id, "Generation request already taken, skipping");
        }
        GenerationOutcome::Completed { quiz_id } => {
            tracing::info!(request_id, quiz_id, "Generation request completed");
        }
        GenerationOutcome::Failed { code } => {
            tracing::warn!(request_id, code, "Generation request failed");
        }
    }

    Ok(true)
}
