use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, sleep, Duration};

use crate::core::shutdown::{shutdown_signal, wait_for};
use crate::core::state::AppState;
use crate::services::quiz_generation::QuizGenerator;
use crate::services::telegram::TelegramClient;
use crate::tasks::{generation, notifications};

const IDLE_POLL: Duration = Duration::from_secs(2);
const REQUEUE_INTERVAL: Duration = Duration::from_secs(60);
const STALE_INTERVAL: Duration = Duration::from_secs(300);

pub(crate) async fn run(state: AppState) -> Result<()> {
    let generator = QuizGenerator::from_settings(state.settings())?;
    let telegram = TelegramClient::from_settings(state.settings())?;
    let concurrency = state.settings().worker().generation_concurrency.max(1);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::with_capacity(concurrency + 3);

    for _ in 0..concurrency {
        handles.push(tokio::spawn(generation_worker(
            state.clone(),
            generator.clone(),
            shutdown_rx.clone(),
        )));
    }

    handles.push(tokio::spawn(notification_worker(
        state.clone(),
        telegram,
        shutdown_rx.clone(),
    )));
    handles.push(tokio::spawn(requeue_loop(state.clone(), shutdown_rx.clone())));
    handles.push(tokio::spawn(stale_loop(state.clone(), shutdown_rx.clone())));

    tracing::info!(generation_workers = concurrency, "Background workers started");

    shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Background task join failed");
        }
    }

    Ok(())
}

async fn generation_worker(
    state: AppState,
    generator: QuizGenerator,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        match generation::process_next_job(&state, &generator).await {
            Ok(true) => continue,
            Ok(false) => {}
            Err(err) => tracing::error!(error = ?err, "Generation worker iteration failed"),
        }

        tokio::select! {
            _ = wait_for(&mut shutdown) => break,
            _ = sleep(IDLE_POLL) => {}
        }
    }
}

async fn notification_worker(
    state: AppState,
    telegram: TelegramClient,
    mut shutdown: watch::Receiver<bool>,
) {
    if !telegram.is_enabled() {
        tracing::info!("Telegram delivery disabled, queued notifications will be dropped");
    }

    loop {
        if *shutdown.borrow() {
            break;
        }

        match notifications::deliver_next(state.queue(), &telegram).await {
            Ok(true) => continue,
            Ok(false) => {}
            Err(err) => tracing::error!(error = %err, "Failed to read notification queue"),
        }

        tokio::select! {
            _ = wait_for(&mut shutdown) => break,
            _ = sleep(IDLE_POLL) => {}
        }
    }
}

async fn requeue_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(REQUEUE_INTERVAL);
    loop {
        tokio::select! {
            _ = wait_for(&mut shutdown) => break,
            _ = tick.tick() => {
                if let Err(err) = generation::requeue_orphaned_requests(&state).await {
                    tracing::error!(error = ?err, "requeue_orphaned_requests failed");
                }
            }
        }
    }
}

async fn stale_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(STALE_INTERVAL);
    loop {
        tokio::select! {
            _ = wait_for(&mut shutdown) => break,
            _ = tick.tick() => {
                if let Err(err) = generation::fail_stale_requests(&state).await {
                    tracing::error!(error = ?err, "fail_stale_requests failed");
                }
            }
        }
    }
}
