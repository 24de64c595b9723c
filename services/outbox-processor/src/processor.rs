//! Dispatcher + notification-listener + worker pool topology, and the
//! per-entry state machine that drains the outbox store.

use crate::metrics::OutboxMetrics;
use event_log::EventLog;
use event_store::{EventStore, EventStoreError};
use outbox_store::{OutboxEntry, OutboxRepository, PgOutboxListener};
use resilience::CircuitBreaker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct OutboxProcessorHandles {
    pub dispatcher: tokio::task::JoinHandle<()>,
    pub listener: tokio::task::JoinHandle<()>,
    pub workers: Vec<tokio::task::JoinHandle<()>>,
}

/// Spawns the dispatcher, notification-listener, and `worker_count`
/// worker fibers wired through a bounded work channel of capacity
/// `batch_size`, per spec's topology for the outbox processor.
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    outbox: Arc<dyn OutboxRepository>,
    event_store: Arc<dyn EventStore>,
    event_log: Arc<dyn EventLog>,
    circuit_breaker: CircuitBreaker,
    mut listener: PgOutboxListener,
    metrics: Arc<OutboxMetrics>,
    worker_count: usize,
    batch_size: i64,
    max_retries: i32,
    poll_interval: Duration,
    cancel: CancellationToken,
) -> OutboxProcessorHandles {
    let (work_tx, work_rx) = mpsc::channel::<OutboxEntry>(batch_size.max(1) as usize);
    let (notify_tx, notify_rx) = mpsc::channel::<Uuid>(1);

    let listener_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("notification listener shutting down");
                        return;
                    }
                    result = listener.recv() => {
                        match result {
                            Ok(event_id) => {
                                if notify_tx.send(event_id).await.is_err() {
                                    return;
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "outbox listen error, retrying shortly");
                                tokio::time::sleep(Duration::from_secs(1)).await;
                            }
                        }
                    }
                }
            }
        })
    };

    let dispatcher_handle = {
        let outbox = outbox.clone();
        let cancel = cancel.clone();
        let metrics = metrics.clone();
        tokio::spawn(dispatcher_loop(
            outbox, work_tx, notify_rx, batch_size, poll_interval, cancel, metrics,
        ))
    };

    let work_rx = Arc::new(tokio::sync::Mutex::new(work_rx));
    let mut workers = Vec::with_capacity(worker_count);
    for id in 0..worker_count {
        let work_rx = work_rx.clone();
        let outbox = outbox.clone();
        let event_store = event_store.clone();
        let event_log = event_log.clone();
        let circuit_breaker = circuit_breaker.clone();
        let metrics = metrics.clone();
        let cancel = cancel.clone();
        workers.push(tokio::spawn(async move {
            worker_loop(
                id,
                work_rx,
                outbox,
                event_store,
                event_log,
                circuit_breaker,
                max_retries,
                metrics,
                cancel,
            )
            .await;
        }));
    }

    OutboxProcessorHandles {
        dispatcher: dispatcher_handle,
        listener: listener_handle,
        workers,
    }
}

async fn dispatcher_loop(
    outbox: Arc<dyn OutboxRepository>,
    work_tx: mpsc::Sender<OutboxEntry>,
    mut notify_rx: mpsc::Receiver<Uuid>,
    batch_size: i64,
    poll_interval: Duration,
    cancel: CancellationToken,
    metrics: Arc<OutboxMetrics>,
) {
    let mut watchdog = tokio::time::interval(poll_interval);
    watchdog.reset();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("outbox dispatcher shutting down");
                return;
            }
            notified = notify_rx.recv() => {
                if notified.is_none() {
                    warn!("notification channel closed, dispatcher falling back to poll-only");
                }
                watchdog.reset();
                if !fetch_and_enqueue(&outbox, &work_tx, batch_size, &metrics).await {
                    return;
                }
            }
            _ = watchdog.tick() => {
                if !fetch_and_enqueue(&outbox, &work_tx, batch_size, &metrics).await {
                    return;
                }
            }
        }
    }
}

async fn fetch_and_enqueue(
    outbox: &Arc<dyn OutboxRepository>,
    work_tx: &mpsc::Sender<OutboxEntry>,
    batch_size: i64,
    metrics: &OutboxMetrics,
) -> bool {
    match outbox.fetch_pending(batch_size).await {
        Ok(entries) => {
            if let Ok((pending, age)) = outbox.pending_stats().await {
                metrics.pending.set(pending);
                metrics.oldest_pending_age_seconds.set(age);
            }
            for entry in entries {
                if work_tx.send(entry).await.is_err() {
                    return false;
                }
            }
            true
        }
        Err(e) => {
            error!(error = %e, "failed to fetch pending outbox entries");
            true
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    id: usize,
    work_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<OutboxEntry>>>,
    outbox: Arc<dyn OutboxRepository>,
    event_store: Arc<dyn EventStore>,
    event_log: Arc<dyn EventLog>,
    circuit_breaker: CircuitBreaker,
    max_retries: i32,
    metrics: Arc<OutboxMetrics>,
    cancel: CancellationToken,
) {
    loop {
        let entry = {
            let mut rx = work_rx.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                entry = rx.recv() => entry,
            }
        };

        let Some(entry) = entry else {
            info!(worker_id = id, "outbox worker shutting down");
            return;
        };

        process_entry(
            &entry,
            &outbox,
            &event_store,
            &event_log,
            &circuit_breaker,
            max_retries,
            &metrics,
        )
        .await;
    }
}

/// Runs the S0→S1→S2→S3 state machine for a single outbox entry.
///
/// `pub(crate)` (rather than private) so the integration test suite
/// under `tests/`, which recompiles this module via `#[path]` to drive
/// it against a real Postgres instance, can call it directly.
pub(crate) async fn process_entry(
    entry: &OutboxEntry,
    outbox: &Arc<dyn OutboxRepository>,
    event_store: &Arc<dyn EventStore>,
    event_log: &Arc<dyn EventLog>,
    circuit_breaker: &CircuitBreaker,
    max_retries: i32,
    metrics: &OutboxMetrics,
) {
    // S0: pre-flight
    if entry.retry_count >= max_retries {
        error!(
            outbox_id = %entry.outbox_id,
            event_id = %entry.envelope.event_id,
            retry_count = entry.retry_count,
            "outbox entry exceeded max_retries, leaving in place as evidence"
        );
        metrics.leaked.inc();
        return;
    }

    // S1: event-store insert
    match event_store.insert(&entry.envelope).await {
        Ok(()) | Err(EventStoreError::DuplicateKey(_)) => {}
        Err(e) => {
            warn!(outbox_id = %entry.outbox_id, error = %e, "event store insert failed, will retry");
            increment_retry(outbox, entry.outbox_id).await;
            return;
        }
    }

    // S2: log publish, wrapped in the circuit breaker so a degraded
    // broker fails fast instead of piling up in-flight publishes.
    let log = event_log.clone();
    let envelope = entry.envelope.clone();
    let publish_result = circuit_breaker
        .call(|| {
            let log = log.clone();
            let envelope = envelope.clone();
            async move { log.publish(&envelope).await.map_err(|e| e.to_string()) }
        })
        .await;

    if let Err(e) = publish_result {
        warn!(outbox_id = %entry.outbox_id, error = %e, "event log publish failed, will retry");
        increment_retry(outbox, entry.outbox_id).await;
        return;
    }

    // S3: outbox delete
    match outbox.delete(entry.outbox_id).await {
        Ok(()) => {
            metrics.published.inc();
        }
        Err(e) => {
            // Duplicate re-processing is safe because S1 and S2 are
            // idempotent, so this entry simply gets drained again.
            error!(outbox_id = %entry.outbox_id, error = %e, "outbox delete failed after successful publish");
        }
    }
}

async fn increment_retry(outbox: &Arc<dyn OutboxRepository>, outbox_id: Uuid) {
    if let Err(e) = outbox.increment_retry(outbox_id).await {
        error!(outbox_id = %outbox_id, error = %e, "failed to increment retry count");
    }
}
