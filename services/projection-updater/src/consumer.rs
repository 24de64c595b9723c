//! The single cooperative consumer loop (spec §4.5 "Consumer loop",
//! §5 "no worker fan-out because partition-level ordering must be
//! preserved per aggregate").

use std::sync::Arc;
use std::time::Duration;

use event_envelope::Envelope;
use event_log::KafkaEventLogConsumer;
use projection_store::ProjectionRepository;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::dispatch::{dispatch_and_apply, DispatchOutcome, DispatchRegistry};
use crate::metrics::ProjectionMetrics;

/// Runs until `cancel` fires. On each iteration: fetch a batch bounded
/// by `poll_timeout`, decode and dispatch each record, then commit the
/// batch's offsets once — after dispatch, not before, so a crash
/// mid-batch replays the un-committed suffix (at-least-once
/// consumption).
pub async fn run(
    consumer: KafkaEventLogConsumer,
    registry: DispatchRegistry,
    projections: Arc<dyn ProjectionRepository>,
    metrics: Arc<ProjectionMetrics>,
    poll_timeout: Duration,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            tracing::info!("projection updater consumer loop shutting down");
            return;
        }

        let batch = tokio::select! {
            _ = cancel.cancelled() => return,
            batch = consumer.poll_batch(poll_timeout) => batch,
        };

        if batch.is_empty() {
            continue;
        }

        for record in &batch {
            metrics.consumed.inc();

            let envelope = match Envelope::decode(&record.payload) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(
                        topic = %record.topic,
                        partition = record.partition,
                        offset = record.offset,
                        error = %e,
                        "envelope decode failed, skipping record (offset still committed)"
                    );
                    metrics.deserialization_errors.inc();
                    continue;
                }
            };

            match dispatch_and_apply(&registry, &projections, &envelope).await {
                DispatchOutcome::Unmatched => {
                    debug!(event_type = %envelope.event_type, "no handler registered, skipping");
                }
                DispatchOutcome::Applied => {
                    metrics.applied.inc();
                }
                DispatchOutcome::Stale => {
                    metrics.stale.inc();
                    debug!(
                        event_id = %envelope.event_id,
                        aggregate_id = %envelope.aggregate_id,
                        "rejected as stale by LWW, incoming event is not newer"
                    );
                }
                DispatchOutcome::HandlerError(e) => {
                    // Decided open question (spec §9 / SPEC_FULL §9): commit
                    // regardless of handler error. No DLQ in this iteration;
                    // see DESIGN.md for the follow-up.
                    metrics.handler_errors.inc();
                    error!(
                        event_id = %envelope.event_id,
                        event_type = %envelope.event_type,
                        error = %e,
                        "projection handler failed, offset will still be committed"
                    );
                }
                DispatchOutcome::RepositoryError(e) => {
                    error!(
                        event_id = %envelope.event_id,
                        error = %e,
                        "projection repository write failed, offset will still be committed"
                    );
                }
            }
        }

        if let Err(e) = consumer.commit(&batch).await {
            error!(error = %e, "failed to commit consumer offsets, batch will be replayed");
        }
    }
}
