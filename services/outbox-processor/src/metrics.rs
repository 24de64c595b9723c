//! Prometheus metrics for the outbox processor, mirroring the teacher's
//! `transactional-outbox::metrics::OutboxMetrics` shape with a `leaked`
//! counter added for S0 LEAK terminations.

use actix_web::HttpResponse;
use prometheus::{Encoder, IntCounter, IntGauge, Opts, TextEncoder};
use tracing::warn;

/// `GET /metrics` on the processor's standalone metrics server, in the
/// teacher's `serve_metrics` style (e.g. `streaming-service::metrics`):
/// this worker has no other HTTP surface, so metrics get their own tiny
/// actix app bound to `metrics_port`.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

#[derive(Clone)]
pub struct OutboxMetrics {
    pub pending: IntGauge,
    pub oldest_pending_age_seconds: IntGauge,
    pub published: IntCounter,
    pub leaked: IntCounter,
}

impl OutboxMetrics {
    pub fn new(service: &str) -> Self {
        let registry = prometheus::default_registry();

        let pending = IntGauge::with_opts(
            Opts::new(
                "outbox_pending_count",
                "Number of pending outbox entries currently awaiting fan-out",
            )
            .const_label("service", service.to_string()),
        )
        .expect("valid metric opts for outbox_pending_count");

        let oldest_pending_age_seconds = IntGauge::with_opts(
            Opts::new(
                "outbox_oldest_pending_age_seconds",
                "Age in seconds of the oldest pending outbox entry",
            )
            .const_label("service", service.to_string()),
        )
        .expect("valid metric opts for outbox_oldest_pending_age_seconds");

        let published = IntCounter::with_opts(
            Opts::new(
                "outbox_published_total",
                "Total number of outbox entries successfully drained (S3 terminal OK)",
            )
            .const_label("service", service.to_string()),
        )
        .expect("valid metric opts for outbox_published_total");

        let leaked = IntCounter::with_opts(
            Opts::new(
                "outbox_leaked_total",
                "Total number of outbox entries terminated at S0 LEAK (retry_count exhausted)",
            )
            .const_label("service", service.to_string()),
        )
        .expect("valid metric opts for outbox_leaked_total");

        for metric in [
            Box::new(pending.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(oldest_pending_age_seconds.clone()),
            Box::new(published.clone()),
            Box::new(leaked.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                warn!("failed to register outbox metric: {}", e);
            }
        }

        Self {
            pending,
            oldest_pending_age_seconds,
            published,
            leaked,
        }
    }
}
