//! Prometheus metrics for the projection updater, following the same
//! registration pattern as the outbox processor's `OutboxMetrics`.

use actix_web::HttpResponse;
use prometheus::{Encoder, IntCounter, Opts, TextEncoder};
use tracing::warn;

/// `GET /metrics` on the updater's standalone metrics server (same
/// rationale as the outbox processor's `serve_metrics`: this consumer
/// loop has no other HTTP surface).
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
pub struct ProjectionMetrics {
    pub consumed: IntCounter,
    pub applied: IntCounter,
    pub stale: IntCounter,
    pub handler_errors: IntCounter,
    pub deserialization_errors: IntCounter,
}

impl ProjectionMetrics {
    pub fn new(service: &str) -> Self {
        let registry = prometheus::default_registry();

        let consumed = counter(
            "projection_events_consumed_total",
            "Total number of event log records consumed",
            service,
        );
        let applied = counter(
            "projection_events_applied_total",
            "Total number of LWW upserts accepted as newer than stored state",
            service,
        );
        let stale = counter(
            "projection_events_stale_total",
            "Total number of LWW upserts rejected as out-of-order",
            service,
        );
        let handler_errors = counter(
            "projection_handler_errors_total",
            "Total number of projection handler errors",
            service,
        );
        let deserialization_errors = counter(
            "projection_deserialization_errors_total",
            "Total number of envelopes that failed to decode",
            service,
        );

        for metric in [
            Box::new(consumed.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(applied.clone()),
            Box::new(stale.clone()),
            Box::new(handler_errors.clone()),
            Box::new(deserialization_errors.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                warn!("failed to register projection metric: {}", e);
            }
        }

        Self {
            consumed,
            applied,
            stale,
            handler_errors,
            deserialization_errors,
        }
    }
}

fn counter(name: &str, help: &str, service: &str) -> IntCounter {
    IntCounter::with_opts(Opts::new(name, help).const_label("service", service.to_string()))
        .unwrap_or_else(|_| panic!("valid metric opts for {name}"))
}
