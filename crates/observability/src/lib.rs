use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Process-wide dispatch counters. Every increment is mirrored to the `metrics`
/// facade so an installed recorder sees the same numbers.
#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    matched_total: AtomicU64,
    fallback_total: AtomicU64,
    unknown_tag_total: AtomicU64,
    classifier_failures_total: AtomicU64,
    total_latency_micros: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub matched_total: u64,
    pub fallback_total: u64,
    pub unknown_tag_total: u64,
    pub classifier_failures_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("medbot_requests_total").increment(1);
    }

    pub fn inc_matched(&self) {
        self.matched_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("medbot_dispatch_total", "outcome" => "matched").increment(1);
    }

    pub fn inc_fallback(&self) {
        self.fallback_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("medbot_dispatch_total", "outcome" => "no_confident_intent")
            .increment(1);
    }

    pub fn inc_unknown_tag(&self) {
        self.unknown_tag_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("medbot_dispatch_total", "outcome" => "unknown_tag").increment(1);
    }

    pub fn inc_classifier_failure(&self) {
        self.classifier_failures_total
            .fetch_add(1, Ordering::Relaxed);
        metrics::counter!("medbot_classifier_failures_total").increment(1);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        metrics::histogram!("medbot_request_seconds").record(duration.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_micros.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            matched_total: self.matched_total.load(Ordering::Relaxed),
            fallback_total: self.fallback_total.load(Ordering::Relaxed),
            unknown_tag_total: self.unknown_tag_total.load(Ordering::Relaxed),
            classifier_failures_total: self.classifier_failures_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64 / 1_000.0
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,medbot_api=info,medbot_agents=info,medbot_core=info,medbot_ml=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .init();
    });
}
