//! Prometheus metrics for ticket reconciliation.
//!
//! [`ReconcileMetrics`] owns a dedicated [`Registry`]; [`serve_metrics`]
//! exposes it in the text exposition format on `/metrics`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::reconcile::ReconcileStats;

pub struct ReconcileMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Completed reconciliation passes.
    pub passes: IntCounter,
    /// Passes aborted because the ticket listing failed.
    pub failed_passes: IntCounter,
    /// Tickets skipped over detail, address, decode or header failures.
    pub skipped_tickets: IntCounter,
    /// `getblockheader` round-trips made by height caches.
    pub header_lookups: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub live_tickets: IntGauge,
    pub ignored_low_fee_tickets: IntGauge,
    /// Live tickets taken from the confirmed-low-fee set.
    pub carried_over_tickets: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    pub pass_duration_ms: Histogram,
}

impl ReconcileMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let passes = register_int_counter_with_registry!(
            Opts::new(
                "stakepoold_reconcile_passes_total",
                "Completed ticket reconciliation passes"
            ),
            registry
        )
        .expect("failed to register passes counter");

        let failed_passes = register_int_counter_with_registry!(
            Opts::new(
                "stakepoold_reconcile_failed_passes_total",
                "Reconciliation passes aborted by a ticket listing failure"
            ),
            registry
        )
        .expect("failed to register failed_passes counter");

        let skipped_tickets = register_int_counter_with_registry!(
            Opts::new(
                "stakepoold_skipped_tickets_total",
                "Tickets skipped during reconciliation"
            ),
            registry
        )
        .expect("failed to register skipped_tickets counter");

        let header_lookups = register_int_counter_with_registry!(
            Opts::new(
                "stakepoold_block_header_lookups_total",
                "Block header lookups issued to the node"
            ),
            registry
        )
        .expect("failed to register header_lookups counter");

        let live_tickets = register_int_gauge_with_registry!(
            Opts::new("stakepoold_live_tickets", "Tickets the pool votes"),
            registry
        )
        .expect("failed to register live_tickets gauge");

        let ignored_low_fee_tickets = register_int_gauge_with_registry!(
            Opts::new(
                "stakepoold_ignored_low_fee_tickets",
                "Tickets ignored for paying too little pool fee"
            ),
            registry
        )
        .expect("failed to register ignored_low_fee_tickets gauge");

        let carried_over_tickets = register_int_gauge_with_registry!(
            Opts::new(
                "stakepoold_added_low_fee_tickets",
                "Live tickets accepted despite a low fee"
            ),
            registry
        )
        .expect("failed to register carried_over_tickets gauge");

        // 1 ms → ~32 s.
        let pass_duration_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "stakepoold_reconcile_duration_ms",
                "Reconciliation pass duration in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(1.0, 2.0, 16).unwrap()),
            registry
        )
        .expect("failed to register pass_duration_ms histogram");

        Self {
            registry,
            passes,
            failed_passes,
            skipped_tickets,
            header_lookups,
            live_tickets,
            ignored_low_fee_tickets,
            carried_over_tickets,
            pass_duration_ms,
        }
    }

    pub fn observe_pass(&self, stats: &ReconcileStats, elapsed: Duration) {
        self.passes.inc();
        self.skipped_tickets.inc_by(stats.skipped as u64);
        self.header_lookups.inc_by(stats.header_lookups as u64);
        self.live_tickets.set(stats.live as i64);
        self.ignored_low_fee_tickets.set(stats.ignored_low_fee as i64);
        self.carried_over_tickets.set(stats.carried_over as i64);
        self.pass_duration_ms.observe(elapsed.as_secs_f64() * 1000.0);
    }

    /// Render every registered metric in the text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for ReconcileMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serve `/metrics` on `0.0.0.0:port` until shutdown.
pub async fn serve_metrics(
    port: u16,
    metrics: Arc<ReconcileMetrics>,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("metrics endpoint listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}

async fn metrics_handler(State(metrics): State<Arc<ReconcileMetrics>>) -> impl IntoResponse {
    match metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            warn!("failed to encode metrics: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                e.to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_pass_updates_gauges_and_counters() {
        let metrics = ReconcileMetrics::new();
        let stats = ReconcileStats {
            total: 5,
            live: 3,
            ignored_low_fee: 1,
            carried_over: 1,
            skipped: 1,
            header_lookups: 2,
            ..Default::default()
        };
        metrics.observe_pass(&stats, Duration::from_millis(12));
        metrics.observe_pass(&stats, Duration::from_millis(8));

        assert_eq!(metrics.passes.get(), 2);
        assert_eq!(metrics.skipped_tickets.get(), 2);
        assert_eq!(metrics.header_lookups.get(), 4);
        assert_eq!(metrics.live_tickets.get(), 3);
        assert_eq!(metrics.pass_duration_ms.get_sample_count(), 2);
    }

    #[test]
    fn render_includes_metric_names() {
        let metrics = ReconcileMetrics::new();
        metrics.failed_passes.inc();
        let text = metrics.render().unwrap();
        assert!(text.contains("stakepoold_reconcile_failed_passes_total 1"));
        assert!(text.contains("stakepoold_live_tickets"));
    }
}
