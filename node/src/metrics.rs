//! # Prometheus Metrics
//!
//! Registry and vault activity, scraped by Prometheus at `/metrics` on the
//! metrics port. Everything lives in a dedicated [`prometheus::Registry`]
//! under the `nullifier` namespace.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metric handles for the node. Clones share the underlying metrics.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Credentials minted since start.
    pub credentials_minted_total: IntCounter,
    /// Credentials revoked since start (idempotent repeats not counted).
    pub credentials_revoked_total: IntCounter,
    /// Successful vault deposits and share mints.
    pub deposits_total: IntCounter,
    /// Successful vault withdrawals and redemptions.
    pub withdrawals_total: IntCounter,
    /// Signed calls rejected by a contract or by envelope checks.
    pub rejected_calls_total: IntCounter,
    /// Credentials live right now.
    pub live_credentials: IntGauge,
    /// Sum of `total_assets` across vaults, in base units.
    pub total_value_locked: Gauge,
    /// Time spent executing a signed call under the devnet lock.
    pub call_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("nullifier".into()), None)?;

        let credentials_minted_total = IntCounter::new(
            "credentials_minted_total",
            "Total number of accreditation credentials minted",
        )?;
        registry.register(Box::new(credentials_minted_total.clone()))?;

        let credentials_revoked_total = IntCounter::new(
            "credentials_revoked_total",
            "Total number of accreditation credentials revoked",
        )?;
        registry.register(Box::new(credentials_revoked_total.clone()))?;

        let deposits_total =
            IntCounter::new("deposits_total", "Total number of successful vault deposits")?;
        registry.register(Box::new(deposits_total.clone()))?;

        let withdrawals_total = IntCounter::new(
            "withdrawals_total",
            "Total number of successful vault withdrawals",
        )?;
        registry.register(Box::new(withdrawals_total.clone()))?;

        let rejected_calls_total = IntCounter::new(
            "rejected_calls_total",
            "Total number of rejected contract calls",
        )?;
        registry.register(Box::new(rejected_calls_total.clone()))?;

        let live_credentials =
            IntGauge::new("live_credentials", "Number of currently live credentials")?;
        registry.register(Box::new(live_credentials.clone()))?;

        let total_value_locked = Gauge::new(
            "total_value_locked",
            "Assets held across all compliant vaults, in base units",
        )?;
        registry.register(Box::new(total_value_locked.clone()))?;

        let call_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "call_latency_seconds",
                "Contract call execution latency in seconds",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        )?;
        registry.register(Box::new(call_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            credentials_minted_total,
            credentials_revoked_total,
            deposits_total,
            withdrawals_total,
            rejected_calls_total,
            live_credentials,
            total_value_locked,
            call_latency_seconds,
        })
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_are_namespaced() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.credentials_minted_total.inc();
        metrics.total_value_locked.set(1_000.0);
        let text = metrics.encode().unwrap();
        assert!(text.contains("nullifier_credentials_minted_total 1"));
        assert!(text.contains("nullifier_total_value_locked 1000"));
    }
}
