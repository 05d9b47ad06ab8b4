//! Prometheus-kompatible Metriken fuer den WiFi-Pager
//!
//! Registrierte Metriken:
//! - `pager_subscribers_connected` – Gauge: Aktuell registrierte Web-Pager
//! - `pager_subscribers_registered_total` – Counter: Registrierungen seit Start
//! - `pager_subscribers_removed_total{grund}` – Counter: Entfernte Subscriber
//! - `pager_calls_total` – Counter: Erfolgreich angenommene Anrufe
//! - `pager_calls_rejected_total` – Counter: Abgelehnte Einreichungen
//! - `pager_deliveries_total` – Counter: Eingereihte Zustellungen
//! - `pager_delivery_failures_total` – Counter: Fehlgeschlagene Zustellungen
//! - `pager_http_request_duration_seconds{method}` – Histogram: HTTP-Antwortzeit

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Alle Pager-Prometheus-Metriken
///
/// Clone teilt Registry und Metriken.
#[derive(Clone)]
pub struct PagerMetrics {
    pub registry: Arc<Registry>,

    // Subscriber-Metriken
    pub subscribers_connected: IntGauge,
    pub subscribers_registered_total: IntCounter,
    pub subscribers_removed_total: IntCounterVec,

    // Anruf-Metriken
    pub calls_total: IntCounter,
    pub calls_rejected_total: IntCounter,
    pub deliveries_total: IntCounter,
    pub delivery_failures_total: IntCounter,

    // HTTP-Metriken
    pub http_request_duration_seconds: HistogramVec,
}

impl PagerMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Subscriber ---
        let subscribers_connected = IntGauge::with_opts(Opts::new(
            "pager_subscribers_connected",
            "Anzahl aktuell registrierter Web-Pager",
        ))?;
        registry.register(Box::new(subscribers_connected.clone()))?;

        let subscribers_registered_total = IntCounter::with_opts(Opts::new(
            "pager_subscribers_registered_total",
            "Gesamtanzahl registrierter Web-Pager seit Start",
        ))?;
        registry.register(Box::new(subscribers_registered_total.clone()))?;

        let subscribers_removed_total = IntCounterVec::new(
            Opts::new(
                "pager_subscribers_removed_total",
                "Entfernte Web-Pager nach Grund",
            ),
            &["grund"],
        )?;
        registry.register(Box::new(subscribers_removed_total.clone()))?;

        // --- Anrufe ---
        let calls_total = IntCounter::with_opts(Opts::new(
            "pager_calls_total",
            "Erfolgreich angenommene und verteilte Anrufe",
        ))?;
        registry.register(Box::new(calls_total.clone()))?;

        let calls_rejected_total = IntCounter::with_opts(Opts::new(
            "pager_calls_rejected_total",
            "Abgelehnte Anruf-Einreichungen (Validierung)",
        ))?;
        registry.register(Box::new(calls_rejected_total.clone()))?;

        let deliveries_total = IntCounter::with_opts(Opts::new(
            "pager_deliveries_total",
            "In Subscriber-Queues eingereihte call-alert-Nachrichten",
        ))?;
        registry.register(Box::new(deliveries_total.clone()))?;

        let delivery_failures_total = IntCounter::with_opts(Opts::new(
            "pager_delivery_failures_total",
            "Fehlgeschlagene Zustellungen an einzelne Subscriber",
        ))?;
        registry.register(Box::new(delivery_failures_total.clone()))?;

        // --- HTTP ---
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "pager_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            &["method"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry: Arc::new(registry),
            subscribers_connected,
            subscribers_registered_total,
            subscribers_removed_total,
            calls_total,
            calls_rejected_total,
            deliveries_total,
            delivery_failures_total,
            http_request_duration_seconds,
        })
    }

    /// Zaehlt einen entfernten Subscriber unter dem gegebenen Grund
    pub fn subscriber_entfernt(&self, grund: &str) {
        self.subscribers_removed_total
            .with_label_values(&[grund])
            .inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: PagerMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<PagerMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
