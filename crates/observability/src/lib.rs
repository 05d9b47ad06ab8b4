//! # pager-observability
//!
//! Observability-Crate fuer den WiFi-Pager:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Structured Logging via tracing-subscriber
//! - Request-Timing Middleware

pub mod logging;
pub mod metrics;
pub mod middleware;

pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, PagerMetrics};
pub use middleware::{request_timing_layer, timing_middleware};

use anyhow::Result;
use std::future::Future;
use std::net::SocketAddr;

/// Startet den Observability-HTTP-Server
///
/// Endpunkte:
/// - `GET /metrics` – Prometheus scrape format
///
/// Laeuft bis `shutdown` abgeschlossen ist.
pub async fn observability_server_starten(
    bind_addr: SocketAddr,
    metriken: PagerMetrics,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = metrics_router(metriken);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Observability-Server gestartet");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
