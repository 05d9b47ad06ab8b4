//! pager-server – Bibliotheks-Root
//!
//! Setzt Relay, API und Observability zu einem laufenden Prozess zusammen.

pub mod config;

use anyhow::Result;
use config::ServerConfig;
use pager_api::{ApiServer, ApiServerKonfig, ApiState};
use pager_observability::{observability_server_starten, PagerMetrics};
use pager_relay::RelayState;
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Metriken und Relay-Zustand aufbauen
    /// 2. Liveness-Monitor starten
    /// 3. Observability-Server starten (falls aktiviert)
    /// 4. HTTP/WebSocket-Listener binden
    /// 5. Auf Ctrl-C / SIGTERM warten, dann alle Verbindungen schliessen
    pub async fn starten(self) -> Result<()> {
        let metriken = PagerMetrics::neu()?;
        let relay = RelayState::neu(self.config.relay_config(), metriken.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let monitor = tokio::spawn(relay.liveness_monitor().laufen(shutdown_rx.clone()));

        let observability = if self.config.observability.aktiviert {
            let addr = self.config.observability_bind_adresse()?;
            let signal = shutdown_abwarten(shutdown_rx.clone());
            Some(tokio::spawn(async move {
                if let Err(e) = observability_server_starten(addr, metriken, signal).await {
                    tracing::error!(fehler = %e, "Observability-Server fehlgeschlagen");
                }
            }))
        } else {
            None
        };

        let api_addr = self.config.api_bind_adresse()?;
        let listener = TcpListener::bind(api_addr).await?;
        self.banner_ausgeben(listener.local_addr()?.port());

        let state = ApiState::neu(relay, self.config.server.name.clone(), shutdown_rx.clone());
        let api_server = ApiServer::neu(ApiServerKonfig {
            cors_origins: self.config.api.cors_origins.clone(),
        });
        let mut api = tokio::spawn(api_server.mit_listener(
            listener,
            state,
            shutdown_abwarten(shutdown_rx),
        ));

        tokio::select! {
            _ = shutdown_signal() => {
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
            }
            ergebnis = &mut api => {
                // API endete ohne Shutdown-Signal
                let _ = shutdown_tx.send(true);
                return ergebnis?;
            }
        }

        let _ = shutdown_tx.send(true);
        api.await??;
        monitor.await?;
        if let Some(observability) = observability {
            observability.await?;
        }

        tracing::info!("Server beendet");
        Ok(())
    }

    fn banner_ausgeben(&self, port: u16) {
        let cfg = &self.config;
        tracing::info!(
            server_name = %cfg.server.name,
            http = %format!("http://{}:{port}", cfg.netzwerk.bind_adresse),
            intake = "POST /incoming-call",
            websocket = %format!("ws://{}:{port}/ws", cfg.netzwerk.bind_adresse),
            health = "GET /health",
            metrics = cfg.observability.aktiviert,
            "Pager-Server gestartet, warte auf Android-Geraet und Web-Pager"
        );
    }
}

/// Endet, sobald das Shutdown-Signal gesetzt oder der Sender verworfen wurde
fn shutdown_abwarten(
    mut shutdown_rx: watch::Receiver<bool>,
) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let _ = shutdown_rx.changed().await;
    }
}

/// Wartet auf Ctrl-C oder SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(fehler = %e, "Ctrl-C-Handler nicht installierbar");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(fehler = %e, "SIGTERM-Handler nicht installierbar");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
