//! Liveness-Monitor – Entfernt Subscriber ohne Lebenszeichen
//!
//! Prueft periodisch, wann jeder Subscriber zuletzt einen Frame geschickt
//! hat. Wer laenger als das Leerlauf-Fenster schweigt, wird mit Grund
//! `veraltet` aus der Registry entfernt; sein Verbindungs-Task endet darauf.

use pager_core::SubscriberId;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::registry::ConnectionRegistry;

/// Periodische Lebenszeichen-Pruefung
pub struct LivenessMonitor {
    registry: ConnectionRegistry,
    pruef_intervall: Duration,
    leerlauf_fenster: Duration,
}

impl LivenessMonitor {
    pub fn neu(
        registry: ConnectionRegistry,
        pruef_intervall: Duration,
        leerlauf_fenster: Duration,
    ) -> Self {
        Self {
            registry,
            pruef_intervall,
            leerlauf_fenster,
        }
    }

    /// Ein Pruefdurchlauf, gibt die entfernten IDs zurueck
    pub fn pruefen(&self) -> Vec<SubscriberId> {
        let entfernt = self.registry.veraltete_entfernen(self.leerlauf_fenster);
        if !entfernt.is_empty() {
            tracing::info!(
                anzahl = entfernt.len(),
                fenster_sek = self.leerlauf_fenster.as_secs(),
                "Veraltete Subscriber entfernt"
            );
        }
        entfernt
    }

    /// Laeuft bis zum Shutdown-Signal
    pub async fn laufen(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut takt = tokio::time::interval(self.pruef_intervall);
        takt.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Erster Tick kommt sofort
        takt.tick().await;

        loop {
            tokio::select! {
                _ = takt.tick() => {
                    self.pruefen();
                }
                _ = shutdown_rx.changed() => {
                    tracing::debug!("Liveness-Monitor beendet");
                    break;
                }
            }
        }
    }
}
