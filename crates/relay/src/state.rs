//! Gemeinsamer Relay-Zustand
//!
//! Haelt Registry, Broadcast-Core und Event-Intake, damit HTTP-Handler und
//! Verbindungs-Tasks dieselben Instanzen teilen.

use pager_core::jetzt_iso;
use pager_observability::PagerMetrics;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::broadcast::{AlarmVerteiler, BroadcastCore};
use crate::connection::{SubscriberVerbindung, VerbindungsKonfig};
use crate::intake::EventIntake;
use crate::liveness::LivenessMonitor;
use crate::registry::{ConnectionRegistry, SubscriberInfo, SEND_QUEUE_GROESSE};

/// Laufzeit-Einstellungen des Relays
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Kapazitaet der Send-Queue pro Subscriber
    pub send_queue_groesse: usize,
    /// Abstand der Server-Pings
    pub keepalive_intervall: Duration,
    /// Obergrenze fuer einen Schreibvorgang auf einen Socket
    pub schreib_timeout: Duration,
    /// Ohne Lebenszeichen laenger als das gilt ein Subscriber als veraltet
    pub leerlauf_fenster: Duration,
    /// Abstand der Liveness-Pruefungen
    pub pruef_intervall: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            send_queue_groesse: SEND_QUEUE_GROESSE,
            keepalive_intervall: Duration::from_secs(25),
            schreib_timeout: Duration::from_secs(10),
            leerlauf_fenster: Duration::from_secs(60),
            pruef_intervall: Duration::from_secs(15),
        }
    }
}

/// Antwort des Diagnose-Endpunkts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnose {
    pub status: &'static str,
    pub timestamp: String,
    /// Sekunden seit dem Start
    pub uptime: f64,
    pub clients: usize,
    pub connected_devices: Vec<SubscriberInfo>,
}

/// Gemeinsamer Relay-Zustand (Arc-geteilt)
pub struct RelayState {
    pub config: RelayConfig,
    pub registry: ConnectionRegistry,
    pub broadcaster: BroadcastCore,
    pub intake: EventIntake,
    pub metrics: PagerMetrics,
    /// Startzeitpunkt (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl RelayState {
    /// Erstellt den Zustand mit dem Broadcast-Core als Verteiler
    pub fn neu(config: RelayConfig, metrics: PagerMetrics) -> Arc<Self> {
        let registry = ConnectionRegistry::neu(config.send_queue_groesse, metrics.clone());
        let broadcaster = BroadcastCore::neu(registry.clone(), metrics.clone());
        let verteiler: Arc<dyn AlarmVerteiler> = Arc::new(broadcaster.clone());
        Self::zusammensetzen(config, metrics, registry, broadcaster, verteiler)
    }

    /// Erstellt den Zustand mit einem eigenen Verteiler vor der Intake
    ///
    /// Registry und Broadcast-Core existieren trotzdem, damit Verbindungen
    /// und Diagnose funktionieren.
    pub fn mit_verteiler(
        config: RelayConfig,
        metrics: PagerMetrics,
        verteiler: Arc<dyn AlarmVerteiler>,
    ) -> Arc<Self> {
        let registry = ConnectionRegistry::neu(config.send_queue_groesse, metrics.clone());
        let broadcaster = BroadcastCore::neu(registry.clone(), metrics.clone());
        Self::zusammensetzen(config, metrics, registry, broadcaster, verteiler)
    }

    fn zusammensetzen(
        config: RelayConfig,
        metrics: PagerMetrics,
        registry: ConnectionRegistry,
        broadcaster: BroadcastCore,
        verteiler: Arc<dyn AlarmVerteiler>,
    ) -> Arc<Self> {
        Arc::new(Self {
            intake: EventIntake::neu(verteiler, metrics.clone()),
            config,
            registry,
            broadcaster,
            metrics,
            start_time: Instant::now(),
        })
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    /// Verbindungs-Handler fuer einen neuen Web-Pager
    pub fn verbindung(&self, peer: impl Into<String>) -> SubscriberVerbindung {
        SubscriberVerbindung::neu(
            self.registry.clone(),
            VerbindungsKonfig {
                keepalive_intervall: self.config.keepalive_intervall,
                schreib_timeout: self.config.schreib_timeout,
            },
            peer,
        )
    }

    /// Liveness-Monitor ueber der gemeinsamen Registry
    pub fn liveness_monitor(&self) -> LivenessMonitor {
        LivenessMonitor::neu(
            self.registry.clone(),
            self.config.pruef_intervall,
            self.config.leerlauf_fenster,
        )
    }

    /// Momentaufnahme fuer den Diagnose-Endpunkt
    pub fn diagnose(&self) -> Diagnose {
        let connected_devices = self.registry.subscriber_infos();
        Diagnose {
            status: "ok",
            timestamp: jetzt_iso(),
            uptime: self.uptime(),
            clients: connected_devices.len(),
            connected_devices,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
