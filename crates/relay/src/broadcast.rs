//! Broadcast-Core – Verteilt Anruf-Events an alle Web-Pager
//!
//! Ablauf einer Verteilung:
//! 1. Momentaufnahme der Registry ziehen (Lock sofort wieder frei)
//! 2. `call-alert` einmal bauen, pro Subscriber per `try_send` einreihen
//! 3. Subscriber mit fehlgeschlagener Zustellung aus der Registry entfernen
//!
//! Das Ergebnis jeder Einzelzustellung landet im `FanOutBericht`; nach
//! aussen (Event-Intake) geht nur die Groesse der Momentaufnahme.
//!
//! ## Reihenfolge
//! Verteilungen laufen unter einer kurzen Reihenfolge-Sperre. Da das
//! Einreihen nie blockiert, haelt niemand sie lange, und jeder Subscriber
//! sieht Events in der Reihenfolge der `verteilen`-Aufrufe. Registrierungen
//! und Entfernungen nehmen diese Sperre nicht.

use pager_core::{jetzt_iso, CallAlert, CallEvent, ServerNachricht, SubscriberId};
use pager_observability::PagerMetrics;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::DeliveryError;
use crate::registry::{ConnectionRegistry, EntfernGrund};

// ---------------------------------------------------------------------------
// AlarmVerteiler
// ---------------------------------------------------------------------------

/// Schnittstelle zwischen Event-Intake und Broadcast-Core
pub trait AlarmVerteiler: Send + Sync {
    /// Verteilt ein Event an alle aktuell registrierten Subscriber
    ///
    /// Gibt die Anzahl der Subscriber in der Momentaufnahme zurueck, nicht
    /// die Anzahl bestaetigter Zustellungen.
    fn verteilen(&self, event: &CallEvent) -> usize;
}

// ---------------------------------------------------------------------------
// FanOutBericht
// ---------------------------------------------------------------------------

/// Ergebnis einer Verteilung
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutBericht {
    /// Subscriber in der Momentaufnahme
    pub empfaenger: usize,
    /// Erfolgreich eingereihte Nachrichten
    pub zugestellt: usize,
    /// Subscriber, deren Zustellung fehlschlug (inzwischen entfernt)
    pub fehlgeschlagen: Vec<(SubscriberId, DeliveryError)>,
}

// ---------------------------------------------------------------------------
// BroadcastCore
// ---------------------------------------------------------------------------

/// Zentraler Fan-Out fuer call-alerts
///
/// Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct BroadcastCore {
    inner: Arc<BroadcastInner>,
}

struct BroadcastInner {
    registry: ConnectionRegistry,
    metrics: PagerMetrics,
    reihenfolge: Mutex<()>,
}

impl BroadcastCore {
    /// Erstellt einen Broadcast-Core ueber der gegebenen Registry
    pub fn neu(registry: ConnectionRegistry, metrics: PagerMetrics) -> Self {
        Self {
            inner: Arc::new(BroadcastInner {
                registry,
                metrics,
                reihenfolge: Mutex::new(()),
            }),
        }
    }

    /// Verteilt ein Event und liefert das Ergebnis jeder Einzelzustellung
    pub fn verteilen_mit_bericht(&self, event: &CallEvent) -> FanOutBericht {
        let bericht = {
            let _reihenfolge = self.inner.reihenfolge.lock();

            let empfaenger = self.inner.registry.momentaufnahme();
            let nachricht = Arc::new(ServerNachricht::CallAlert(CallAlert::aus_event(
                event,
                jetzt_iso(),
                empfaenger.len(),
            )));

            let mut bericht = FanOutBericht {
                empfaenger: empfaenger.len(),
                ..FanOutBericht::default()
            };
            for eintrag in &empfaenger {
                match eintrag.zustellen(Arc::clone(&nachricht)) {
                    Ok(()) => bericht.zugestellt += 1,
                    Err(fehler) => {
                        tracing::warn!(
                            subscriber_id = %eintrag.id(),
                            peer = %eintrag.remote_address(),
                            fehler = %fehler,
                            "Zustellung fehlgeschlagen – Subscriber wird entfernt"
                        );
                        bericht.fehlgeschlagen.push((eintrag.id(), fehler));
                    }
                }
            }
            bericht
        };

        for (id, _) in &bericht.fehlgeschlagen {
            self.inner.registry.entfernen(id, EntfernGrund::Zustellung);
        }

        self.inner
            .metrics
            .deliveries_total
            .inc_by(bericht.zugestellt as u64);
        self.inner
            .metrics
            .delivery_failures_total
            .inc_by(bericht.fehlgeschlagen.len() as u64);

        tracing::debug!(
            empfaenger = bericht.empfaenger,
            zugestellt = bericht.zugestellt,
            fehlgeschlagen = bericht.fehlgeschlagen.len(),
            "call-alert verteilt"
        );
        bericht
    }

    /// Zugriff auf die zugrundeliegende Registry
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.inner.registry
    }
}

impl AlarmVerteiler for BroadcastCore {
    fn verteilen(&self, event: &CallEvent) -> usize {
        self.verteilen_mit_bericht(event).empfaenger
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
