//! Connection-Registry – Wer ist als Web-Pager verbunden?
//!
//! Die Registry ist der einzige geteilte, veraenderliche Zustand des Relays.
//! Sie haelt pro Subscriber die Metadaten (Adresse, Verbindungszeitpunkt,
//! Zustellzaehler, letztes Lebenszeichen) und den Sender seiner Send-Queue.
//!
//! ## Nebenlaeufigkeit
//! Alle Mutationen laufen unter dem Schreib-Lock einer `RwLock<HashMap>`.
//! `momentaufnahme` kopiert die Eintraege (Arc-Clones) unter dem Lese-Lock
//! und gibt ihn sofort wieder frei, der Broadcast-Core stellt also ohne
//! gehaltenen Lock zu. Damit ist jede Momentaufnahme ein konsistenter
//! Zeitpunkt: eine Registrierung ist entweder ganz enthalten oder gar nicht.

use chrono::{DateTime, Utc};
use pager_core::{iso_zeitstempel, ServerNachricht, SubscriberId};
use pager_observability::PagerMetrics;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::error::DeliveryError;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Standardgroesse der Send-Queue pro Subscriber
pub const SEND_QUEUE_GROESSE: usize = 64;

/// Empfangsseite der Send-Queue, gelesen vom Verbindungs-Task
pub type SubscriberQueue = mpsc::Receiver<Arc<ServerNachricht>>;

// ---------------------------------------------------------------------------
// EntfernGrund
// ---------------------------------------------------------------------------

/// Warum ein Subscriber die Registry verlassen hat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntfernGrund {
    /// Verbindung regulaer geschlossen (Client oder Server-Shutdown)
    Getrennt,
    /// Kein Lebenszeichen innerhalb des Leerlauf-Fensters, oder Socket-Fehler
    Veraltet,
    /// Zustellung aus dem Broadcast-Core fehlgeschlagen
    Zustellung,
}

impl EntfernGrund {
    /// Label fuer Logs und Metriken
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Getrennt => "getrennt",
            Self::Veraltet => "veraltet",
            Self::Zustellung => "zustellung",
        }
    }
}

// ---------------------------------------------------------------------------
// SubscriberEintrag
// ---------------------------------------------------------------------------

/// Registry-Eintrag eines verbundenen Web-Pagers
#[derive(Debug)]
pub struct SubscriberEintrag {
    id: SubscriberId,
    remote_address: String,
    connected_at: DateTime<Utc>,
    events_delivered: AtomicU64,
    letztes_lebenszeichen: Mutex<Instant>,
    tx: mpsc::Sender<Arc<ServerNachricht>>,
}

impl SubscriberEintrag {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Anzahl erfolgreich eingereihter call-alerts
    pub fn events_delivered(&self) -> u64 {
        self.events_delivered.load(Ordering::Relaxed)
    }

    /// Zeit seit dem letzten Lebenszeichen
    pub fn leerlauf(&self) -> Duration {
        self.letztes_lebenszeichen.lock().elapsed()
    }

    /// Reiht eine Nachricht nicht-blockierend in die Send-Queue ein
    ///
    /// Zaehlt `events_delivered` nur bei Erfolg hoch. Eine volle Queue wird
    /// nicht abgewartet: der Subscriber gilt dann als zu langsam.
    pub fn zustellen(&self, nachricht: Arc<ServerNachricht>) -> Result<(), DeliveryError> {
        match self.tx.try_send(nachricht) {
            Ok(()) => {
                self.events_delivered.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(DeliveryError::QueueVoll),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DeliveryError::Geschlossen),
        }
    }

    fn lebenszeichen(&self) {
        *self.letztes_lebenszeichen.lock() = Instant::now();
    }

    /// Lesbare Kopie der Metadaten fuer die Diagnose
    pub fn info(&self) -> SubscriberInfo {
        SubscriberInfo {
            id: self.id,
            remote_address: self.remote_address.clone(),
            connected_at: iso_zeitstempel(self.connected_at),
            events_delivered: self.events_delivered(),
        }
    }
}

/// Metadaten eines Subscribers fuer den Diagnose-Endpunkt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberInfo {
    pub id: SubscriberId,
    pub remote_address: String,
    pub connected_at: String,
    pub events_delivered: u64,
}

// ---------------------------------------------------------------------------
// ConnectionRegistry
// ---------------------------------------------------------------------------

/// Registry aller verbundenen Web-Pager
///
/// Thread-safe via Arc + RwLock. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// Subscriber, indiziert nach SubscriberId
    subscriber: RwLock<HashMap<SubscriberId, Arc<SubscriberEintrag>>>,
    /// Kapazitaet jeder Send-Queue
    queue_groesse: usize,
    metrics: PagerMetrics,
}

impl ConnectionRegistry {
    /// Erstellt eine leere Registry
    pub fn neu(queue_groesse: usize, metrics: PagerMetrics) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                subscriber: RwLock::new(HashMap::new()),
                queue_groesse: queue_groesse.max(1),
                metrics,
            }),
        }
    }

    /// Nimmt einen neuen Subscriber auf
    ///
    /// Gibt die vergebene ID und die Empfangsseite seiner Send-Queue zurueck.
    /// Ab der Rueckkehr ist der Subscriber Kandidat fuer jeden folgenden
    /// Broadcast.
    pub fn registrieren(&self, remote_address: impl Into<String>) -> (SubscriberId, SubscriberQueue) {
        let (tx, rx) = mpsc::channel(self.inner.queue_groesse);
        let remote_address = remote_address.into();

        let (id, aktiv) = {
            let mut subscriber = self.inner.subscriber.write();
            let mut id = SubscriberId::new();
            while subscriber.contains_key(&id) {
                id = SubscriberId::new();
            }
            let eintrag = SubscriberEintrag {
                id,
                remote_address: remote_address.clone(),
                connected_at: Utc::now(),
                events_delivered: AtomicU64::new(0),
                letztes_lebenszeichen: Mutex::new(Instant::now()),
                tx,
            };
            subscriber.insert(id, Arc::new(eintrag));
            self.inner.metrics.subscribers_connected.set(subscriber.len() as i64);
            (id, subscriber.len())
        };

        self.inner.metrics.subscribers_registered_total.inc();
        tracing::info!(
            subscriber_id = %id,
            peer = %remote_address,
            aktiv,
            "Subscriber registriert"
        );
        (id, rx)
    }

    /// Entfernt einen Subscriber
    ///
    /// Idempotent: gibt `false` zurueck wenn die ID nicht (mehr) registriert
    /// ist. Mit dem Eintrag faellt der letzte Sender der Send-Queue weg, der
    /// Verbindungs-Task bemerkt das und schliesst den Socket.
    pub fn entfernen(&self, id: &SubscriberId, grund: EntfernGrund) -> bool {
        let aktiv = {
            let mut subscriber = self.inner.subscriber.write();
            if subscriber.remove(id).is_none() {
                return false;
            }
            self.inner.metrics.subscribers_connected.set(subscriber.len() as i64);
            subscriber.len()
        };

        self.inner.metrics.subscriber_entfernt(grund.als_str());
        tracing::info!(
            subscriber_id = %id,
            grund = grund.als_str(),
            aktiv,
            "Subscriber entfernt"
        );
        true
    }

    /// Konsistente Kopie aller aktuell registrierten Subscriber
    pub fn momentaufnahme(&self) -> Vec<Arc<SubscriberEintrag>> {
        self.inner.subscriber.read().values().cloned().collect()
    }

    /// Vermerkt ein Lebenszeichen
    ///
    /// Gibt `false` zurueck wenn der Subscriber nicht registriert ist.
    pub fn lebenszeichen(&self, id: &SubscriberId) -> bool {
        match self.inner.subscriber.read().get(id) {
            Some(eintrag) => {
                eintrag.lebenszeichen();
                true
            }
            None => false,
        }
    }

    /// Entfernt alle Subscriber ohne Lebenszeichen innerhalb von `fenster`
    pub fn veraltete_entfernen(&self, fenster: Duration) -> Vec<SubscriberId> {
        let veraltet: Vec<SubscriberId> = self
            .inner
            .subscriber
            .read()
            .values()
            .filter(|eintrag| eintrag.leerlauf() >= fenster)
            .map(|eintrag| eintrag.id())
            .collect();

        let mut entfernt = Vec::with_capacity(veraltet.len());
        for id in veraltet {
            // Zwischen Lesen und Entfernen kann ein Lebenszeichen eintreffen
            let noch_veraltet = self
                .inner
                .subscriber
                .read()
                .get(&id)
                .is_some_and(|eintrag| eintrag.leerlauf() >= fenster);
            if noch_veraltet && self.entfernen(&id, EntfernGrund::Veraltet) {
                entfernt.push(id);
            }
        }
        entfernt
    }

    /// Anzahl registrierter Subscriber
    pub fn anzahl(&self) -> usize {
        self.inner.subscriber.read().len()
    }

    /// Prueft ob ein Subscriber registriert ist
    pub fn ist_registriert(&self, id: &SubscriberId) -> bool {
        self.inner.subscriber.read().contains_key(id)
    }

    /// Metadaten aller Subscriber, aeltester zuerst
    pub fn subscriber_infos(&self) -> Vec<SubscriberInfo> {
        let mut infos: Vec<SubscriberInfo> = self
            .momentaufnahme()
            .iter()
            .map(|eintrag| eintrag.info())
            .collect();
        infos.sort_by(|a, b| a.connected_at.cmp(&b.connected_at));
        infos
    }

    /// Zustellzaehler eines einzelnen Subscribers
    pub fn events_delivered(&self, id: &SubscriberId) -> Option<u64> {
        self.inner
            .subscriber
            .read()
            .get(id)
            .map(|eintrag| eintrag.events_delivered())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pager_core::{CallAlert, CallEvent};
    use std::collections::HashSet;

    fn registry() -> ConnectionRegistry {
        ConnectionRegistry::neu(SEND_QUEUE_GROESSE, PagerMetrics::neu().unwrap())
    }

    fn test_nachricht() -> Arc<ServerNachricht> {
        let event = CallEvent::neu("+100", "+100", "2024-02-19T10:30:45.000Z");
        Arc::new(ServerNachricht::CallAlert(CallAlert::aus_event(
            &event,
            "2024-02-19T10:30:45.000Z".into(),
            1,
        )))
    }

    #[test]
    fn registrieren_vergibt_eindeutige_ids() {
        let registry = registry();
        let ids: HashSet<SubscriberId> = (0..50)
            .map(|i| registry.registrieren(format!("10.0.0.{i}:5000")).0)
            .collect();
        assert_eq!(ids.len(), 50);
        assert_eq!(registry.anzahl(), 50);
    }

    #[test]
    fn entfernen_ist_idempotent() {
        let registry = registry();
        let (a, _rx_a) = registry.registrieren("10.0.0.1:5000");
        let (b, _rx_b) = registry.registrieren("10.0.0.2:5000");

        assert!(registry.entfernen(&a, EntfernGrund::Getrennt));
        let nach_einmal: Vec<SubscriberId> =
            registry.momentaufnahme().iter().map(|e| e.id()).collect();

        assert!(!registry.entfernen(&a, EntfernGrund::Getrennt));
        let nach_zweimal: Vec<SubscriberId> =
            registry.momentaufnahme().iter().map(|e| e.id()).collect();

        assert_eq!(nach_einmal, nach_zweimal);
        assert_eq!(nach_zweimal, vec![b]);
    }

    #[test]
    fn entfernen_unbekannter_id_ist_no_op() {
        let registry = registry();
        let (_a, _rx) = registry.registrieren("10.0.0.1:5000");
        assert!(!registry.entfernen(&SubscriberId::new(), EntfernGrund::Veraltet));
        assert_eq!(registry.anzahl(), 1);
    }

    #[test]
    fn momentaufnahme_ist_unabhaengig_von_spaeteren_aenderungen() {
        let registry = registry();
        let (a, _rx_a) = registry.registrieren("10.0.0.1:5000");
        let aufnahme = registry.momentaufnahme();

        let (_b, _rx_b) = registry.registrieren("10.0.0.2:5000");
        registry.entfernen(&a, EntfernGrund::Getrennt);

        assert_eq!(aufnahme.len(), 1);
        assert_eq!(aufnahme[0].id(), a);
        assert_eq!(registry.anzahl(), 1);
    }

    #[test]
    fn zustellen_zaehlt_nur_erfolge() {
        let registry = ConnectionRegistry::neu(1, PagerMetrics::neu().unwrap());
        let (id, mut rx) = registry.registrieren("10.0.0.1:5000");
        let eintrag = registry.momentaufnahme().remove(0);

        assert_eq!(eintrag.zustellen(test_nachricht()), Ok(()));
        assert_eq!(
            eintrag.zustellen(test_nachricht()),
            Err(DeliveryError::QueueVoll)
        );
        assert_eq!(registry.events_delivered(&id), Some(1));

        assert!(rx.try_recv().is_ok());
        drop(rx);
        assert_eq!(
            eintrag.zustellen(test_nachricht()),
            Err(DeliveryError::Geschlossen)
        );
        assert_eq!(registry.events_delivered(&id), Some(1));
    }

    #[tokio::test]
    async fn entfernen_schliesst_die_send_queue() {
        let registry = registry();
        let (id, mut rx) = registry.registrieren("10.0.0.1:5000");
        registry.entfernen(&id, EntfernGrund::Veraltet);
        assert!(rx.recv().await.is_none(), "Queue muss nach Entfernen enden");
    }

    #[test]
    fn lebenszeichen_nur_fuer_registrierte() {
        let registry = registry();
        let (id, _rx) = registry.registrieren("10.0.0.1:5000");
        assert!(registry.lebenszeichen(&id));
        assert!(!registry.lebenszeichen(&SubscriberId::new()));
    }

    #[test]
    fn veraltete_entfernen_beachtet_fenster() {
        let registry = registry();
        let (alt, _rx_alt) = registry.registrieren("10.0.0.1:5000");
        std::thread::sleep(Duration::from_millis(40));
        let (frisch, _rx_frisch) = registry.registrieren("10.0.0.2:5000");

        let entfernt = registry.veraltete_entfernen(Duration::from_millis(30));
        assert_eq!(entfernt, vec![alt]);
        assert!(registry.ist_registriert(&frisch));
        assert!(!registry.ist_registriert(&alt));
    }

    #[test]
    fn lebenszeichen_verhindert_entfernen() {
        let registry = registry();
        let (id, _rx) = registry.registrieren("10.0.0.1:5000");
        std::thread::sleep(Duration::from_millis(40));
        registry.lebenszeichen(&id);

        assert!(registry.veraltete_entfernen(Duration::from_millis(30)).is_empty());
        assert!(registry.ist_registriert(&id));
    }

    #[test]
    fn subscriber_infos_enthalten_metadaten() {
        let registry = registry();
        let (id, _rx) = registry.registrieren("192.168.1.20:51234");
        let infos = registry.subscriber_infos();

        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].id, id);
        assert_eq!(infos[0].remote_address, "192.168.1.20:51234");
        assert_eq!(infos[0].events_delivered, 0);
        assert!(infos[0].connected_at.ends_with('Z'));

        let json = serde_json::to_value(&infos[0]).unwrap();
        assert!(json.get("remoteAddress").is_some());
        assert!(json.get("eventsDelivered").is_some());
    }

    #[test]
    fn metriken_folgen_der_registry() {
        let metriken = PagerMetrics::neu().unwrap();
        let registry = ConnectionRegistry::neu(SEND_QUEUE_GROESSE, metriken.clone());
        let (a, _rx_a) = registry.registrieren("10.0.0.1:5000");
        let (_b, _rx_b) = registry.registrieren("10.0.0.2:5000");
        assert_eq!(metriken.subscribers_connected.get(), 2);

        registry.entfernen(&a, EntfernGrund::Getrennt);
        registry.entfernen(&a, EntfernGrund::Getrennt);
        assert_eq!(metriken.subscribers_connected.get(), 1);
        assert_eq!(metriken.subscribers_registered_total.get(), 2);
        assert_eq!(
            metriken
                .subscribers_removed_total
                .with_label_values(&["getrennt"])
                .get(),
            1
        );
    }
}
