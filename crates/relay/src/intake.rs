//! Event-Intake – Nimmt Anruf-Einreichungen des Android-Geraets an
//!
//! Validiert die untypisierte Nutzlast, ergaenzt fehlende Felder und reicht
//! genau ein `CallEvent` an den Verteiler weiter. Validierungsfehler
//! erreichen den Verteiler nie.

use chrono::{DateTime, Utc};
use pager_core::{iso_zeitstempel, CallEvent};
use pager_observability::PagerMetrics;
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::broadcast::AlarmVerteiler;
use crate::error::{RelayError, RelayResult};

/// Fehlermeldung fuer fehlende oder leere Rufnummer
pub const FEHLT_NUMMER: &str = "Missing required field: number";
/// Fehlermeldung fuer Nutzlasten, die kein JSON-Objekt sind
pub const KEIN_OBJEKT: &str = "Request body must be a JSON object";

/// Bestaetigung einer angenommenen Einreichung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeBestaetigung {
    pub event: CallEvent,
    /// Subscriber in der Momentaufnahme der Verteilung
    pub clients_notified: usize,
}

/// Event-Intake vor dem Broadcast-Core
#[derive(Clone)]
pub struct EventIntake {
    verteiler: Arc<dyn AlarmVerteiler>,
    metrics: PagerMetrics,
}

impl EventIntake {
    pub fn neu(verteiler: Arc<dyn AlarmVerteiler>, metrics: PagerMetrics) -> Self {
        Self { verteiler, metrics }
    }

    /// Nimmt eine Einreichung an und verteilt sie
    ///
    /// Ein Panic im Verteiler wird als `RelayError::Intern` gemeldet.
    pub fn annehmen(&self, nutzlast: &Value) -> RelayResult<IntakeBestaetigung> {
        let event = match normalisieren(nutzlast, Utc::now()) {
            Ok(event) => event,
            Err(fehler) => {
                self.metrics.calls_rejected_total.inc();
                tracing::warn!(fehler = %fehler, "Einreichung abgelehnt");
                return Err(fehler);
            }
        };

        let clients_notified = catch_unwind(AssertUnwindSafe(|| self.verteiler.verteilen(&event)))
            .map_err(|panik| {
                let grund = panik_text(panik.as_ref());
                tracing::error!(number = %event.number(), fehler = %grund, "Verteilung abgebrochen");
                RelayError::intern(grund)
            })?;

        self.metrics.calls_total.inc();
        tracing::info!(
            number = %event.number(),
            name = %event.name(),
            timestamp = %event.timestamp(),
            clients = clients_notified,
            "Eingehender Anruf verteilt"
        );

        Ok(IntakeBestaetigung {
            event,
            clients_notified,
        })
    }
}

/// Validiert und normalisiert eine Einreichung
///
/// - `number`: nicht-leerer String (getrimmt) oder JSON-Zahl ungleich 0, sonst Fehler
/// - `name`: fehlt oder leer → `number`
/// - `timestamp`: fehlt oder leer → `jetzt`, sonst unveraendert
pub fn normalisieren(nutzlast: &Value, jetzt: DateTime<Utc>) -> RelayResult<CallEvent> {
    let felder = nutzlast
        .as_object()
        .ok_or_else(|| RelayError::validierung(KEIN_OBJEKT))?;

    let number = match felder.get("number") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => n.to_string(),
        _ => return Err(RelayError::validierung(FEHLT_NUMMER)),
    };

    let name = nicht_leer(felder.get("name")).unwrap_or_else(|| number.clone());
    let timestamp = nicht_leer(felder.get("timestamp")).unwrap_or_else(|| iso_zeitstempel(jetzt));

    Ok(CallEvent::neu(number, name, timestamp))
}

fn nicht_leer(wert: Option<&Value>) -> Option<String> {
    match wert {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn panik_text(panik: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panik.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panik.downcast_ref::<String>() {
        s.clone()
    } else {
        "Verteilung abgebrochen".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
