//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (ueberschreibt die Konfigurationsdatei):
//! - `PAGER_LOG_LEVEL`: Log-Level oder EnvFilter-Direktive, Standard: info
//! - `PAGER_LOG_FORMAT`: Format (text/json), Standard: text

use std::str::FromStr;

use tracing_subscriber::{fmt, EnvFilter};

/// Umgebungsvariable fuer den Log-Level
pub const ENV_LOG_LEVEL: &str = "PAGER_LOG_LEVEL";
/// Umgebungsvariable fuer das Log-Format
pub const ENV_LOG_FORMAT: &str = "PAGER_LOG_FORMAT";

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Menschenlesbar (Entwicklung)
    Text,
    /// Eine JSON-Zeile pro Event (Betrieb)
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            anders => Err(format!("Unbekanntes Log-Format '{anders}' (erlaubt: text, json)")),
        }
    }
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Ermittelt Level und Format aus Konfiguration und Umgebung
///
/// Umgebungswerte haben Vorrang. Ein ungueltiges Format faellt auf `text`
/// zurueck.
pub fn effektive_einstellungen(
    level: &str,
    format: &str,
    umgebung: impl Fn(&str) -> Option<String>,
) -> (String, LogFormat) {
    let level = umgebung(ENV_LOG_LEVEL).unwrap_or_else(|| level.to_string());
    let format = umgebung(ENV_LOG_FORMAT)
        .unwrap_or_else(|| format.to_string())
        .parse()
        .unwrap_or(LogFormat::Text);
    (level, format)
}

/// Initialisiert das Logging-System.
///
/// Ein zweiter Aufruf (z.B. aus Tests) ist ein No-Op.
pub fn logging_initialisieren(level: &str, format: &str) {
    let (level, format) = effektive_einstellungen(level, format, |name| std::env::var(name).ok());

    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    let ergebnis = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };

    if ergebnis.is_err() {
        tracing::debug!("Logging war bereits initialisiert");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keine_umgebung(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn log_level_gueltige_und_ungueltige_werte() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(log_level_gueltig(level));
        }
        assert!(!log_level_gueltig("verbose"));
        assert!(!log_level_gueltig("INFO")); // Gross-/Kleinschreibung
        assert!(!log_level_gueltig(""));
    }

    #[test]
    fn log_format_parsen() {
        assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!("xml".parse::<LogFormat>().is_err());
        assert!("JSON".parse::<LogFormat>().is_err());
    }

    #[test]
    fn konfiguration_ohne_umgebung() {
        let (level, format) = effektive_einstellungen("debug", "json", keine_umgebung);
        assert_eq!(level, "debug");
        assert_eq!(format, LogFormat::Json);
    }

    #[test]
    fn umgebung_hat_vorrang() {
        let umgebung = |name: &str| match name {
            ENV_LOG_LEVEL => Some("pager_relay=trace".to_string()),
            ENV_LOG_FORMAT => Some("json".to_string()),
            _ => None,
        };
        let (level, format) = effektive_einstellungen("info", "text", umgebung);
        assert_eq!(level, "pager_relay=trace");
        assert_eq!(format, LogFormat::Json);
    }

    #[test]
    fn ungueltiges_format_faellt_auf_text_zurueck() {
        let (_, format) = effektive_einstellungen("info", "yaml", keine_umgebung);
        assert_eq!(format, LogFormat::Text);
    }
}
