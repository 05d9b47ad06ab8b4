//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Die Umgebungsvariable `PORT` ueberschreibt den
//! HTTP-Port.

use pager_observability::logging::{log_level_gueltig, LogFormat};
use pager_relay::RelayConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Umgebungsvariable fuer den Pfad der Konfigurationsdatei
pub const ENV_CONFIG: &str = "PAGER_CONFIG";
/// Umgebungsvariable fuer den HTTP-Port
pub const ENV_PORT: &str = "PORT";

/// Ungueltige Konfigurationswerte
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigFehler {
    #[error("Ungueltiger Wert fuer {feld}: {grund}")]
    Ungueltig { feld: &'static str, grund: String },
}

impl ConfigFehler {
    fn ungueltig(feld: &'static str, grund: impl Into<String>) -> Self {
        Self::Ungueltig {
            feld,
            grund: grund.into(),
        }
    }
}

/// Woher die geladene Konfiguration stammt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KonfigQuelle {
    Datei,
    Standardwerte,
}

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Relay-Einstellungen (Queues, Keepalive, Liveness)
    pub relay: RelayEinstellungen,
    /// HTTP-API-Einstellungen
    pub api: ApiEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken)
    pub observability: ObservabilityEinstellungen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "WiFi Pager".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer HTTP und WebSocket
    pub bind_adresse: String,
    /// Port fuer HTTP und WebSocket
    pub port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayEinstellungen {
    /// Kapazitaet der Send-Queue pro Web-Pager
    pub send_queue_groesse: usize,
    /// Abstand der Server-Pings in Sekunden
    pub keepalive_sek: u64,
    /// Zeitlimit fuer einen Schreibvorgang in Sekunden
    pub schreib_timeout_sek: u64,
    /// Ohne Lebenszeichen laenger als das gilt ein Pager als veraltet
    pub leerlauf_fenster_sek: u64,
    /// Abstand der Liveness-Pruefungen in Sekunden
    pub pruef_intervall_sek: u64,
}

impl Default for RelayEinstellungen {
    fn default() -> Self {
        Self {
            send_queue_groesse: 64,
            keepalive_sek: 25,
            schreib_timeout_sek: 10,
            leerlauf_fenster_sek: 60,
            pruef_intervall_sek: 15,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEinstellungen {
    /// CORS-Origins (leer = alle erlaubt)
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Metriken-Server
    pub aktiviert: bool,
    /// Port fuer `/metrics`
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei
    ///
    /// Fehlt die Datei, gelten die Standardwerte. Danach werden die
    /// Umgebungsvariablen angewendet und alles validiert.
    pub fn laden(pfad: &str) -> anyhow::Result<(Self, KonfigQuelle)> {
        let (config, quelle) = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                (config, KonfigQuelle::Datei)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (Self::default(), KonfigQuelle::Standardwerte)
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };

        let config = config.mit_umgebung(|name| std::env::var(name).ok())?;
        config.validieren()?;
        Ok((config, quelle))
    }

    /// Wendet Umgebungs-Overrides an (`PORT`)
    pub fn mit_umgebung(
        mut self,
        umgebung: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigFehler> {
        if let Some(port) = umgebung(ENV_PORT) {
            self.netzwerk.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigFehler::ungueltig("PORT", format!("'{port}' ist kein Port")))?;
        }
        Ok(self)
    }

    /// Prueft die Werte auf Plausibilitaet
    pub fn validieren(&self) -> Result<(), ConfigFehler> {
        let relay = &self.relay;

        if self.netzwerk.port == 0 {
            return Err(ConfigFehler::ungueltig("netzwerk.port", "darf nicht 0 sein"));
        }
        if self.observability.aktiviert && self.observability.port == 0 {
            return Err(ConfigFehler::ungueltig("observability.port", "darf nicht 0 sein"));
        }
        if self.observability.aktiviert && self.observability.port == self.netzwerk.port {
            return Err(ConfigFehler::ungueltig(
                "observability.port",
                "muss sich von netzwerk.port unterscheiden",
            ));
        }
        for (feld, wert) in [
            ("relay.send_queue_groesse", relay.send_queue_groesse as u64),
            ("relay.keepalive_sek", relay.keepalive_sek),
            ("relay.schreib_timeout_sek", relay.schreib_timeout_sek),
            ("relay.leerlauf_fenster_sek", relay.leerlauf_fenster_sek),
            ("relay.pruef_intervall_sek", relay.pruef_intervall_sek),
        ] {
            if wert == 0 {
                return Err(ConfigFehler::ungueltig(feld, "muss groesser als 0 sein"));
            }
        }
        if relay.schreib_timeout_sek >= relay.leerlauf_fenster_sek {
            return Err(ConfigFehler::ungueltig(
                "relay.schreib_timeout_sek",
                "muss kleiner als relay.leerlauf_fenster_sek sein",
            ));
        }
        if relay.keepalive_sek >= relay.leerlauf_fenster_sek {
            return Err(ConfigFehler::ungueltig(
                "relay.keepalive_sek",
                "muss kleiner als relay.leerlauf_fenster_sek sein",
            ));
        }
        if !log_level_gueltig(&self.logging.level) {
            return Err(ConfigFehler::ungueltig(
                "logging.level",
                format!("'{}' (erlaubt: trace, debug, info, warn, error)", self.logging.level),
            ));
        }
        if let Err(grund) = self.logging.format.parse::<LogFormat>() {
            return Err(ConfigFehler::ungueltig("logging.format", grund));
        }
        self.api_bind_adresse()?;
        Ok(())
    }

    /// Bind-Adresse fuer HTTP und WebSocket
    pub fn api_bind_adresse(&self) -> Result<SocketAddr, ConfigFehler> {
        self.bind_adresse(self.netzwerk.port)
    }

    /// Bind-Adresse fuer den Metriken-Server
    pub fn observability_bind_adresse(&self) -> Result<SocketAddr, ConfigFehler> {
        self.bind_adresse(self.observability.port)
    }

    fn bind_adresse(&self, port: u16) -> Result<SocketAddr, ConfigFehler> {
        format!("{}:{}", self.netzwerk.bind_adresse, port)
            .parse()
            .map_err(|_| {
                ConfigFehler::ungueltig(
                    "netzwerk.bind_adresse",
                    format!("'{}' ist keine IP-Adresse", self.netzwerk.bind_adresse),
                )
            })
    }

    /// Laufzeit-Einstellungen fuer den Relay-Kern
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            send_queue_groesse: self.relay.send_queue_groesse,
            keepalive_intervall: Duration::from_secs(self.relay.keepalive_sek),
            schreib_timeout: Duration::from_secs(self.relay.schreib_timeout_sek),
            leerlauf_fenster: Duration::from_secs(self.relay.leerlauf_fenster_sek),
            pruef_intervall: Duration::from_secs(self.relay.pruef_intervall_sek),
        }
    }
}
