//! Ledger configuration structures.

use serde::{Deserialize, Serialize};

/// Environment variable holding the SQLite URL; unset selects the in-memory store.
pub const ENV_DATABASE_URL: &str = "QUOTA_LEDGER_DATABASE_URL";
/// Environment variable holding the pool size.
pub const ENV_MAX_CONNECTIONS: &str = "QUOTA_LEDGER_MAX_CONNECTIONS";
/// Environment variable holding the in-memory audit buffer size.
pub const ENV_AUDIT_EVENTS: &str = "QUOTA_LEDGER_AUDIT_EVENTS";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Store backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// In-memory store for development/testing.
    InMemory,
    /// SQLite database through `sqlx`.
    Sqlite {
        /// Connection URL, e.g. `sqlite://quota.db?mode=rwc`.
        url: String,
        /// Maximum pooled connections.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
}

const fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

/// Root ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Store backend shared by both quota classes.
    pub store: StoreConfig,
    /// Size of the in-memory audit buffer; `None` disables auditing.
    #[serde(default)]
    pub audit_max_events: Option<usize>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::InMemory,
            audit_max_events: None,
        }
    }
}

impl StoreConfig {
    /// Validate backend settings.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::InMemory => Ok(()),
            Self::Sqlite { url, max_connections } => {
                if !url.starts_with("sqlite:") {
                    return Err(format!("store url `{url}` is not a sqlite url"));
                }
                if *max_connections == 0 {
                    return Err("max_connections must be greater than 0".into());
                }
                Ok(())
            }
        }
    }
}

impl LedgerConfig {
    /// Validate the store and audit settings.
    pub fn validate(&self) -> Result<(), String> {
        self.store
            .validate()
            .map_err(|e| format!("store invalid: {e}"))?;
        if self.audit_max_events == Some(0) {
            return Err("audit_max_events must be greater than 0 when set".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from the environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup and validate.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = match lookup(ENV_DATABASE_URL) {
            Some(url) => {
                let max_connections = match lookup(ENV_MAX_CONNECTIONS) {
                    Some(raw) => raw
                        .parse::<u32>()
                        .map_err(|e| format!("{ENV_MAX_CONNECTIONS}: {e}"))?,
                    None => DEFAULT_MAX_CONNECTIONS,
                };
                StoreConfig::Sqlite { url, max_connections }
            }
            None => StoreConfig::InMemory,
        };
        let audit_max_events = lookup(ENV_AUDIT_EVENTS)
            .map(|raw| raw.parse::<usize>().map_err(|e| format!("{ENV_AUDIT_EVENTS}: {e}")))
            .transpose()?;

        let cfg = Self {
            store,
            audit_max_events,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}
