//! Backend and connection settings.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::rpc::{Domain, JsonRpcClient};

fn default_timeout() -> u64 {
    60
}

fn default_version() -> String {
    "16.0".to_string()
}

/// How to reach one Odoo database over JSON-RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub url: String,
    pub database: String,
    pub username: String,

    /// Inline password. Prefer `password_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Name of an environment variable holding the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8069".to_string(),
            database: "odoo".to_string(),
            username: "admin".to_string(),
            password: None,
            password_env: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl ConnectionSettings {
    /// Resolve the password, inline first, then from `password_env`.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if neither source yields a password.
    pub fn resolve_password(&self) -> Result<String> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }

        let Some(var) = &self.password_env else {
            return Err(Error::Config(format!(
                "no password or password_env configured for {}@{}",
                self.username, self.database
            )));
        };

        std::env::var(var)
            .ok()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::Config(format!("environment variable {var} is not set")))
    }

    /// Authenticate and return a connected client.
    ///
    /// # Errors
    ///
    /// Returns an error if the password cannot be resolved or login fails.
    pub fn connect(&self, lang: Option<&str>) -> Result<JsonRpcClient> {
        let password = self.resolve_password()?;
        let client = JsonRpcClient::connect(
            &self.url,
            &self.database,
            &self.username,
            &password,
            Duration::from_secs(self.timeout_secs),
        )?;
        Ok(client.with_lang(lang))
    }
}

/// Which side is authoritative for `resync`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MainRecord {
    /// The local database wins: resync exports.
    Local,
    /// The remote backend wins: resync re-imports (forced).
    #[default]
    Remote,
}

/// One remote Odoo backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,

    /// Odoo version of the remote server, e.g. `"12.0"`.
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub main_record: MainRecord,

    /// Language code sent in the context of remote calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_lang: Option<String>,

    pub connection: ConnectionSettings,

    /// Deployment-specific values referenced by key from mapping rules
    /// (fallback pricelist, warehouse, UTM source, payment terms).
    #[serde(default)]
    pub constants: BTreeMap<String, Value>,

    /// Extra search domain per model, applied to every batch search.
    #[serde(default)]
    pub domain_filters: BTreeMap<String, Domain>,
}

impl BackendConfig {
    /// Template backend written by `osync init`.
    #[must_use]
    pub fn example() -> Self {
        Self {
            name: "main".to_string(),
            version: default_version(),
            main_record: MainRecord::Remote,
            default_lang: Some("en_US".to_string()),
            connection: ConnectionSettings {
                url: "https://erp.example.com".to_string(),
                password_env: Some("OSYNC_MAIN_PASSWORD".to_string()),
                ..ConnectionSettings::default()
            },
            constants: BTreeMap::new(),
            domain_filters: BTreeMap::new(),
        }
    }

    /// Major version number (`"12.0"` -> `12`).
    #[must_use]
    pub fn version_major(&self) -> Option<u32> {
        self.version.split('.').next()?.trim().parse().ok()
    }

    /// Whether the remote runs Odoo `major` or older.
    #[must_use]
    pub fn version_at_most(&self, major: u32) -> bool {
        self.version_major().is_some_and(|v| v <= major)
    }

    /// Look up a constant by key.
    #[must_use]
    pub fn constant(&self, key: &str) -> Option<&Value> {
        self.constants.get(key)
    }

    /// Extra domain configured for `model`, if any.
    #[must_use]
    pub fn domain_filter(&self, model: &str) -> Option<&Domain> {
        self.domain_filters.get(model)
    }

    /// Connect to the remote database.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub fn connect(&self) -> Result<JsonRpcClient> {
        self.connection.connect(self.default_lang.as_deref())
    }
}
