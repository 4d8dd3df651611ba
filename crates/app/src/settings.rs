//! Settings for the login binary.
//!
//! Read from an optional `aas.toml`, then from `AAS__*` environment
//! variables (`AAS__AAS__REALM`, `AAS__AAS_SERVER_URL`, ...).

use std::path::Path;

use aas_domain::config::DEFAULT_AAS_SERVER_URL;
use aas_domain::{PartialAuthConfig, StaticConfig};
use aas_infrastructure::adapters::{DEFAULT_AAS_CONNECTION, LocationServiceResolver};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use url::Url;

/// Settings file looked up in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "aas.toml";

/// Login binary settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Identity client keys layered over the built-in realm defaults.
    pub aas: PartialAuthConfig,
    /// Server URL used when the location service yields nothing.
    pub aas_server_url: String,
    /// Location service base URL. Without it, `aas_server_url` is used as is.
    pub location_server_url: Option<String>,
    /// Connection name the AAS server is registered under.
    pub aas_connection: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            aas: PartialAuthConfig::default(),
            aas_server_url: DEFAULT_AAS_SERVER_URL.to_string(),
            location_server_url: None,
            aas_connection: DEFAULT_AAS_CONNECTION.to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from `path` (if it exists) and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("AAS").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Static configuration for the session store.
    #[must_use]
    pub fn static_config(&self) -> StaticConfig {
        StaticConfig {
            aas: PartialAuthConfig::aas_defaults().merge(self.aas.clone()),
            aas_server_url: self.aas_server_url.clone(),
        }
    }

    /// Location service resolver, if a location service is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URL is invalid.
    pub fn location_resolver(&self) -> Result<Option<LocationServiceResolver>, url::ParseError> {
        self.location_server_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map(|url| {
                    LocationServiceResolver::new(url).with_connection(self.aas_connection.clone())
                })
            })
            .transpose()
    }
}
