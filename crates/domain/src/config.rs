//! Identity client configuration and its layered merge.
//!
//! Configuration reaches the identity client from three places: static
//! defaults, caller overrides and the resolved server URL. Each of them is a
//! [`PartialAuthConfig`]; they are merged left to right, later keys winning.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{DomainError, DomainResult};

/// Default realm for the AAS server.
pub const DEFAULT_REALM: &str = "TMT";

/// Default public client id registered in the realm.
pub const DEFAULT_CLIENT_ID: &str = "tmt-frontend-app";

/// Fallback AAS server URL used when resolution yields nothing.
pub const DEFAULT_AAS_SERVER_URL: &str = "http://localhost:8081";

/// A configuration object where every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialAuthConfig {
    /// Base URL of the identity server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Realm name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    /// Client id.
    #[serde(
        default,
        alias = "client_id",
        alias = "clientid",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_id: Option<String>,
    /// Where the identity server sends the browser after login.
    #[serde(
        default,
        alias = "redirect_uri",
        alias = "redirecturi",
        skip_serializing_if = "Option::is_none"
    )]
    pub redirect_uri: Option<String>,
    /// Any other keys, passed through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl PartialAuthConfig {
    /// The static defaults for the AAS realm.
    #[must_use]
    pub fn aas_defaults() -> Self {
        Self {
            realm: Some(DEFAULT_REALM.to_string()),
            client_id: Some(DEFAULT_CLIENT_ID.to_string()),
            ..Self::default()
        }
    }

    /// A partial config carrying only the server URL.
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Shallow merge: keys present in `later` override keys in `self`.
    #[must_use]
    pub fn merge(mut self, later: Self) -> Self {
        if later.url.is_some() {
            self.url = later.url;
        }
        if later.realm.is_some() {
            self.realm = later.realm;
        }
        if later.client_id.is_some() {
            self.client_id = later.client_id;
        }
        if later.redirect_uri.is_some() {
            self.redirect_uri = later.redirect_uri;
        }
        self.extra.extend(later.extra);
        self
    }

    /// Merges any number of sources left to right.
    #[must_use]
    pub fn merged(sources: impl IntoIterator<Item = Self>) -> Self {
        sources.into_iter().fold(Self::default(), Self::merge)
    }

    /// Converts the merged object into a complete configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::MissingConfigKey`] when `url`, `realm` or
    /// `client_id` is absent.
    pub fn into_config(self) -> DomainResult<AuthConfig> {
        let url = self
            .url
            .ok_or_else(|| DomainError::MissingConfigKey("url".to_string()))?;
        let realm = self
            .realm
            .ok_or_else(|| DomainError::MissingConfigKey("realm".to_string()))?;
        let client_id = self
            .client_id
            .ok_or_else(|| DomainError::MissingConfigKey("clientId".to_string()))?;

        Ok(AuthConfig {
            url,
            realm,
            client_id,
            redirect_uri: self.redirect_uri,
            extra: self.extra,
        })
    }
}

/// Complete configuration handed to an identity client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Base URL of the identity server.
    pub url: String,
    /// Realm name.
    pub realm: String,
    /// Client id.
    pub client_id: String,
    /// Where the identity server sends the browser after login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    /// Extra keys carried over from the merged sources.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// Static configuration of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    /// Defaults merged underneath every caller configuration.
    pub aas: PartialAuthConfig,
    /// Server URL used when the resolver yields nothing usable.
    pub aas_server_url: String,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            aas: PartialAuthConfig::aas_defaults(),
            aas_server_url: DEFAULT_AAS_SERVER_URL.to_string(),
        }
    }
}
