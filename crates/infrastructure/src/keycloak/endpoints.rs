//! Realm endpoint URLs.

use aas_domain::{AuthConfig, DomainError, DomainResult};
use url::Url;

/// OIDC endpoints of one Keycloak realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeycloakEndpoints {
    /// Authorization endpoint (login page).
    pub authorization: Url,
    /// Token endpoint.
    pub token: Url,
    /// End-session endpoint.
    pub logout: Url,
    /// Userinfo endpoint.
    pub userinfo: Url,
}

impl KeycloakEndpoints {
    /// Derives the endpoints from the server URL and realm.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidUrl`] if `config.url` is not an
    /// absolute http(s) URL.
    pub fn new(config: &AuthConfig) -> DomainResult<Self> {
        let base = Url::parse(&config.url)
            .map_err(|e| DomainError::InvalidUrl(format!("{}: {e}", config.url)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(DomainError::InvalidUrl(config.url.clone()));
        }

        let endpoint = |name: &str| -> DomainResult<Url> {
            let mut url = base.clone();
            url.set_query(None);
            url.set_fragment(None);
            url.path_segments_mut()
                .map_err(|()| DomainError::InvalidUrl(config.url.clone()))?
                .pop_if_empty()
                .extend(["realms", config.realm.as_str(), "protocol", "openid-connect", name]);
            Ok(url)
        };

        Ok(Self {
            authorization: endpoint("auth")?,
            token: endpoint("token")?,
            logout: endpoint("logout")?,
            userinfo: endpoint("userinfo")?,
        })
    }
}
