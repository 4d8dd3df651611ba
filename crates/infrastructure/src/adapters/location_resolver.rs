//! Location service resolver
//!
//! Asks the location service where the AAS server is registered.

use aas_application::ports::AasResolver;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

/// Connection name the AAS server registers under.
pub const DEFAULT_AAS_CONNECTION: &str = "AAS-server-http-service";

/// How long the location service may wait for a registration.
pub const DEFAULT_WITHIN_SECS: u64 = 5;

/// A resolved location.
#[derive(Debug, Deserialize)]
struct ResolvedLocation {
    uri: String,
}

/// Resolves the AAS server URL through the location service HTTP API.
#[derive(Debug, Clone)]
pub struct LocationServiceResolver {
    http: reqwest::Client,
    location_url: Url,
    connection: String,
    within_secs: u64,
}

impl LocationServiceResolver {
    /// Creates a resolver for the location service at `location_url`.
    #[must_use]
    pub fn new(location_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            location_url,
            connection: DEFAULT_AAS_CONNECTION.to_string(),
            within_secs: DEFAULT_WITHIN_SECS,
        }
    }

    /// Set the connection name to resolve.
    #[must_use]
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = connection.into();
        self
    }

    /// Set how long the location service may wait.
    #[must_use]
    pub const fn within_secs(mut self, secs: u64) -> Self {
        self.within_secs = secs;
        self
    }

    /// The resolve request URL.
    fn resolve_url(&self) -> Option<Url> {
        let mut url = self.location_url.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(["location", "resolve", self.connection.as_str()]);
        url.query_pairs_mut()
            .append_pair("within", &format!("{}seconds", self.within_secs));
        Some(url)
    }
}

impl AasResolver for LocationServiceResolver {
    async fn resolve(&self) -> Option<String> {
        let Some(url) = self.resolve_url() else {
            warn!(location_url = %self.location_url, "location service url cannot be a base");
            return None;
        };

        debug!(%url, "resolving AAS location");
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "location service unreachable");
                return None;
            }
        };

        if response.status() != StatusCode::OK {
            warn!(status = %response.status(), connection = %self.connection, "AAS location not resolved");
            return None;
        }

        match response.json::<ResolvedLocation>().await {
            Ok(location) => Some(location.uri),
            Err(e) => {
                warn!(error = %e, "unexpected location service response");
                None
            }
        }
    }
}
