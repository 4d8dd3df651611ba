//! Identity client initialization options and outcome.

use serde::{Deserialize, Serialize};
use url::Url;

/// What the client does on initialization when no session is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnLoad {
    /// Send the user to the login page.
    #[default]
    LoginRequired,
    /// Only report whether a session already exists.
    CheckSso,
}

/// OIDC authorization flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    /// Authorization code flow.
    Standard,
    /// Tokens returned directly from the authorization endpoint.
    Implicit,
    /// Code and tokens returned in one round trip.
    #[default]
    Hybrid,
}

impl Flow {
    /// The `response_type` parameter sent to the authorization endpoint.
    #[must_use]
    pub const fn response_type(self) -> &'static str {
        match self {
            Self::Standard => "code",
            Self::Implicit => "id_token token",
            Self::Hybrid => "code id_token token",
        }
    }

    /// Whether the flow hands back an authorization code to exchange.
    #[must_use]
    pub const fn returns_code(self) -> bool {
        matches!(self, Self::Standard | Self::Hybrid)
    }
}

/// Options passed to `init`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InitOptions {
    /// Behavior when no session is present.
    pub on_load: OnLoad,
    /// Authorization flow.
    pub flow: Flow,
    /// The URL the identity server redirected back to, if any.
    pub callback: Option<Url>,
}

impl InitOptions {
    /// Login-required mode with the hybrid flow.
    #[must_use]
    pub fn login_required_hybrid() -> Self {
        Self::default()
    }

    /// Attach the callback URL received after login.
    #[must_use]
    pub fn with_callback(mut self, callback: Url) -> Self {
        self.callback = Some(callback);
        self
    }
}

/// Outcome of a successful `init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitStatus {
    /// Tokens were obtained.
    Authenticated,
    /// The user must be sent to this URL to log in.
    LoginRequired {
        /// Authorization endpoint URL with all request parameters.
        login_url: Url,
    },
    /// No session exists and none was requested.
    Unauthenticated,
}
