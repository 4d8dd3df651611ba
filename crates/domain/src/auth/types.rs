//! Token set and authentication errors

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DomainError;

/// Tokens held by an identity client, with metadata for expiry tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// The access token string
    pub access_token: String,
    /// Token type (usually "Bearer")
    pub token_type: String,
    /// When the access token expires (if known)
    pub expires_at: Option<DateTime<Utc>>,
    /// Refresh token for obtaining new access tokens
    pub refresh_token: Option<String>,
    /// OIDC id token
    pub id_token: Option<String>,
    /// Scopes granted by this token
    #[serde(default)]
    pub scopes: Vec<String>,
    /// When this token was obtained
    pub obtained_at: DateTime<Utc>,
}

impl TokenSet {
    /// Create a token set obtained at `now`.
    #[must_use]
    pub fn new(access_token: String, token_type: String, now: DateTime<Utc>) -> Self {
        Self {
            access_token,
            token_type,
            expires_at: None,
            refresh_token: None,
            id_token: None,
            scopes: Vec::new(),
            obtained_at: now,
        }
    }

    /// Set the expiry relative to `obtained_at`.
    ///
    /// Lifetimes past the representable range saturate at the latest
    /// representable instant.
    #[must_use]
    pub fn expires_in(mut self, secs: u64) -> Self {
        let expires_at = i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| self.obtained_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.expires_at = Some(expires_at);
        self
    }

    /// Set an absolute expiry.
    #[must_use]
    pub const fn expiring_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Attach a refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: Option<String>) -> Self {
        self.refresh_token = refresh_token;
        self
    }

    /// Attach an id token.
    #[must_use]
    pub fn with_id_token(mut self, id_token: Option<String>) -> Self {
        self.id_token = id_token;
        self
    }

    /// Attach space-separated scopes.
    #[must_use]
    pub fn with_scope(mut self, scope: Option<&str>) -> Self {
        self.scopes = scope
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default();
        self
    }

    /// Check if the token is expired or will expire within `min_validity` seconds of `now`.
    #[must_use]
    pub fn is_expired_or_expiring(&self, now: DateTime<Utc>, min_validity: i64) -> bool {
        let horizon = Duration::try_seconds(min_validity)
            .and_then(|validity| now.checked_add_signed(validity))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.expires_at.is_some_and(|expires_at| horizon >= expires_at)
    }

    /// Check if the token can be refreshed.
    #[must_use]
    pub const fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Time until expiry in seconds, or None if no expiry.
    #[must_use]
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|exp| (exp - now).num_seconds())
    }

    /// Returns the Authorization header value.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The merged configuration is unusable.
    #[error("Invalid identity client configuration: {message}")]
    InvalidConfiguration {
        /// Error description.
        message: String,
    },
    /// No client has been adopted, or the client holds no token.
    #[error("Not authenticated")]
    NotAuthenticated,
    /// Token expired and no refresh token available.
    #[error("Token expired and no refresh token available")]
    TokenExpiredNoRefresh,
    /// Failed to refresh token.
    #[error("Failed to refresh token: {message}")]
    RefreshFailed {
        /// Error description.
        message: String,
    },
    /// The login callback was rejected.
    #[error("Invalid login callback: {message}")]
    InvalidCallback {
        /// Error description.
        message: String,
    },
    /// The authorization code could not be exchanged.
    #[error("Token exchange failed: {message}")]
    TokenExchangeFailed {
        /// Error description.
        message: String,
    },
    /// The userinfo endpoint rejected the request.
    #[error("Failed to load user info: {message}")]
    UserInfoFailed {
        /// Error description.
        message: String,
    },
    /// Network error.
    #[error("Network error: {message}")]
    NetworkError {
        /// Error description.
        message: String,
    },
    /// A domain validation error occurred.
    #[error(transparent)]
    Domain(#[from] DomainError),
}
