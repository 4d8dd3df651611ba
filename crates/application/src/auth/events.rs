//! Session events published to subscribers.

/// Events emitted by an [`AuthSession`](super::AuthSession).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// An identity client was constructed and its initialization started.
    Started {
        /// Realm the client is bound to.
        realm: String,
        /// Client id.
        client_id: String,
    },
    /// The access token expired and was refreshed.
    TokenRefreshed {
        /// Preview of the new token.
        token_preview: Option<String>,
    },
    /// The access token was still valid; nothing was refreshed.
    TokenStillValid,
    /// Refreshing the expired token failed. The session is now stale.
    RefreshFailed {
        /// Error message.
        error: String,
    },
    /// A client was adopted by the store.
    Adopted {
        /// Whether the adopted client was authenticated.
        authenticated: bool,
    },
}

impl AuthEvent {
    /// Get a preview of an access token (first 8 chars + ...).
    #[must_use]
    pub fn token_preview(token: &str) -> String {
        match token.get(..8) {
            Some(head) if token.len() > 12 => format!("{head}..."),
            _ => token.to_string(),
        }
    }

    /// Whether this event reports a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::RefreshFailed { .. })
    }
}
