//! Snapshot of an authenticated session.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::claims::{RealmAccess, ResourceAccess, TokenClaims};

/// Authentication state copied from an identity client.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Raw access token.
    pub token: Option<String>,
    /// Decoded access token claims.
    pub token_parsed: Option<TokenClaims>,
    /// Realm-level role grants.
    pub realm_access: Option<RealmAccess>,
    /// Role grants per resource.
    pub resource_access: Option<HashMap<String, ResourceAccess>>,
    /// Whether the client reported an authenticated session.
    pub is_authenticated: bool,
}

impl SessionSnapshot {
    /// The unauthenticated snapshot.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Preferred username from the parsed token, if any.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.token_parsed
            .as_ref()
            .and_then(|claims| claims.preferred_username.as_deref())
    }
}
