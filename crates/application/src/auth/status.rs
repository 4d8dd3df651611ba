//! Token status derived from a session snapshot.

use aas_domain::SessionSnapshot;
use chrono::{DateTime, Utc};

/// Seconds before expiry at which a token counts as expiring.
pub const DEFAULT_REFRESH_BUFFER_SECONDS: i64 = 60;

/// Status of the session's access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    /// No authenticated token exists.
    NotAuthenticated,
    /// Token is valid and not expiring soon.
    Valid {
        /// Seconds until expiry, or None if no expiry.
        seconds_remaining: Option<i64>,
    },
    /// Token is valid but will expire soon.
    Expiring {
        /// Seconds until expiry.
        seconds_remaining: i64,
    },
    /// Token has expired.
    Expired,
}

impl TokenStatus {
    /// Computes the status of `snapshot` at `now`.
    #[must_use]
    pub fn of(snapshot: &SessionSnapshot, now: DateTime<Utc>, refresh_buffer_seconds: i64) -> Self {
        if !snapshot.is_authenticated || snapshot.token.is_none() {
            return Self::NotAuthenticated;
        }

        let expires_at = snapshot
            .token_parsed
            .as_ref()
            .and_then(aas_domain::TokenClaims::expires_at);

        match expires_at.map(|exp| (exp - now).num_seconds()) {
            None => Self::Valid {
                seconds_remaining: None,
            },
            Some(secs) if secs <= 0 => Self::Expired,
            Some(secs) if secs <= refresh_buffer_seconds => Self::Expiring {
                seconds_remaining: secs,
            },
            Some(secs) => Self::Valid {
                seconds_remaining: Some(secs),
            },
        }
    }

    /// Returns true if the token is valid (not expired).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. } | Self::Expiring { .. })
    }

    /// Returns true if the token needs attention (expiring or expired).
    #[must_use]
    pub const fn needs_attention(&self) -> bool {
        matches!(self, Self::Expiring { .. } | Self::Expired)
    }

    /// Get a user-friendly display message.
    #[must_use]
    pub fn display_message(&self) -> String {
        match self {
            Self::NotAuthenticated => "Not authenticated".to_string(),
            Self::Valid {
                seconds_remaining: Some(secs),
            } => {
                if *secs > 3600 {
                    format!("Valid for {} hours", secs / 3600)
                } else if *secs > 60 {
                    format!("Valid for {} minutes", secs / 60)
                } else {
                    format!("Valid for {secs} seconds")
                }
            }
            Self::Valid {
                seconds_remaining: None,
            } => "Valid (no expiry)".to_string(),
            Self::Expiring { seconds_remaining } => {
                format!("Expiring in {seconds_remaining} seconds")
            }
            Self::Expired => "Expired".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aas_domain::TokenClaims;
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap_or_default()
    }

    fn snapshot_expiring_at(exp: Option<i64>) -> SessionSnapshot {
        SessionSnapshot {
            token: Some("token".to_string()),
            token_parsed: Some(TokenClaims {
                exp,
                ..TokenClaims::default()
            }),
            is_authenticated: true,
            ..SessionSnapshot::default()
        }
    }

    #[test]
    fn test_not_authenticated() {
        let status = TokenStatus::of(&SessionSnapshot::empty(), at(0), 60);
        assert_eq!(status, TokenStatus::NotAuthenticated);
        assert!(!status.is_valid());
    }

    #[test]
    fn test_valid_expiring_expired() {
        let snapshot = snapshot_expiring_at(Some(1_000));

        assert_eq!(
            TokenStatus::of(&snapshot, at(0), 60),
            TokenStatus::Valid {
                seconds_remaining: Some(1_000)
            }
        );
        assert_eq!(
            TokenStatus::of(&snapshot, at(970), 60),
            TokenStatus::Expiring {
                seconds_remaining: 30
            }
        );
        assert_eq!(TokenStatus::of(&snapshot, at(1_000), 60), TokenStatus::Expired);
        assert!(!TokenStatus::of(&snapshot, at(0), 60).needs_attention());
        assert!(TokenStatus::of(&snapshot, at(970), 60).needs_attention());
        assert!(TokenStatus::of(&snapshot, at(1_000), 60).needs_attention());
    }

    #[test]
    fn test_no_expiry_claim() {
        let status = TokenStatus::of(&snapshot_expiring_at(None), at(0), 60);
        assert!(status.is_valid());
        assert!(!status.needs_attention());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            TokenStatus::NotAuthenticated.display_message(),
            "Not authenticated"
        );
        assert!(
            TokenStatus::Valid {
                seconds_remaining: Some(7200)
            }
            .display_message()
            .contains("hours")
        );
        assert_eq!(
            TokenStatus::Expiring {
                seconds_remaining: 30
            }
            .display_message(),
            "Expiring in 30 seconds"
        );
    }
}
