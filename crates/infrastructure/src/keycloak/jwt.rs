//! JWT payload decoding.
//!
//! Signatures are not verified; the identity server is trusted.

use aas_domain::{DomainError, DomainResult, TokenClaims};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Decodes the claims of a compact JWT.
///
/// # Errors
///
/// Returns [`DomainError::MalformedToken`] if the token has no payload
/// segment or the payload is not base64url-encoded JSON.
pub fn decode_claims(token: &str) -> DomainResult<TokenClaims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) => payload,
        _ => {
            return Err(DomainError::MalformedToken(
                "expected three dot-separated segments".to_string(),
            ));
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| DomainError::MalformedToken(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| DomainError::MalformedToken(format!("payload is not a claims object: {e}")))
}
