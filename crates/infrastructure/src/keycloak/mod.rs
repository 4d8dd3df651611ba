//! Keycloak adapter for the identity client port.

mod callback;
mod client;
mod endpoints;
mod jwt;

pub use client::{KeycloakClient, KeycloakClientFactory};
pub use endpoints::KeycloakEndpoints;
pub use jwt::decode_claims;
