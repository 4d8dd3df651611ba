//! AAS Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer.

pub mod adapters;
pub mod keycloak;

pub use adapters::{LocationServiceResolver, StaticResolver, SystemClock};
pub use keycloak::{KeycloakClient, KeycloakClientFactory, KeycloakEndpoints, decode_claims};
