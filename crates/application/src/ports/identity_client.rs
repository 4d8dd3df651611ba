//! Identity client port

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use aas_domain::{
    AuthConfig, AuthError, InitOptions, InitStatus, RealmAccess, ResourceAccess, TokenClaims,
    UserInfo,
};
use url::Url;

/// Callback invoked by an identity client when its access token expires.
pub type TokenExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// Port for an OIDC identity client bound to one realm and client id.
///
/// This trait abstracts the identity provider library, allowing the
/// session store to be independent of a specific server or transport.
/// Accessors read the client's current state and never block on I/O.
pub trait IdentityClient: Send + Sync {
    /// Initializes the client.
    ///
    /// Depending on `options`, this completes a login callback, asks for a
    /// login redirect, or only reports the absence of a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the callback is rejected, the code exchange fails,
    /// or the configuration cannot produce a login URL.
    fn init(
        &self,
        options: &InitOptions,
    ) -> impl Future<Output = Result<InitStatus, AuthError>> + Send;

    /// Refreshes the access token if it expires within `min_validity` seconds.
    ///
    /// Returns `true` when a new token was obtained and `false` when the
    /// current one is still valid.
    ///
    /// # Errors
    ///
    /// Returns an error if no refresh token is held or the server rejects it.
    fn update_token(
        &self,
        min_validity: u64,
    ) -> impl Future<Output = Result<bool, AuthError>> + Send;

    /// Registers the hook fired when the access token expires.
    ///
    /// A later registration replaces the previous hook.
    fn on_token_expired(&self, hook: TokenExpiredHook);

    /// The raw access token.
    fn token(&self) -> Option<String>;

    /// The decoded access token claims.
    fn token_parsed(&self) -> Option<TokenClaims>;

    /// Realm-level role grants.
    fn realm_access(&self) -> Option<RealmAccess>;

    /// Role grants per resource.
    fn resource_access(&self) -> Option<HashMap<String, ResourceAccess>>;

    /// Whether the client holds an authenticated session.
    fn authenticated(&self) -> bool;

    /// Whether the realm grants `role`.
    fn has_realm_role(&self, role: &str) -> bool;

    /// Whether `resource` grants `role`. `None` means the client's own id.
    fn has_resource_role(&self, role: &str, resource: Option<&str>) -> bool;

    /// Ends the session and returns the URL the user must visit to log out.
    ///
    /// # Errors
    ///
    /// Returns an error if the logout URL cannot be built.
    fn logout(
        &self,
        redirect_uri: Option<&Url>,
    ) -> impl Future<Output = Result<Url, AuthError>> + Send;

    /// Loads the user profile from the identity server.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is not authenticated or the request fails.
    fn load_user_info(&self) -> impl Future<Output = Result<UserInfo, AuthError>> + Send;
}

/// Constructs identity clients from a merged configuration.
pub trait IdentityClientFactory: Send + Sync {
    /// The client type produced.
    type Client: IdentityClient + 'static;

    /// Creates an uninitialized client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is unusable.
    fn create(&self, config: AuthConfig) -> Result<Self::Client, AuthError>;
}
