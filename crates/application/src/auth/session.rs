//! The auth session store.
//!
//! [`AuthSession`] builds identity clients from layered configuration,
//! keeps their tokens fresh, and exposes a snapshot of the adopted client's
//! authentication state to the rest of the application.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use aas_domain::{
    AuthError, InitOptions, InitStatus, PartialAuthConfig, RealmAccess, ResourceAccess,
    SessionSnapshot, StaticConfig, TokenClaims, UserInfo,
};
use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use url::Url;

use super::events::AuthEvent;
use super::status::{DEFAULT_REFRESH_BUFFER_SECONDS, TokenStatus};
use crate::ports::{AasResolver, IdentityClient, IdentityClientFactory, TokenExpiredHook};
use crate::{ApplicationError, ApplicationResult};

/// Capacity of the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// A freshly constructed client together with its running initialization.
pub struct Authentication<C> {
    /// The identity client.
    pub client: Arc<C>,
    /// Resolves once initialization finishes.
    pub initialized: PendingInit,
}

impl<C> std::fmt::Debug for Authentication<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authentication")
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

/// Initialization started by [`AuthSession::authenticate`].
///
/// The task runs whether or not this future is polled.
#[derive(Debug)]
pub struct PendingInit {
    handle: JoinHandle<Result<InitStatus, AuthError>>,
}

impl Future for PendingInit {
    type Output = ApplicationResult<InitStatus>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().handle)
            .poll(cx)
            .map(|joined| match joined {
                Ok(result) => result.map_err(ApplicationError::from),
                Err(e) => Err(ApplicationError::Internal(format!(
                    "initialization task failed: {e}"
                ))),
            })
    }
}

/// Authentication session store.
///
/// Constructed explicitly and passed through application context; holds
/// the snapshot of the most recently adopted identity client.
pub struct AuthSession<F, R>
where
    F: IdentityClientFactory,
{
    static_config: StaticConfig,
    factory: F,
    resolver: R,
    snapshot: SessionSnapshot,
    client: Option<Arc<F::Client>>,
    events: broadcast::Sender<AuthEvent>,
}

impl<F, R> AuthSession<F, R>
where
    F: IdentityClientFactory,
    R: AasResolver,
{
    /// Creates an unauthenticated session.
    #[must_use]
    pub fn new(static_config: StaticConfig, factory: F, resolver: R) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            static_config,
            factory,
            resolver,
            snapshot: SessionSnapshot::empty(),
            client: None,
            events,
        }
    }

    /// Subscribes to session events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Builds an identity client and starts its initialization.
    ///
    /// Configuration is merged from the static defaults, then `config`, then
    /// `url`; later keys win. The client refreshes its token on expiry and
    /// reports the outcome as an [`AuthEvent`]. Initialization runs in
    /// login-required mode with the hybrid flow and is not awaited here.
    ///
    /// # Errors
    ///
    /// Returns an error if the merged configuration is incomplete, the
    /// factory rejects it, or no tokio runtime is running.
    pub fn authenticate(
        &self,
        config: PartialAuthConfig,
        url: PartialAuthConfig,
    ) -> ApplicationResult<Authentication<F::Client>> {
        info!("instantiating AAS");
        let runtime = Handle::try_current()
            .map_err(|e| ApplicationError::Internal(format!("no async runtime: {e}")))?;

        let merged =
            PartialAuthConfig::merged([self.static_config.aas.clone(), config, url]).into_config()?;
        let started = AuthEvent::Started {
            realm: merged.realm.clone(),
            client_id: merged.client_id.clone(),
        };

        let client = Arc::new(self.factory.create(merged)?);
        client.on_token_expired(expiry_hook(&client, self.events.clone(), runtime.clone()));

        let init_client = Arc::clone(&client);
        let handle = runtime.spawn(async move {
            let options = InitOptions::login_required_hybrid();
            init_client.init(&options).await
        });
        self.publish(started);

        Ok(Authentication {
            client,
            initialized: PendingInit { handle },
        })
    }

    /// Adopts `client`: copies its authentication state into the store.
    ///
    /// The client is not checked for initialization; an uninitialized one
    /// yields an empty, unauthenticated snapshot.
    pub fn from(&mut self, client: &Arc<F::Client>) -> &mut Self {
        self.snapshot = SessionSnapshot {
            token: client.token(),
            token_parsed: client.token_parsed(),
            realm_access: client.realm_access(),
            resource_access: client.resource_access(),
            is_authenticated: client.authenticated(),
        };
        self.client = Some(Arc::clone(client));
        self.publish(AuthEvent::Adopted {
            authenticated: self.snapshot.is_authenticated,
        });
        self
    }

    /// Resolves the AAS server URL, falling back to static configuration.
    pub async fn aas_url(&self) -> String {
        match self.resolver.resolve().await {
            Some(url) if !url.is_empty() => url,
            _ => {
                debug!(
                    fallback = %self.static_config.aas_server_url,
                    "AAS url not resolved, using configured url"
                );
                self.static_config.aas_server_url.clone()
            }
        }
    }

    /// The raw access token.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.snapshot.token.as_deref()
    }

    /// The decoded access token claims.
    #[must_use]
    pub const fn token_parsed(&self) -> Option<&TokenClaims> {
        self.snapshot.token_parsed.as_ref()
    }

    /// Realm-level role grants.
    #[must_use]
    pub const fn realm_access(&self) -> Option<&RealmAccess> {
        self.snapshot.realm_access.as_ref()
    }

    /// Role grants per resource.
    #[must_use]
    pub const fn resource_access(&self) -> Option<&HashMap<String, ResourceAccess>> {
        self.snapshot.resource_access.as_ref()
    }

    /// Whether the adopted client was authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.snapshot.is_authenticated
    }

    /// The full snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }

    /// The adopted client, if any.
    #[must_use]
    pub const fn client(&self) -> Option<&Arc<F::Client>> {
        self.client.as_ref()
    }

    /// Status of the adopted token at `now`.
    #[must_use]
    pub fn token_status(&self, now: DateTime<Utc>) -> TokenStatus {
        TokenStatus::of(&self.snapshot, now, DEFAULT_REFRESH_BUFFER_SECONDS)
    }

    /// Whether the realm grants `role`, according to the adopted client.
    #[must_use]
    pub fn has_realm_role(&self, role: &str) -> bool {
        self.client
            .as_ref()
            .is_some_and(|client| client.has_realm_role(role))
    }

    /// Whether `resource` grants `role`, according to the adopted client.
    #[must_use]
    pub fn has_resource_role(&self, role: &str, resource: Option<&str>) -> bool {
        self.client
            .as_ref()
            .is_some_and(|client| client.has_resource_role(role, resource))
    }

    /// Logs the adopted client out and returns the URL to visit.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotAuthenticated`] if no client was adopted.
    pub async fn logout(&self, redirect_uri: Option<&Url>) -> Result<Url, AuthError> {
        let client = self.client.as_ref().ok_or(AuthError::NotAuthenticated)?;
        client.logout(redirect_uri).await
    }

    /// Loads the user profile through the adopted client.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotAuthenticated`] if no client was adopted.
    pub async fn load_user_info(&self) -> Result<UserInfo, AuthError> {
        let client = self.client.as_ref().ok_or(AuthError::NotAuthenticated)?;
        client.load_user_info().await
    }

    fn publish(&self, event: AuthEvent) {
        publish(&self.events, event);
    }
}

fn publish(events: &broadcast::Sender<AuthEvent>, event: AuthEvent) {
    if events.send(event).is_err() {
        debug!("no session event subscribers");
    }
}

/// Builds the hook that refreshes `client`'s token when it expires.
///
/// The hook holds a weak reference so a dropped client stops refreshing.
fn expiry_hook<C>(
    client: &Arc<C>,
    events: broadcast::Sender<AuthEvent>,
    runtime: Handle,
) -> TokenExpiredHook
where
    C: IdentityClient + 'static,
{
    let weak = Arc::downgrade(client);
    Arc::new(move || {
        let Some(client) = weak.upgrade() else {
            return;
        };
        let events = events.clone();
        runtime.spawn(async move {
            refresh_expired_token(client.as_ref(), &events).await;
        });
    })
}

async fn refresh_expired_token<C: IdentityClient>(
    client: &C,
    events: &broadcast::Sender<AuthEvent>,
) {
    let event = match client.update_token(0).await {
        Ok(true) => {
            info!("token refreshed successfully");
            AuthEvent::TokenRefreshed {
                token_preview: client.token().map(|t| AuthEvent::token_preview(&t)),
            }
        }
        Ok(false) => {
            debug!("token still valid, nothing refreshed");
            AuthEvent::TokenStillValid
        }
        Err(e) => {
            error!(error = %e, "Failed to refresh the token, or the session has expired");
            AuthEvent::RefreshFailed {
                error: e.to_string(),
            }
        }
    };
    publish(events, event);
}
