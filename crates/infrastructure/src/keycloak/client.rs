//! Keycloak identity client.
//!
//! Implements the `IdentityClient` port for a public Keycloak client:
//! builds the login redirect, completes the callback (exchanging the code
//! where the flow returns one), refreshes tokens and fires the expiry hook
//! when the access token runs out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aas_application::ports::{Clock, IdentityClient, IdentityClientFactory, TokenExpiredHook};
use aas_domain::{
    AuthConfig, AuthError, Flow, InitOptions, InitStatus, OnLoad, RealmAccess, ResourceAccess,
    TokenClaims, TokenSet, UserInfo,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use url::Url;

use super::callback::CallbackParams;
use super::endpoints::KeycloakEndpoints;
use super::jwt::decode_claims;
use crate::adapters::SystemClock;

/// Content-Type for form-urlencoded data.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Upper bound for `min_validity`, keeps timestamp arithmetic in range.
const MAX_MIN_VALIDITY_SECS: i64 = 365 * 24 * 3600;

/// Token response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// Error response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// A login redirect waiting for its callback.
#[derive(Debug, Clone)]
struct PendingLogin {
    state: String,
    nonce: String,
    redirect_uri: String,
    flow: Flow,
}

#[derive(Debug, Default)]
struct ClientState {
    tokens: Option<TokenSet>,
    claims: Option<TokenClaims>,
    pending: Option<PendingLogin>,
    /// Bumped on logout; tokens requested under an older value are dropped.
    generation: u64,
}

/// Identity client bound to one Keycloak realm and public client.
pub struct KeycloakClient {
    config: AuthConfig,
    endpoints: KeycloakEndpoints,
    http: reqwest::Client,
    clock: Arc<dyn Clock>,
    state: RwLock<ClientState>,
    hook: Arc<RwLock<Option<TokenExpiredHook>>>,
    expiry_timer: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for KeycloakClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakClient")
            .field("realm", &self.config.realm)
            .field("client_id", &self.config.client_id)
            .field("authenticated", &self.authenticated())
            .finish_non_exhaustive()
    }
}

impl KeycloakClient {
    /// Creates an uninitialized client.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL in `config` is invalid.
    pub fn new(
        config: AuthConfig,
        http: reqwest::Client,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let endpoints = KeycloakEndpoints::new(&config)?;
        Ok(Self {
            config,
            endpoints,
            http,
            clock,
            state: RwLock::new(ClientState::default()),
            hook: Arc::new(RwLock::new(None)),
            expiry_timer: Mutex::new(None),
        })
    }

    /// The configuration this client was built from.
    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// The realm endpoints.
    #[must_use]
    pub const fn endpoints(&self) -> &KeycloakEndpoints {
        &self.endpoints
    }

    /// The current token set.
    #[must_use]
    pub fn tokens(&self) -> Option<TokenSet> {
        self.state.read().tokens.clone()
    }

    /// Builds the login URL and remembers its state for the callback.
    fn create_login_url(&self, flow: Flow) -> Result<Url, AuthError> {
        let redirect_uri =
            self.config
                .redirect_uri
                .clone()
                .ok_or_else(|| AuthError::InvalidConfiguration {
                    message: "redirectUri is required to log in".to_string(),
                })?;
        let pending = PendingLogin {
            state: random_token(),
            nonce: random_token(),
            redirect_uri,
            flow,
        };

        let scope = self
            .config
            .extra
            .get("scope")
            .map_or_else(|| "openid".to_string(), |extra| format!("openid {extra}"));

        let mut url = self.endpoints.authorization.clone();
        url.query_pairs_mut()
            .append_pair("client_id", self.config.client_id.as_str())
            .append_pair("redirect_uri", pending.redirect_uri.as_str())
            .append_pair("state", &pending.state)
            .append_pair("response_mode", "fragment")
            .append_pair("response_type", flow.response_type())
            .append_pair("scope", &scope)
            .append_pair("nonce", &pending.nonce);

        self.state.write().pending = Some(pending);
        Ok(url)
    }

    /// Completes a login from the callback URL.
    async fn process_callback(&self, callback: &Url) -> Result<(), AuthError> {
        let params = CallbackParams::from_url(callback);
        if let Some(message) = params.error_message() {
            return Err(AuthError::InvalidCallback { message });
        }

        let (pending, generation) = {
            let mut state = self.state.write();
            let pending = state
                .pending
                .take()
                .ok_or_else(|| AuthError::InvalidCallback {
                    message: "no login in progress".to_string(),
                })?;
            (pending, state.generation)
        };
        if params.state.as_deref() != Some(pending.state.as_str()) {
            return Err(AuthError::InvalidCallback {
                message: "state does not match the login request".to_string(),
            });
        }

        let response = if pending.flow.returns_code() {
            let code = params.code.ok_or_else(|| AuthError::InvalidCallback {
                message: "callback carries no authorization code".to_string(),
            })?;
            self.request_tokens(&[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", pending.redirect_uri.as_str()),
            ])
            .await?
        } else {
            let access_token = params.access_token.ok_or_else(|| AuthError::InvalidCallback {
                message: "callback carries no access token".to_string(),
            })?;
            TokenResponse {
                access_token,
                token_type: params.token_type,
                expires_in: params.expires_in,
                refresh_token: None,
                id_token: params.id_token,
                scope: None,
            }
        };

        if let Some(id_token) = &response.id_token {
            let id_claims = decode_claims(id_token)?;
            if id_claims.nonce.as_deref() != Some(pending.nonce.as_str()) {
                return Err(AuthError::InvalidCallback {
                    message: "id token nonce does not match the login request".to_string(),
                });
            }
        }

        self.adopt(response, generation)
    }

    /// Posts a form to the token endpoint.
    async fn request_tokens(&self, params: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let body = serde_urlencoded::to_string(params).map_err(|e| AuthError::NetworkError {
            message: format!("Failed to encode form: {e}"),
        })?;

        debug!(endpoint = %self.endpoints.token, "requesting tokens");
        let response = self
            .http
            .post(self.endpoints.token.clone())
            .header("Content-Type", FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e: reqwest::Error| AuthError::NetworkError {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TokenErrorResponse>(&error_text).map_or_else(
                |_| format!("Token request failed with {status}: {error_text}"),
                |error_response| {
                    error_response
                        .error_description
                        .unwrap_or(error_response.error)
                },
            );
            return Err(AuthError::TokenExchangeFailed { message });
        }

        response
            .json()
            .await
            .map_err(|e: reqwest::Error| AuthError::NetworkError {
                message: format!("Failed to parse token response: {e}"),
            })
    }

    /// Replaces the held tokens and reschedules the expiry timer.
    ///
    /// Fails with [`AuthError::NotAuthenticated`] if the session was logged
    /// out after `generation` was read.
    fn adopt(&self, response: TokenResponse, generation: u64) -> Result<(), AuthError> {
        let claims = decode_claims(&response.access_token)?;
        let tokens = TokenSet::new(
            response.access_token,
            response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            self.clock.now(),
        )
        .with_refresh_token(response.refresh_token)
        .with_id_token(response.id_token)
        .with_scope(response.scope.as_deref());
        let tokens = match response.expires_in {
            Some(secs) => tokens.expires_in(secs),
            None => tokens.expiring_at(claims.expires_at()),
        };
        let expires_at = tokens.expires_at;

        let mut state = self.state.write();
        if state.generation != generation {
            debug!("session ended while tokens were requested, discarding them");
            return Err(AuthError::NotAuthenticated);
        }
        state.tokens = Some(tokens);
        state.claims = Some(claims);
        // Armed under the state lock so a concurrent logout cancels it.
        self.schedule_expiry(expires_at);
        Ok(())
    }

    /// Arms the timer that fires the expiry hook.
    fn schedule_expiry(&self, expires_at: Option<DateTime<Utc>>) {
        let mut timer = self.expiry_timer.lock();
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        let Some(expires_at) = expires_at else {
            return;
        };

        let delay = (expires_at - self.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let hook = Arc::clone(&self.hook);
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let hook = hook.read().clone();
            if let Some(hook) = hook {
                debug!("access token expired");
                hook();
            }
        }));
    }

    fn cancel_expiry(&self) {
        if let Some(timer) = self.expiry_timer.lock().take() {
            timer.abort();
        }
    }
}

impl Drop for KeycloakClient {
    fn drop(&mut self) {
        if let Some(timer) = self.expiry_timer.get_mut().take() {
            timer.abort();
        }
    }
}

impl IdentityClient for KeycloakClient {
    async fn init(&self, options: &InitOptions) -> Result<InitStatus, AuthError> {
        if let Some(callback) = &options.callback {
            self.process_callback(callback).await?;
            info!(realm = %self.config.realm, "login completed");
            return Ok(InitStatus::Authenticated);
        }
        if self.authenticated() {
            return Ok(InitStatus::Authenticated);
        }

        match options.on_load {
            OnLoad::LoginRequired => {
                let login_url = self.create_login_url(options.flow)?;
                info!(realm = %self.config.realm, "login required, redirecting to identity server");
                Ok(InitStatus::LoginRequired { login_url })
            }
            OnLoad::CheckSso => Ok(InitStatus::Unauthenticated),
        }
    }

    async fn update_token(&self, min_validity: u64) -> Result<bool, AuthError> {
        let min_validity = i64::try_from(min_validity)
            .unwrap_or(i64::MAX)
            .min(MAX_MIN_VALIDITY_SECS);
        let now = self.clock.now();
        let (refresh_token, generation) = {
            let state = self.state.read();
            let tokens = state.tokens.as_ref().ok_or(AuthError::NotAuthenticated)?;
            if !tokens.is_expired_or_expiring(now, min_validity) {
                return Ok(false);
            }
            (tokens.refresh_token.clone(), state.generation)
        };
        let refresh_token = refresh_token.ok_or(AuthError::TokenExpiredNoRefresh)?;

        let response = self
            .request_tokens(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", self.config.client_id.as_str()),
            ])
            .await
            .map_err(|e| match e {
                AuthError::TokenExchangeFailed { message } => AuthError::RefreshFailed { message },
                other => other,
            })?;
        self.adopt(response, generation)?;
        Ok(true)
    }

    fn on_token_expired(&self, hook: TokenExpiredHook) {
        *self.hook.write() = Some(hook);
    }

    fn token(&self) -> Option<String> {
        self.state
            .read()
            .tokens
            .as_ref()
            .map(|t| t.access_token.clone())
    }

    fn token_parsed(&self) -> Option<TokenClaims> {
        self.state.read().claims.clone()
    }

    fn realm_access(&self) -> Option<RealmAccess> {
        self.state
            .read()
            .claims
            .as_ref()
            .and_then(|c| c.realm_access.clone())
    }

    fn resource_access(&self) -> Option<HashMap<String, ResourceAccess>> {
        self.state
            .read()
            .claims
            .as_ref()
            .and_then(|c| c.resource_access.clone())
    }

    fn authenticated(&self) -> bool {
        self.state.read().tokens.is_some()
    }

    fn has_realm_role(&self, role: &str) -> bool {
        self.state
            .read()
            .claims
            .as_ref()
            .is_some_and(|c| c.has_realm_role(role))
    }

    fn has_resource_role(&self, role: &str, resource: Option<&str>) -> bool {
        let resource = resource.unwrap_or(&self.config.client_id);
        self.state
            .read()
            .claims
            .as_ref()
            .is_some_and(|c| c.has_resource_role(role, resource))
    }

    async fn logout(&self, redirect_uri: Option<&Url>) -> Result<Url, AuthError> {
        let id_token = {
            let mut state = self.state.write();
            state.generation += 1;
            state.pending = None;
            state.claims = None;
            state.tokens.take().and_then(|t| t.id_token)
        };
        self.cancel_expiry();

        let redirect = redirect_uri
            .map(Url::as_str)
            .or(self.config.redirect_uri.as_deref());
        let mut url = self.endpoints.logout.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", self.config.client_id.as_str());
            if let Some(redirect) = redirect {
                query.append_pair("post_logout_redirect_uri", redirect);
            }
            if let Some(id_token) = &id_token {
                query.append_pair("id_token_hint", id_token);
            }
        }
        info!(realm = %self.config.realm, "logged out");
        Ok(url)
    }

    async fn load_user_info(&self) -> Result<UserInfo, AuthError> {
        let token = self.token().ok_or(AuthError::NotAuthenticated)?;

        let response = self
            .http
            .get(self.endpoints.userinfo.clone())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e: reqwest::Error| AuthError::NetworkError {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AuthError::UserInfoFailed {
                message: format!("{status}: {error_text}"),
            });
        }

        response
            .json()
            .await
            .map_err(|e: reqwest::Error| AuthError::UserInfoFailed {
                message: format!("Failed to parse user info: {e}"),
            })
    }
}

/// Creates [`KeycloakClient`]s sharing one HTTP client and clock.
#[derive(Clone)]
pub struct KeycloakClientFactory {
    http: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl KeycloakClientFactory {
    /// Creates a factory using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            clock: Arc::new(SystemClock::new()),
        }
    }

    /// Replace the clock (for tests).
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the HTTP client.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }
}

impl Default for KeycloakClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityClientFactory for KeycloakClientFactory {
    type Client = KeycloakClient;

    fn create(&self, config: AuthConfig) -> Result<KeycloakClient, AuthError> {
        KeycloakClient::new(config, self.http.clone(), Arc::clone(&self.clock))
    }
}

/// Random URL-safe value for `state` and `nonce`.
fn random_token() -> String {
    let mut bytes = [0u8; 24];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::keycloak::jwt::tests::token_with;
    use axum::extract::{Form, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

    const REALM_PATH: &str = "/realms/TMT/protocol/openid-connect";

    #[derive(Default)]
    struct FakeKeycloak {
        nonce: Mutex<Option<String>>,
        refresh_fails: AtomicBool,
        refresh_delay_ms: AtomicU64,
        token_requests: Mutex<Vec<HashMap<String, String>>>,
        issued: AtomicUsize,
    }

    impl FakeKeycloak {
        fn access_token(&self) -> String {
            let n = self.issued.fetch_add(1, Ordering::SeqCst);
            token_with(&serde_json::json!({
                "sub": "user-1",
                "jti": format!("token-{n}"),
                "exp": Utc::now().timestamp() + 300,
                "preferred_username": "jdoe",
                "realm_access": { "roles": ["esw-user"] },
                "resource_access": { "tmt-frontend-app": { "roles": ["config-admin"] } }
            }))
        }

        fn id_token(&self) -> String {
            token_with(&serde_json::json!({
                "sub": "user-1",
                "nonce": self.nonce.lock().clone(),
            }))
        }
    }

    async fn token_endpoint(
        State(fake): State<Arc<FakeKeycloak>>,
        Form(form): Form<HashMap<String, String>>,
    ) -> Response {
        fake.token_requests.lock().push(form.clone());
        let grant = form.get("grant_type").cloned().unwrap_or_default();
        if grant == "refresh_token" {
            let delay = fake.refresh_delay_ms.load(Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if grant == "refresh_token" && fake.refresh_fails.load(Ordering::SeqCst) {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": "invalid_grant",
                    "error_description": "Session not active"
                })),
            )
                .into_response();
        }
        if grant == "authorization_code" && form.get("code").map(String::as_str) != Some("c0de") {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "invalid_grant" })),
            )
                .into_response();
        }
        Json(serde_json::json!({
            "access_token": fake.access_token(),
            "token_type": "Bearer",
            "expires_in": 300,
            "refresh_token": "refresh-1",
            "id_token": fake.id_token(),
            "scope": "openid profile"
        }))
        .into_response()
    }

    async fn userinfo_endpoint(headers: HeaderMap) -> Response {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("Bearer "));
        if !authorized {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        Json(serde_json::json!({
            "sub": "user-1",
            "preferred_username": "jdoe",
            "email": "jdoe@example.com"
        }))
        .into_response()
    }

    async fn start_server(fake: Arc<FakeKeycloak>) -> String {
        let app = Router::new()
            .route(&format!("{REALM_PATH}/token"), post(token_endpoint))
            .route(&format!("{REALM_PATH}/userinfo"), get(userinfo_endpoint))
            .with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    struct FixedClock(Mutex<DateTime<Utc>>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock()
        }
    }

    fn config(url: &str) -> AuthConfig {
        AuthConfig {
            url: url.to_string(),
            realm: "TMT".to_string(),
            client_id: "tmt-frontend-app".to_string(),
            redirect_uri: Some("http://localhost:3000/callback".to_string()),
            extra: BTreeMap::new(),
        }
    }

    fn client(url: &str) -> KeycloakClient {
        KeycloakClientFactory::new().create(config(url)).unwrap()
    }

    fn query_param(url: &Url, name: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// Runs a login through the callback and returns the client.
    async fn logged_in(fake: &Arc<FakeKeycloak>, url: &str, clock: Arc<dyn Clock>) -> KeycloakClient {
        let client = KeycloakClientFactory::new()
            .with_clock(clock)
            .create(config(url))
            .unwrap();
        let InitStatus::LoginRequired { login_url } = client
            .init(&InitOptions::login_required_hybrid())
            .await
            .unwrap()
        else {
            panic!("expected login redirect");
        };
        let state = query_param(&login_url, "state").unwrap();
        *fake.nonce.lock() = query_param(&login_url, "nonce");

        let callback = Url::parse(&format!(
            "http://localhost:3000/callback#state={state}&code=c0de&session_state=s1"
        ))
        .unwrap();
        let status = client
            .init(&InitOptions::login_required_hybrid().with_callback(callback))
            .await
            .unwrap();
        assert_eq!(status, InitStatus::Authenticated);
        client
    }

    #[tokio::test]
    async fn test_login_url_parameters() {
        let client = client("http://localhost:8081");

        let status = client
            .init(&InitOptions::login_required_hybrid())
            .await
            .unwrap();

        let InitStatus::LoginRequired { login_url } = status else {
            panic!("expected login redirect");
        };
        assert!(login_url.as_str().starts_with(
            "http://localhost:8081/realms/TMT/protocol/openid-connect/auth?"
        ));
        assert_eq!(
            query_param(&login_url, "response_type").as_deref(),
            Some("code id_token token")
        );
        assert_eq!(
            query_param(&login_url, "client_id").as_deref(),
            Some("tmt-frontend-app")
        );
        assert_eq!(
            query_param(&login_url, "response_mode").as_deref(),
            Some("fragment")
        );
        assert!(query_param(&login_url, "state").is_some());
        assert!(query_param(&login_url, "nonce").is_some());
        assert!(!client.authenticated());
    }

    #[tokio::test]
    async fn test_login_requires_redirect_uri() {
        let mut config = config("http://localhost:8081");
        config.redirect_uri = None;
        let client = KeycloakClientFactory::new().create(config).unwrap();

        let err = client
            .init(&InitOptions::login_required_hybrid())
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidConfiguration { .. }));
    }

    #[tokio::test]
    async fn test_check_sso_without_session() {
        let client = client("http://localhost:8081");
        let options = InitOptions {
            on_load: OnLoad::CheckSso,
            ..InitOptions::default()
        };

        assert_eq!(
            client.init(&options).await.unwrap(),
            InitStatus::Unauthenticated
        );
    }

    #[test]
    fn test_factory_rejects_invalid_url() {
        let err = KeycloakClientFactory::new()
            .create(config("::not a url::"))
            .unwrap_err();
        assert!(matches!(err, AuthError::Domain(_)));
    }

    #[tokio::test]
    async fn test_hybrid_callback_exchanges_code() {
        let fake = Arc::new(FakeKeycloak::default());
        let url = start_server(Arc::clone(&fake)).await;

        let client = logged_in(&fake, &url, Arc::new(SystemClock::new())).await;

        assert!(client.authenticated());
        assert!(client.token().is_some());
        assert_eq!(
            client.token_parsed().unwrap().preferred_username.as_deref(),
            Some("jdoe")
        );
        assert!(client.has_realm_role("esw-user"));
        assert!(client.has_resource_role("config-admin", None));
        assert!(!client.has_resource_role("config-admin", Some("other-app")));
        assert_eq!(client.tokens().unwrap().refresh_token.as_deref(), Some("refresh-1"));

        let requests = fake.token_requests.lock().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].get("grant_type").map(String::as_str),
            Some("authorization_code")
        );
        assert_eq!(
            requests[0].get("redirect_uri").map(String::as_str),
            Some("http://localhost:3000/callback")
        );
    }

    #[tokio::test]
    async fn test_callback_with_wrong_state_is_rejected() {
        let client = client("http://localhost:8081");
        let _ = client.init(&InitOptions::login_required_hybrid()).await.unwrap();

        let callback = Url::parse("http://localhost:3000/callback#state=forged&code=c0de").unwrap();
        let err = client
            .init(&InitOptions::login_required_hybrid().with_callback(callback))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidCallback { .. }));
        assert!(!client.authenticated());
    }

    #[tokio::test]
    async fn test_callback_without_login_is_rejected() {
        let client = client("http://localhost:8081");
        let callback = Url::parse("http://localhost:3000/callback#state=abc&code=c0de").unwrap();

        let err = client
            .init(&InitOptions::login_required_hybrid().with_callback(callback))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidCallback { .. }));
    }

    #[tokio::test]
    async fn test_callback_error_is_reported() {
        let client = client("http://localhost:8081");
        let callback =
            Url::parse("http://localhost:3000/callback#error=access_denied&state=abc").unwrap();

        let err = client
            .init(&InitOptions::login_required_hybrid().with_callback(callback))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AuthError::InvalidCallback {
                message: "access_denied".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_implicit_callback_has_no_refresh_token() {
        let client = client("http://localhost:8081");
        let options = InitOptions {
            flow: Flow::Implicit,
            ..InitOptions::default()
        };
        let InitStatus::LoginRequired { login_url } = client.init(&options).await.unwrap() else {
            panic!("expected login redirect");
        };
        let state = query_param(&login_url, "state").unwrap();
        let nonce = query_param(&login_url, "nonce").unwrap();
        let access_token = token_with(&serde_json::json!({ "sub": "user-1", "exp": 1 }));
        let id_token = token_with(&serde_json::json!({ "sub": "user-1", "nonce": nonce }));
        let callback = Url::parse(&format!(
            "http://localhost:3000/callback#state={state}&access_token={access_token}&id_token={id_token}&token_type=Bearer"
        ))
        .unwrap();

        client
            .init(&options.clone().with_callback(callback))
            .await
            .unwrap();

        assert!(client.authenticated());
        assert_eq!(
            client.update_token(0).await.unwrap_err(),
            AuthError::TokenExpiredNoRefresh
        );
    }

    #[tokio::test]
    async fn test_update_token_skips_valid_token() {
        let fake = Arc::new(FakeKeycloak::default());
        let url = start_server(Arc::clone(&fake)).await;
        let client = logged_in(&fake, &url, Arc::new(SystemClock::new())).await;

        assert!(!client.update_token(0).await.unwrap());
        assert_eq!(fake.token_requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_update_token_refreshes_expired_token() {
        let fake = Arc::new(FakeKeycloak::default());
        let url = start_server(Arc::clone(&fake)).await;
        let clock = Arc::new(FixedClock(Mutex::new(Utc::now())));
        let client = logged_in(&fake, &url, clock.clone()).await;
        let before = client.token();

        *clock.0.lock() += chrono::Duration::seconds(600);
        assert!(client.update_token(0).await.unwrap());

        assert_ne!(client.token(), before);
        let requests = fake.token_requests.lock().clone();
        assert_eq!(
            requests[1].get("grant_type").map(String::as_str),
            Some("refresh_token")
        );
        assert_eq!(
            requests[1].get("refresh_token").map(String::as_str),
            Some("refresh-1")
        );
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_tokens() {
        let fake = Arc::new(FakeKeycloak::default());
        let url = start_server(Arc::clone(&fake)).await;
        let clock = Arc::new(FixedClock(Mutex::new(Utc::now())));
        let client = logged_in(&fake, &url, clock.clone()).await;
        let before = client.token();
        fake.refresh_fails.store(true, Ordering::SeqCst);

        *clock.0.lock() += chrono::Duration::seconds(600);
        let err = client.update_token(0).await.unwrap_err();

        assert_eq!(
            err,
            AuthError::RefreshFailed {
                message: "Session not active".to_string()
            }
        );
        assert_eq!(client.token(), before);
        assert!(client.authenticated());
    }

    #[tokio::test]
    async fn test_logout_during_refresh_stays_logged_out() {
        let fake = Arc::new(FakeKeycloak::default());
        let url = start_server(Arc::clone(&fake)).await;
        let clock = Arc::new(FixedClock(Mutex::new(Utc::now())));
        let client = Arc::new(logged_in(&fake, &url, clock.clone()).await);
        fake.refresh_delay_ms.store(300, Ordering::SeqCst);
        *clock.0.lock() += chrono::Duration::seconds(600);

        let refreshing = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.update_token(0).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.logout(None).await.unwrap();
        assert!(!client.authenticated());

        let result = refreshing.await.unwrap();

        assert_eq!(result, Err(AuthError::NotAuthenticated));
        assert!(!client.authenticated());
        assert!(client.token_parsed().is_none());
        assert!(client.expiry_timer.lock().is_none());
        assert_eq!(fake.token_requests.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_callback_after_logout_is_rejected() {
        let client = client("http://localhost:8081");
        let InitStatus::LoginRequired { login_url } = client
            .init(&InitOptions::login_required_hybrid())
            .await
            .unwrap()
        else {
            panic!("expected login redirect");
        };
        let state = query_param(&login_url, "state").unwrap();
        client.logout(None).await.unwrap();

        let callback =
            Url::parse(&format!("http://localhost:3000/callback#state={state}&code=c0de")).unwrap();
        let err = client
            .init(&InitOptions::login_required_hybrid().with_callback(callback))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidCallback { .. }));
    }

    #[tokio::test]
    async fn test_adopt_saturates_huge_lifetime() {
        let client = client("http://localhost:8081");

        for expires_in in [10_000_000_000_000, u64::MAX] {
            let response = TokenResponse {
                access_token: token_with(&serde_json::json!({ "sub": "user-1" })),
                token_type: None,
                expires_in: Some(expires_in),
                refresh_token: Some("refresh-1".to_string()),
                id_token: None,
                scope: None,
            };
            client.adopt(response, 0).unwrap();

            assert!(client.authenticated());
            assert_eq!(
                client.tokens().unwrap().expires_at,
                Some(DateTime::<Utc>::MAX_UTC)
            );
            assert!(!client.update_token(0).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_update_token_without_session() {
        let client = client("http://localhost:8081");
        assert_eq!(
            client.update_token(0).await.unwrap_err(),
            AuthError::NotAuthenticated
        );
    }

    #[tokio::test]
    async fn test_expiry_fires_hook() {
        let fake = Arc::new(FakeKeycloak::default());
        let url = start_server(Arc::clone(&fake)).await;
        let clock = Arc::new(FixedClock(Mutex::new(Utc::now() + chrono::Duration::seconds(600))));
        let client = KeycloakClientFactory::new()
            .with_clock(clock)
            .create(config(&url))
            .unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let tx = Mutex::new(Some(tx));
        client.on_token_expired(Arc::new(move || {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(());
            }
        }));

        // Expiry comes from the `exp` claim, already behind the clock.
        let response = TokenResponse {
            access_token: fake.access_token(),
            token_type: None,
            expires_in: None,
            refresh_token: None,
            id_token: None,
            scope: None,
        };
        client.adopt(response, 0).unwrap();

        tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("hook fired")
            .unwrap();
    }

    #[tokio::test]
    async fn test_logout_clears_tokens() {
        let fake = Arc::new(FakeKeycloak::default());
        let url = start_server(Arc::clone(&fake)).await;
        let client = logged_in(&fake, &url, Arc::new(SystemClock::new())).await;
        let redirect = Url::parse("http://localhost:3000/").unwrap();

        let logout_url = client.logout(Some(&redirect)).await.unwrap();

        assert!(logout_url.path().ends_with("/openid-connect/logout"));
        assert_eq!(
            query_param(&logout_url, "post_logout_redirect_uri").as_deref(),
            Some("http://localhost:3000/")
        );
        assert!(query_param(&logout_url, "id_token_hint").is_some());
        assert!(!client.authenticated());
        assert!(client.token_parsed().is_none());
    }

    #[tokio::test]
    async fn test_load_user_info() {
        let fake = Arc::new(FakeKeycloak::default());
        let url = start_server(Arc::clone(&fake)).await;
        let client = logged_in(&fake, &url, Arc::new(SystemClock::new())).await;

        let info = client.load_user_info().await.unwrap();

        assert_eq!(info.sub, "user-1");
        assert_eq!(info.email.as_deref(), Some("jdoe@example.com"));
    }

    #[tokio::test]
    async fn test_load_user_info_requires_token() {
        let client = client("http://localhost:8081");
        assert_eq!(
            client.load_user_info().await.unwrap_err(),
            AuthError::NotAuthenticated
        );
    }
}
