//! AAS login - Main Entry Point
//!
//! Resolves the AAS server, walks the user through a browser login and
//! keeps the session's token fresh until interrupted.

mod settings;

use std::path::Path;
use std::sync::Arc;

use aas_application::ports::{AasResolver, IdentityClient};
use aas_application::{AuthEvent, AuthSession};
use aas_domain::{InitOptions, InitStatus, PartialAuthConfig};
use aas_infrastructure::{KeycloakClientFactory, StaticResolver};
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use settings::{DEFAULT_SETTINGS_FILE, Settings};

type Session<R> = AuthSession<KeycloakClientFactory, R>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load(Path::new(DEFAULT_SETTINGS_FILE))?;
    let factory = KeycloakClientFactory::new();

    match settings.location_resolver()? {
        Some(resolver) => run(AuthSession::new(settings.static_config(), factory, resolver)).await,
        None => {
            let resolver = StaticResolver::default();
            run(AuthSession::new(settings.static_config(), factory, resolver)).await
        }
    }
}

async fn run<R: AasResolver>(mut session: Session<R>) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = session.subscribe();

    let url = session.aas_url().await;
    tracing::info!(%url, "using AAS server");
    let auth = session.authenticate(PartialAuthConfig::default(), PartialAuthConfig::with_url(url))?;
    let client = Arc::clone(&auth.client);

    match auth.initialized.await? {
        InitStatus::Authenticated => {}
        InitStatus::LoginRequired { login_url } => {
            println!("Open this URL in a browser to log in:\n\n  {login_url}\n");
            println!("Then paste the URL the browser was redirected to:");
            let callback = Url::parse(read_line().await?.trim())?;
            client
                .init(&InitOptions::login_required_hybrid().with_callback(callback))
                .await?;
        }
        InitStatus::Unauthenticated => {
            println!("No session.");
            return Ok(());
        }
    }

    session.from(&client);
    report(&session);
    println!("Keeping the session alive, press Ctrl-C to log out.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(AuthEvent::TokenRefreshed { .. }) => {
                    session.from(&client);
                    report(&session);
                }
                Ok(AuthEvent::RefreshFailed { error }) => {
                    println!("Session expired: {error}");
                    break;
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }

    let logout_url = session.logout(None).await?;
    println!("Visit this URL to end the browser session:\n\n  {logout_url}");
    Ok(())
}

fn report<R: AasResolver>(session: &Session<R>) {
    let user = session
        .snapshot()
        .username()
        .unwrap_or("<unknown user>")
        .to_string();
    let roles = session
        .realm_access()
        .map(|access| access.roles.join(", "))
        .unwrap_or_default();
    let status = session.token_status(Utc::now());
    if status.needs_attention() {
        tracing::warn!(status = %status.display_message(), "access token needs a refresh");
    }
    println!("{user}: {} [realm roles: {roles}]", status.display_message());
}

async fn read_line() -> std::io::Result<String> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line)
}
