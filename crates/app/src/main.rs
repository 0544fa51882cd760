//! Warden session shell
//!
//! A thin CLI around the auth facade: check the session, produce the login
//! redirect, complete the callback, inspect the profile, and exercise a
//! protected API endpoint through the credential-injecting client.

mod config;

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use warden_application::{AuthHttpClient, AuthService};
use warden_infrastructure::{ProviderDeps, ReqwestTransport, build_auth_service};

use crate::config::AppConfig;

const USAGE: &str = "\
usage: warden <command>

commands:
  status            initialize and print the session state
  login             print the authorization redirect to follow
  callback <code>   complete the login with the provider's callback code
  profile           load and print the user profile
  fetch [url]       call a protected endpoint (defaults to WARDEN_API_URL)
  logout            end the session
";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let api_url = config.api_url.clone();
    let service = Arc::new(build_auth_service(
        config.provider,
        ProviderDeps::production("warden"),
    )?);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("status") | None => status(&service).await,
        Some("login") => login(&service).await,
        Some("callback") => callback(&service, args.get(1).map(String::as_str)).await,
        Some("profile") => profile(&service).await,
        Some("fetch") => fetch(&service, args.get(1).cloned().or(api_url)).await,
        Some("logout") => logout(&service).await,
        Some(other) => {
            eprintln!("unknown command: {other}\n{USAGE}");
            std::process::exit(2);
        }
    }
}

/// Initializes without failing the process: an unreachable provider still
/// leaves a usable (unauthenticated) session behind.
async fn initialize_quietly(service: &AuthService) {
    if let Err(error) = service.initialize().await {
        tracing::warn!(%error, "initialization failed");
    }
}

async fn status(service: &AuthService) -> Result<(), Box<dyn std::error::Error>> {
    initialize_quietly(service).await;

    let snapshot = service.snapshot();
    println!("authenticated: {}", snapshot.is_authenticated);
    if let Some(expiration) = snapshot.token_expiration {
        println!("token expires at (epoch ms): {expiration}");
        println!("token expired: {}", service.token_expired());
    }
    if let Some(error) = snapshot.auth_error {
        println!("last error: {error}");
    }
    Ok(())
}

async fn login(service: &AuthService) -> Result<(), Box<dyn std::error::Error>> {
    initialize_quietly(service).await;

    if service.snapshot().is_authenticated {
        println!("already authenticated");
        return Ok(());
    }

    let redirect = service.login(None).await?;
    println!("open the following URL and authorize:");
    println!("{}", redirect.url);
    println!("then run: warden callback <code>");
    Ok(())
}

async fn callback(
    service: &AuthService,
    code: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(code) = code else {
        eprintln!("callback requires the authorization code\n{USAGE}");
        std::process::exit(2);
    };

    initialize_quietly(service).await;
    let authenticated = service.complete_login(code).await?;
    println!("authenticated: {authenticated}");
    Ok(())
}

async fn profile(service: &AuthService) -> Result<(), Box<dyn std::error::Error>> {
    initialize_quietly(service).await;

    let profile = service.load_user_profile().await?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

async fn fetch(
    service: &Arc<AuthService>,
    url: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(url) = url else {
        eprintln!("fetch requires a URL (argument or WARDEN_API_URL)\n{USAGE}");
        std::process::exit(2);
    };

    initialize_quietly(service).await;
    let refresh = service.setup_token_refresh();

    let client = AuthHttpClient::new(ReqwestTransport::new()?, Arc::clone(service));
    let result = client.get(url).await;
    refresh.cancel();

    let response = result?;
    println!("status: {}", response.status);
    println!("{}", response.body);
    Ok(())
}

async fn logout(service: &AuthService) -> Result<(), Box<dyn std::error::Error>> {
    initialize_quietly(service).await;
    service.logout().await?;
    println!("session ended");
    Ok(())
}
