use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::Query;
use axum::response::Html;
use axum::routing::get;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use color_eyre::Result;
use color_eyre::eyre::Context;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::StoredToken;
use crate::soundcloud::types::TokenResponse;

const AUTHORIZATION_URL: &str = "https://secure.soundcloud.com/authorize";
const TOKEN_URL: &str = "https://secure.soundcloud.com/oauth/token";

// Local one-shot listener for the OAuth redirect.
const REDIRECT_PORT: u16 = 8080;
const REDIRECT_URI: &str = "http://127.0.0.1:8080/";

/// Generate a cryptographically secure random string for PKCE
fn generate_random_string(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            const CHARSET: &[u8] =
                b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
            CHARSET[rng.random_range(0..CHARSET.len())] as char
        })
        .collect()
}

/// Generate PKCE code verifier (43-128 characters)
fn generate_code_verifier() -> String {
    generate_random_string(128)
}

/// Generate PKCE code challenge from verifier using S256 method
fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let hash = hasher.finalize();
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate a random state parameter for CSRF protection
fn generate_state() -> String {
    generate_random_string(16)
}

fn authorization_url(client_id: &str, code_challenge: &str, state: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&code_challenge={}&code_challenge_method=S256&state={}",
        AUTHORIZATION_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(REDIRECT_URI),
        urlencoding::encode(code_challenge),
        urlencoding::encode(state)
    )
}

fn basic_auth_header(client_id: &str, client_secret: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", client_id, client_secret))
    )
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("failed to bind the local callback listener on port {REDIRECT_PORT}: {0}")]
    Bind(std::io::Error),
    #[error("authorization was denied: {reason}")]
    Denied { reason: String },
    #[error("callback did not include an authorization code")]
    MissingCode,
    #[error("state parameter in the callback did not match")]
    StateMismatch,
    #[error(transparent)]
    Exchange(#[from] ExchangeCodeForTokenError),
}

/// Serves a single request on 127.0.0.1 and hands back the callback query.
async fn wait_for_callback() -> Result<CallbackQuery, LoginError> {
    let (sender, receiver) = tokio::sync::oneshot::channel::<CallbackQuery>();
    let sender = Arc::new(Mutex::new(Some(sender)));

    let app = Router::new().route(
        "/",
        get(move |Query(query): Query<CallbackQuery>| {
            let sender = sender.clone();
            async move {
                if let Ok(mut slot) = sender.lock() {
                    if let Some(sender) = slot.take() {
                        let _ = sender.send(query);
                    }
                }
                Html("<h1>Authentication successful!</h1><p>You can close this window.</p>")
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", REDIRECT_PORT))
        .await
        .map_err(LoginError::Bind)?;
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    // The sender is dropped only if the server task dies before a request.
    let query = receiver.await.map_err(|_| LoginError::MissingCode)?;
    server.abort();
    Ok(query)
}

/// Guides the user through the OAuth2 authorization-code flow with PKCE.
///
/// Prints the authorization URL, waits for the redirect on a local one-shot
/// listener, and exchanges the received code for a token.
pub async fn login(client_id: &str, client_secret: &str) -> Result<TokenResponse, LoginError> {
    let code_verifier = generate_code_verifier();
    let code_challenge = generate_code_challenge(&code_verifier);
    let state = generate_state();

    let url = authorization_url(client_id, &code_challenge, &state);
    log::info!("Waiting for the OAuth redirect on {REDIRECT_URI}");
    println!("Open this URL in your browser to authorize:\n\n{url}\n");

    let query = wait_for_callback().await?;
    if let Some(reason) = query.error {
        return Err(LoginError::Denied { reason });
    }
    if query.state.as_deref() != Some(state.as_str()) {
        return Err(LoginError::StateMismatch);
    }
    let code = query.code.ok_or(LoginError::MissingCode)?;

    Ok(exchange_code_for_token(client_id, client_secret, &code, &code_verifier).await?)
}

#[derive(Debug, thiserror::Error)]
pub enum ExchangeCodeForTokenError {
    #[error("Invalid code: {reason}")]
    InvalidCode { reason: String },
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(reqwest::Error),
}

/// Exchange an authorization code for an access token
pub async fn exchange_code_for_token(
    client_id: &str,
    client_secret: &str,
    code: &str,
    code_verifier: &str,
) -> Result<TokenResponse, ExchangeCodeForTokenError> {
    let client = reqwest::Client::new();

    let mut params = HashMap::new();
    params.insert("grant_type", "authorization_code");
    params.insert("code", code);
    params.insert("redirect_uri", REDIRECT_URI);
    params.insert("code_verifier", code_verifier);

    let response = client
        .post(TOKEN_URL)
        .form(&params)
        .header(
            "Authorization",
            basic_auth_header(client_id, client_secret),
        )
        .send()
        .await
        .map_err(ExchangeCodeForTokenError::FailedToSendRequest)?;

    if !response.status().is_success() {
        return Err(ExchangeCodeForTokenError::InvalidCode {
            reason: response
                .text()
                .await
                .unwrap_or("Failed to get error text".to_string()),
        });
    }

    response
        .json()
        .await
        .map_err(ExchangeCodeForTokenError::FailedToParseResponse)
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshTokenError {
    #[error("Invalid refresh token: {reason}")]
    InvalidRefreshToken { reason: String },
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(reqwest::Error),
}

/// Refresh an access token using a refresh token
pub async fn refresh_access_token(
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<TokenResponse, RefreshTokenError> {
    let client = reqwest::Client::new();

    let mut params = HashMap::new();
    params.insert("grant_type", "refresh_token");
    params.insert("refresh_token", refresh_token);
    // SoundCloud requires the original redirect_uri on refresh requests.
    params.insert("redirect_uri", REDIRECT_URI);

    let response = client
        .post(TOKEN_URL)
        .form(&params)
        .header(
            "Authorization",
            basic_auth_header(client_id, client_secret),
        )
        .send()
        .await
        .map_err(RefreshTokenError::FailedToSendRequest)?;

    if !response.status().is_success() {
        return Err(RefreshTokenError::InvalidRefreshToken {
            reason: response
                .text()
                .await
                .unwrap_or("Failed to get error text".to_string()),
        });
    }

    response
        .json()
        .await
        .map_err(RefreshTokenError::FailedToParseResponse)
}

pub fn store_token(response: &TokenResponse, now: DateTime<Utc>) -> StoredToken {
    StoredToken {
        access_token: response.access_token.clone(),
        refresh_token: response.refresh_token.clone(),
        expires_at: now.timestamp() + response.expires_in as i64,
        scope: response.scope.clone(),
    }
}

/// Returns a non-expired token, refreshing and persisting through the
/// injected `save` function when needed.
pub async fn ensure_fresh_token(
    client_id: &str,
    client_secret: &str,
    token: StoredToken,
    save: impl FnOnce(&StoredToken) -> Result<()>,
) -> Result<StoredToken> {
    if !token.is_expired(Utc::now()) {
        return Ok(token);
    }

    log::info!("Access token expired, refreshing");
    let response = refresh_access_token(client_id, client_secret, &token.refresh_token)
        .await
        .wrap_err("Failed to refresh the access token")?;
    let refreshed = store_token(&response, Utc::now());
    save(&refreshed).wrap_err("Failed to persist the refreshed token")?;
    Ok(refreshed)
}
