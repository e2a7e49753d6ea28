//! GitHub sign-in through GoTrue's PKCE flow, plus refresh-token renewal

use anyhow::{bail, Context, Result};
use oauth2::PkceCodeChallenge;
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use super::callback;
use super::{decode_claims, AuthConfig, TokenStore};
use crate::config::Config;

/// Session payload returned by `/auth/v1/token`.
#[derive(Debug, Deserialize)]
pub struct GoTrueSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub user: Option<GoTrueUser>,
}

/// The `user` object inside a GoTrue session.
#[derive(Debug, Clone, Deserialize)]
pub struct GoTrueUser {
    pub id: Uuid,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

/// Build the provider authorize URL carrying the PKCE challenge.
fn authorize_url(base: &str, auth_config: &AuthConfig, challenge: &str) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/auth/v1/authorize", base))
        .context("Invalid Supabase URL")?;
    url.query_pairs_mut()
        .append_pair("provider", auth_config.provider)
        .append_pair("redirect_to", &auth_config.redirect_uri())
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", "s256");
    Ok(url)
}

/// POST a grant to the token endpoint.
async fn token_request(
    config: &Config,
    grant_type: &str,
    body: serde_json::Value,
) -> Result<GoTrueSession> {
    let base = config.supabase_url()?;
    let url = format!("{}/auth/v1/token?grant_type={}", base, grant_type);
    tracing::debug!("Token POST {}", url);

    let resp = reqwest::Client::new()
        .post(&url)
        .header("apikey", config.anon_key()?)
        .json(&body)
        .send()
        .await
        .with_context(|| format!("Token request ({}) failed", grant_type))?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        bail!("Token request ({}) failed (HTTP {}): {}", grant_type, status.as_u16(), text);
    }

    resp.json()
        .await
        .context("Failed to parse token response")
}

/// Persist a freshly issued session. Returns the session user id.
fn store_session(config: &mut Config, session: &GoTrueSession) -> Result<Uuid> {
    let user_id = match session.user.as_ref() {
        Some(user) => user.id,
        None => decode_claims(&session.access_token)?.sub,
    };
    config.set_session(session.access_token.clone(), session.expires_in, user_id);
    if let Some(ref rt) = session.refresh_token {
        config.set_refresh_token(rt.clone());
    }
    Ok(user_id)
}

/// Renew the access token with the stored refresh token.
/// Returns Ok(false) if there is no refresh token to use.
pub async fn refresh() -> Result<bool> {
    let mut config = Config::load()?;
    let refresh_token = match config.get_refresh_token() {
        Some(rt) => rt,
        None => return Ok(false),
    };

    tracing::info!("Refreshing session...");
    let session = token_request(
        &config,
        "refresh_token",
        serde_json::json!({ "refresh_token": refresh_token }),
    )
    .await
    .context("Failed to refresh session")?;

    store_session(&mut config, &session)?;
    config.save()?;
    tracing::info!("Session refreshed");
    Ok(true)
}

/// Sign in with GitHub in the browser.
pub async fn login(force: bool) -> Result<()> {
    let mut config = Config::load()?;

    if !force {
        if let Some(token) = config.get_access_token() {
            if !token.is_expired() {
                println!("Already signed in. Use --force to re-authenticate.");
                return Ok(());
            }
            if config.get_refresh_token().is_some() {
                tracing::info!("Session expired, attempting refresh...");
                match refresh().await {
                    Ok(true) => {
                        println!("Session refreshed.");
                        return Ok(());
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!("Refresh failed, falling back to browser sign-in: {:#}", e);
                    }
                }
            }
        }
    }

    let base = config.supabase_url()?;
    let auth_config = AuthConfig::github(config.redirect_port());
    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let url = authorize_url(&base, &auth_config, challenge.as_str())?;

    let listener = callback::bind(auth_config.redirect_port).await?;

    println!();
    println!("To sign in with GitHub, open:");
    println!("  {}", url);
    println!();
    tracing::info!("Waiting for the browser redirect...");

    let code = callback::wait_for_code(listener).await?;
    let session = token_request(
        &config,
        "pkce",
        serde_json::json!({ "auth_code": code, "code_verifier": verifier.secret() }),
    )
    .await
    .context("Failed to exchange authorization code")?;

    let user_id = store_session(&mut config, &session)?;
    config.save()?;

    // Profile + default channel. Failures here do not undo the sign-in.
    let user = session.user.clone().unwrap_or(GoTrueUser {
        id: user_id,
        email: None,
        user_metadata: serde_json::Value::Null,
    });
    match crate::api::bootstrap(&user).await {
        Ok(workspace) => {
            config.workspace_id = Some(workspace);
            config.save()?;
        }
        Err(e) => {
            tracing::warn!("Profile setup failed: {:#}", e);
            eprintln!("Warning: could not set up your profile or #general membership.");
        }
    }

    println!("Signed in as {}.", user.email.as_deref().unwrap_or("(no email)"));
    Ok(())
}

/// Clear stored credentials
pub async fn logout() -> Result<()> {
    let mut config = Config::load()?;
    config.clear_tokens();
    config.save()?;
    println!("Signed out.");
    Ok(())
}

/// Display current auth status
pub async fn status() -> Result<()> {
    let config = Config::load()?;

    match config.supabase_url() {
        Ok(url) => println!("Project:     {}", url),
        Err(_) => println!("Project:     (not configured)"),
    }

    match config.get_access_token() {
        Some(token) if !token.is_expired() => {
            println!("Session:     valid");
            if let Some(exp) = token.expires_at {
                println!("  expires_at: {}", exp);
            }
        }
        Some(_) => println!("Session:     expired"),
        None => println!("Session:     none"),
    }

    match config.get_refresh_token() {
        Some(_) => println!("Refresh tok: present"),
        None => println!("Refresh tok: none"),
    }

    match config.user_id {
        Some(id) => println!("User ID:     {}", id),
        None => println!("User ID:     none"),
    }
    println!("Workspace:   {}", config.workspace());
    println!("Poll every:  {}s", config.poll_interval().as_secs());

    if config.get_access_token().is_none() {
        println!("\nRun 'slack-sync login' to sign in.");
    }

    Ok(())
}
