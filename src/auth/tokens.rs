//! Token storage and session claims

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Stored access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    pub expires_at: Option<u64>,
}

impl StoredToken {
    pub fn new(token: String, expires_in_secs: Option<u64>) -> Self {
        let expires_at = expires_in_secs.map(|secs| now_secs() + secs);

        Self { token, expires_at }
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            // Consider expired if less than a minute remaining
            Some(exp) => now_secs() + 60 >= exp,
            None => false,
        }
    }
}

/// Token store trait for different storage backends
pub trait TokenStore {
    fn get_access_token(&self) -> Option<StoredToken>;
    fn set_access_token(&mut self, token: String, expires_in: Option<u64>);
    fn get_refresh_token(&self) -> Option<String>;
    fn set_refresh_token(&mut self, token: String);
    fn clear_tokens(&mut self);
}

/// The subset of GoTrue JWT claims the client reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
}

/// Decode (without verifying) the payload segment of a JWT.
///
/// Verification is the server's job; the client only needs the user id.
pub fn decode_claims(jwt: &str) -> Result<Claims> {
    let payload = jwt
        .split('.')
        .nth(1)
        .context("Access token is not a JWT")?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .context("Access token payload is not base64url")?;
    serde_json::from_slice(&bytes).context("Access token payload is not valid claims JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_with(payload: &serde_json::Value) -> String {
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", body)
    }

    #[test]
    fn test_decode_claims() {
        let id = Uuid::new_v4();
        let jwt = jwt_with(&serde_json::json!({
            "sub": id.to_string(),
            "exp": 1_700_000_000u64,
            "email": "a@b.c",
            "role": "authenticated"
        }));
        let claims = decode_claims(&jwt).unwrap();
        assert_eq!(claims.sub, id);
    }

    #[test]
    fn test_decode_claims_rejects_garbage() {
        assert!(decode_claims("not-a-jwt").is_err());
        assert!(decode_claims("a.!!!.c").is_err());
    }

    #[test]
    fn test_token_expiry() {
        assert!(!StoredToken::new("t".into(), None).is_expired());
        assert!(!StoredToken::new("t".into(), Some(3600)).is_expired());
        assert!(StoredToken::new("t".into(), Some(30)).is_expired());
    }
}
