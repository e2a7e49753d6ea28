//! Authentication against Supabase GoTrue
//!
//! Implements the OAuth2 PKCE flow through the GitHub provider with a
//! loopback redirect, plus refresh-token renewal.

mod callback;
pub mod oauth;
pub mod tokens;

pub use oauth::{login, logout, status};
pub use tokens::{decode_claims, StoredToken, TokenStore};

/// OAuth settings for the GoTrue authorize endpoint
pub struct AuthConfig {
    /// Identity provider configured in the Supabase project
    pub provider: &'static str,
    /// Loopback port the browser is redirected to
    pub redirect_port: u16,
}

impl AuthConfig {
    pub fn github(redirect_port: u16) -> Self {
        Self {
            provider: "github",
            redirect_port,
        }
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.redirect_port)
    }
}
