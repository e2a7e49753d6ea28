//! Configuration and credential storage

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{StoredToken, TokenStore};
use crate::models::RecordId;
use crate::sync::DEFAULT_POLL_INTERVAL;

/// Loopback port the OAuth redirect lands on unless configured otherwise.
pub const DEFAULT_REDIRECT_PORT: u16 = 54321;

const ENV_URL: &str = "SUPABASE_URL";
const ENV_ANON_KEY: &str = "SUPABASE_ANON_KEY";
const ENV_POLL_SECS: &str = "SLACK_SYNC_POLL_SECS";

/// Application configuration
///
/// Environment variables override the backend settings at read time and are
/// never written back to disk.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Project URL, e.g. https://abcd.supabase.co
    pub supabase_url: Option<String>,
    /// Public anon key sent as the `apikey` header
    pub anon_key: Option<String>,
    /// Seconds between polls of the open conversation
    pub poll_interval_secs: Option<u64>,
    /// Loopback port for the OAuth redirect
    pub redirect_port: Option<u16>,
    /// Workspace the channel list is scoped to (set on login)
    pub workspace_id: Option<RecordId>,
    /// Stored GoTrue access token (JWT)
    pub access_token: Option<StoredToken>,
    /// Stored GoTrue refresh token
    pub refresh_token: Option<String>,
    /// Session user (JWT `sub`)
    pub user_id: Option<Uuid>,
}

impl Config {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "slack-sync", "slack-sync")
            .context("Could not determine config directory")
    }

    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().to_path_buf())
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Log file used while the terminal UI owns the screen.
    pub fn log_path() -> Result<PathBuf> {
        let dir = Self::project_dirs()?.data_dir().to_path_buf();
        fs::create_dir_all(&dir).context("Failed to create data directory")?;
        Ok(dir.join("slack-sync.log"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains tokens)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Project URL without a trailing slash.
    pub fn supabase_url(&self) -> Result<String> {
        let url = env_or(ENV_URL, self.supabase_url.as_deref());
        match url {
            Some(u) if !u.trim().is_empty() => Ok(u.trim().trim_end_matches('/').to_string()),
            _ => bail!(
                "Missing Supabase URL. Set {} or run 'slack-sync config --url https://<ref>.supabase.co'.",
                ENV_URL
            ),
        }
    }

    pub fn anon_key(&self) -> Result<String> {
        match env_or(ENV_ANON_KEY, self.anon_key.as_deref()) {
            Some(k) if !k.trim().is_empty() => Ok(k.trim().to_string()),
            _ => bail!(
                "Missing Supabase anon key. Set {} or run 'slack-sync config --anon-key <key>'.",
                ENV_ANON_KEY
            ),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        let from_env = std::env::var(ENV_POLL_SECS)
            .ok()
            .and_then(|s| s.parse::<u64>().ok());
        from_env
            .or(self.poll_interval_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    pub fn redirect_port(&self) -> u16 {
        self.redirect_port.unwrap_or(DEFAULT_REDIRECT_PORT)
    }

    pub fn workspace(&self) -> RecordId {
        self.workspace_id.clone().unwrap_or(RecordId::Int(1))
    }

    pub fn set_session(&mut self, token: String, expires_in: Option<u64>, user_id: Uuid) {
        self.set_access_token(token, expires_in);
        self.user_id = Some(user_id);
    }
}

/// Values given to `slack-sync config`. `None` leaves a field unchanged.
#[derive(Debug, Default)]
pub struct ConfigUpdate {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub poll_secs: Option<u64>,
    pub redirect_port: Option<u16>,
    pub workspace: Option<RecordId>,
}

impl ConfigUpdate {
    fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.anon_key.is_none()
            && self.poll_secs.is_none()
            && self.redirect_port.is_none()
            && self.workspace.is_none()
    }
}

impl Config {
    /// Apply an update. Changing the project drops the stored session,
    /// since its tokens belong to the old project.
    pub fn apply(&mut self, update: ConfigUpdate) -> Result<()> {
        if let Some(url) = update.url {
            let url = url.trim().trim_end_matches('/').to_string();
            url::Url::parse(&url).with_context(|| format!("Invalid project URL: {}", url))?;
            if self.supabase_url.as_deref() != Some(url.as_str()) && self.access_token.is_some() {
                tracing::info!("Project changed, clearing stored session");
                self.clear_tokens();
                self.workspace_id = None;
            }
            self.supabase_url = Some(url);
        }
        if let Some(key) = update.anon_key {
            self.anon_key = Some(key.trim().to_string());
        }
        if let Some(secs) = update.poll_secs {
            if secs == 0 {
                bail!("Poll interval must be at least 1 second");
            }
            self.poll_interval_secs = Some(secs);
        }
        if let Some(port) = update.redirect_port {
            self.redirect_port = Some(port);
        }
        if let Some(ws) = update.workspace {
            self.workspace_id = Some(ws);
        }
        Ok(())
    }
}

/// `slack-sync config`: update settings, or print them when none are given.
pub fn configure(update: ConfigUpdate) -> Result<()> {
    let mut config = Config::load()?;

    if !update.is_empty() {
        config.apply(update)?;
        config.save()?;
        println!("Configuration saved to {}", Config::config_path()?.display());
    }

    println!();
    println!(
        "Project URL:   {}",
        config.supabase_url().unwrap_or_else(|_| "(not set)".to_string())
    );
    let key = match config.anon_key() {
        Ok(k) if k.chars().count() > 12 => format!("{}...", k.chars().take(12).collect::<String>()),
        Ok(k) => k,
        Err(_) => "(not set)".to_string(),
    };
    println!("Anon key:      {}", key);
    println!("Poll interval: {}s", config.poll_interval().as_secs());
    println!("Redirect port: {}", config.redirect_port());
    println!("Workspace:     {}", config.workspace());

    Ok(())
}

fn env_or(var: &str, fallback: Option<&str>) -> Option<String> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| fallback.map(String::from))
}

impl TokenStore for Config {
    fn get_access_token(&self) -> Option<StoredToken> {
        self.access_token.clone()
    }

    fn set_access_token(&mut self, token: String, expires_in: Option<u64>) {
        self.access_token = Some(StoredToken::new(token, expires_in));
    }

    fn get_refresh_token(&self) -> Option<String> {
        self.refresh_token.clone()
    }

    fn set_refresh_token(&mut self, token: String) {
        self.refresh_token = Some(token);
    }

    fn clear_tokens(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.user_id = None;
    }
}
