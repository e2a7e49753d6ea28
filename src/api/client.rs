//! Authenticated HTTP client for the Supabase REST API
//!
//! Wraps reqwest::Client with the `apikey` + bearer headers PostgREST expects,
//! and maps HTTP outcomes onto `StoreError`.

use std::future::Future;

use anyhow::{bail, Result};
use serde::de::DeserializeOwned;
use url::Url;
use uuid::Uuid;

use crate::auth::{decode_claims, TokenStore};
use crate::config::Config;
use crate::models::RecordId;
use crate::store::{StoreError, StoreResult};

/// Authenticated client for one signed-in user.
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: String,
    user_id: Uuid,
    workspace: RecordId,
}

impl SupabaseClient {
    /// Load config and build client. Attempts a refresh if the session is expired.
    pub async fn new() -> Result<Self> {
        let mut config = Config::load()?;

        let needs_refresh = config.get_access_token().map_or(true, |t| t.is_expired());
        if needs_refresh {
            if config.get_refresh_token().is_some() {
                tracing::info!("Session missing or expired, refreshing...");
                match crate::auth::oauth::refresh().await {
                    Ok(true) => {
                        config = Config::load()?;
                        tracing::info!("Session refreshed");
                    }
                    Ok(false) => {
                        bail!("No refresh token available. Run 'slack-sync login'.");
                    }
                    Err(e) => {
                        bail!("Session refresh failed: {:#}. Run 'slack-sync login'.", e);
                    }
                }
            } else {
                bail!("Not signed in. Run 'slack-sync login'.");
            }
        }

        let Some(token) = config.get_access_token() else {
            bail!("Not signed in. Run 'slack-sync login'.");
        };
        let user_id = match config.user_id {
            Some(id) => id,
            None => decode_claims(&token.token)?.sub,
        };

        Ok(Self::from_parts(
            config.supabase_url()?,
            config.anon_key()?,
            token.token,
            user_id,
            config.workspace(),
        ))
    }

    pub fn from_parts(
        base_url: String,
        anon_key: String,
        access_token: String,
        user_id: Uuid,
        workspace: RecordId,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            anon_key,
            access_token,
            user_id,
            workspace,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn workspace(&self) -> &RecordId {
        &self.workspace
    }

    /// URL of a PostgREST table with query parameters applied.
    pub fn table_url(&self, table: &str, query: &[(&str, String)]) -> StoreResult<Url> {
        let mut url = Url::parse(&format!("{}/rest/v1/{}", self.base_url, table))
            .map_err(|e| StoreError::Decode(format!("bad project URL: {}", e)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.anon_key)
            .bearer_auth(&self.access_token)
    }

    /// GET rows from a table.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> StoreResult<Vec<T>> {
        let url = self.table_url(table, query)?;
        tracing::debug!("REST GET {}", url);

        let resp = self
            .authed(self.http.get(url.clone()))
            .send()
            .await
            .map_err(transport_error)?;

        let resp = check_response(resp, url.as_str()).await?;
        decode(resp).await
    }

    /// INSERT rows and return them as stored.
    pub async fn insert<T: DeserializeOwned>(
        &self,
        table: &str,
        body: &serde_json::Value,
    ) -> StoreResult<Vec<T>> {
        self.write(table, body, "return=representation").await
    }

    /// INSERT-or-UPDATE on the primary key.
    pub async fn upsert<T: DeserializeOwned>(
        &self,
        table: &str,
        body: &serde_json::Value,
    ) -> StoreResult<Vec<T>> {
        self.write(table, body, "resolution=merge-duplicates,return=representation")
            .await
    }

    async fn write<T: DeserializeOwned>(
        &self,
        table: &str,
        body: &serde_json::Value,
        prefer: &str,
    ) -> StoreResult<Vec<T>> {
        let url = self.table_url(table, &[])?;
        tracing::debug!("REST POST {}", url);

        let resp = self
            .authed(self.http.post(url.clone()))
            .header("Prefer", prefer)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let resp = check_response(resp, url.as_str()).await?;
        decode(resp).await
    }

    /// DELETE rows matching the filters.
    pub async fn delete(&self, table: &str, query: &[(&str, String)]) -> StoreResult<()> {
        let url = self.table_url(table, query)?;
        tracing::debug!("REST DELETE {}", url);

        let resp = self
            .authed(self.http.delete(url.clone()))
            .send()
            .await
            .map_err(transport_error)?;

        check_response(resp, url.as_str()).await?;
        Ok(())
    }
}

/// Rows requested per page. Must not exceed the project's `max-rows`
/// setting (1000 on Supabase by default), or a capped page reads as the
/// last one.
pub const PAGE_SIZE: usize = 1000;

/// Fetch every row of an ordered query, one page at a time.
///
/// `fetch_page` gets the row offset of the page to load. Paging stops at the
/// first page shorter than `page_size`.
pub async fn collect_pages<T, F, Fut>(page_size: usize, mut fetch_page: F) -> StoreResult<Vec<T>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = StoreResult<Vec<T>>>,
{
    let mut rows = Vec::new();
    loop {
        let page = fetch_page(rows.len()).await?;
        let last = page.len() < page_size;
        rows.extend(page);
        if last {
            return Ok(rows);
        }
    }
}

/// `limit`/`offset` parameters for one page.
pub fn page_params(offset: usize) -> [(&'static str, String); 2] {
    [
        ("limit", PAGE_SIZE.to_string()),
        ("offset", offset.to_string()),
    ]
}

/// PostgREST `in.(...)` filter value. Text keys are quoted.
pub fn in_filter(ids: &[RecordId]) -> String {
    let items: Vec<String> = ids
        .iter()
        .map(|id| match id {
            RecordId::Int(n) => n.to_string(),
            RecordId::Text(s) => format!("\"{}\"", s.replace('"', "\\\"")),
        })
        .collect();
    format!("in.({})", items.join(","))
}

fn transport_error(e: reqwest::Error) -> StoreError {
    StoreError::NetworkUnavailable(e.to_string())
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> StoreResult<T> {
    resp.json()
        .await
        .map_err(|e| StoreError::Decode(e.to_string()))
}

/// Map a non-success HTTP status onto the store error taxonomy.
pub fn classify_status(status: u16, url: &str, body: &str) -> StoreError {
    let detail = if body.is_empty() {
        url.to_string()
    } else {
        format!("{}: {}", url, body)
    };
    match status {
        401 | 403 => StoreError::Unauthorized(detail),
        404 => StoreError::NotFound(detail),
        408 | 429 | 500..=599 => StoreError::NetworkUnavailable(format!("HTTP {} for {}", status, detail)),
        _ => StoreError::Rejected {
            status,
            message: detail,
        },
    }
}

/// Check HTTP response status code and return a typed error on failure.
async fn check_response(resp: reqwest::Response, url: &str) -> StoreResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(classify_status(status.as_u16(), url, &body))
}
