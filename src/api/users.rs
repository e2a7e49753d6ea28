//! User directory (`user_profiles` table)

use std::collections::HashMap;

use anyhow::Result;
use serde_json::json;
use uuid::Uuid;

use super::client::SupabaseClient;
use crate::auth::oauth::GoTrueUser;
use crate::models::UserProfile;
use crate::store::StoreResult;

const PROFILE_COLUMNS: &str = "id,username,display_name,avatar_url,status";

/// Every profile except the session user's, by username.
pub async fn list_others(client: &SupabaseClient) -> StoreResult<Vec<UserProfile>> {
    client
        .select(
            "user_profiles",
            &[
                ("select", PROFILE_COLUMNS.to_string()),
                ("id", format!("neq.{}", client.user_id())),
                ("order", "username.asc".to_string()),
            ],
        )
        .await
}

/// Profiles for a set of user ids, fetched in one request.
pub async fn profiles_by_id(
    client: &SupabaseClient,
    ids: &[Uuid],
) -> StoreResult<HashMap<Uuid, UserProfile>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut unique: Vec<String> = ids.iter().map(Uuid::to_string).collect();
    unique.sort();
    unique.dedup();

    let rows: Vec<UserProfile> = client
        .select(
            "user_profiles",
            &[
                ("select", PROFILE_COLUMNS.to_string()),
                ("id", format!("in.({})", unique.join(","))),
            ],
        )
        .await?;
    Ok(rows.into_iter().map(|p| (p.id, p)).collect())
}

pub async fn own_profile(client: &SupabaseClient) -> StoreResult<Option<UserProfile>> {
    let mut found = profiles_by_id(client, &[client.user_id()]).await?;
    Ok(found.remove(&client.user_id()))
}

/// Username derived from the account: the email's local part, else
/// `user_` plus the first 8 characters of the id.
pub fn default_username(user: &GoTrueUser) -> String {
    match user.email.as_deref().and_then(|e| e.split('@').next()) {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => {
            let id = user.id.simple().to_string();
            format!("user_{}", &id[..8])
        }
    }
}

/// Display name from provider metadata, falling back to the username.
pub fn default_display_name(user: &GoTrueUser, username: &str) -> String {
    ["full_name", "name"]
        .iter()
        .filter_map(|key| user.user_metadata.get(key).and_then(|v| v.as_str()))
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| username.to_string())
}

/// Create the profile row for a freshly signed-in user, or update it.
pub async fn upsert_profile(client: &SupabaseClient, user: &GoTrueUser) -> StoreResult<UserProfile> {
    let username = default_username(user);
    let display_name = default_display_name(user, &username);
    let avatar_url = user
        .user_metadata
        .get("avatar_url")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let body = json!({
        "id": user.id,
        "username": username,
        "display_name": display_name,
        "avatar_url": avatar_url,
        "status": "online",
    });
    let mut rows: Vec<UserProfile> = client.upsert("user_profiles", &body).await?;
    Ok(rows.pop().unwrap_or(UserProfile {
        id: user.id,
        username,
        display_name: Some(display_name),
        avatar_url,
        status: Some("online".to_string()),
    }))
}

/// Print the signed-in user's profile.
pub async fn whoami() -> Result<()> {
    let client = SupabaseClient::new().await?;
    let me = own_profile(&client).await?;

    println!();
    match me {
        Some(p) => {
            println!("Display Name: {}", p.label());
            println!("Username:     @{}", p.username);
            println!("Status:       {}", p.status.as_deref().unwrap_or("(none)"));
            println!("ID:           {}", p.id);
        }
        None => {
            println!("ID:           {}", client.user_id());
            println!("(no profile yet; run 'slack-sync login --force' to create one)");
        }
    }
    println!("Workspace:    {}", client.workspace());

    Ok(())
}

/// Print the user directory.
pub async fn list_users() -> Result<()> {
    let client = SupabaseClient::new().await?;
    let users = list_others(&client).await?;

    println!("\nPeople:");
    println!("{:-<60}", "");

    if users.is_empty() {
        println!("  (nobody else here yet)");
        return Ok(());
    }

    for u in &users {
        match u.status.as_deref() {
            Some(status) => println!("  @{:<20} {} ({})", u.username, u.label(), status),
            None => println!("  @{:<20} {}", u.username, u.label()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: Option<&str>, meta: serde_json::Value) -> GoTrueUser {
        GoTrueUser {
            id: Uuid::parse_str("1b4e28ba-2fa1-11d2-883f-0016d3cca427").unwrap(),
            email: email.map(String::from),
            user_metadata: meta,
        }
    }

    #[test]
    fn test_username_from_email() {
        let u = user(Some("ada@example.com"), json!({}));
        assert_eq!(default_username(&u), "ada");
    }

    #[test]
    fn test_username_without_email_uses_id_prefix() {
        let u = user(None, serde_json::Value::Null);
        assert_eq!(default_username(&u), "user_1b4e28ba");
    }

    #[test]
    fn test_display_name_fallbacks() {
        let u = user(Some("a@b.c"), json!({ "name": "Ada L", "full_name": "" }));
        assert_eq!(default_display_name(&u, "a"), "Ada L");

        let u = user(Some("a@b.c"), json!({ "full_name": "Ada Lovelace", "name": "ada" }));
        assert_eq!(default_display_name(&u, "a"), "Ada Lovelace");

        let u = user(Some("a@b.c"), serde_json::Value::Null);
        assert_eq!(default_display_name(&u, "a"), "a");
    }
}
