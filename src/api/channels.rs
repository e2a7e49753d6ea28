//! Channels, memberships and the default workspace

use anyhow::{bail, Result};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::client::SupabaseClient;
use crate::models::{normalize_channel_name, Channel, RecordId};
use crate::store::{StoreError, StoreResult};

pub const DEFAULT_WORKSPACE_NAME: &str = "Default Workspace";
pub const GENERAL_CHANNEL: &str = "general";

const CHANNEL_COLUMNS: &str = "id,workspace_id,name,description,is_private,channel_members(user_id)";

#[derive(Debug, Deserialize)]
struct MemberRow {
    user_id: Uuid,
}

/// `channels` row with its memberships embedded.
#[derive(Debug, Deserialize)]
struct ChannelRow {
    id: RecordId,
    workspace_id: RecordId,
    name: String,
    description: Option<String>,
    #[serde(default)]
    is_private: Option<bool>,
    #[serde(default)]
    channel_members: Vec<MemberRow>,
}

impl From<ChannelRow> for Channel {
    fn from(row: ChannelRow) -> Self {
        Channel {
            id: row.id,
            workspace_id: row.workspace_id,
            name: row.name,
            description: row.description.filter(|d| !d.is_empty()),
            is_private: row.is_private.unwrap_or(false),
            members: row.channel_members.into_iter().map(|m| m.user_id).collect(),
        }
    }
}

async fn select_channels(
    client: &SupabaseClient,
    mut query: Vec<(&str, String)>,
) -> StoreResult<Vec<Channel>> {
    query.push(("select", CHANNEL_COLUMNS.to_string()));
    query.push(("order", "name.asc".to_string()));
    let rows: Vec<ChannelRow> = client.select("channels", &query).await?;
    Ok(rows.into_iter().map(Channel::from).collect())
}

/// Every visible channel in the workspace, members included.
pub async fn all_in_workspace(
    client: &SupabaseClient,
    workspace: &RecordId,
) -> StoreResult<Vec<Channel>> {
    select_channels(client, vec![("workspace_id", format!("eq.{}", workspace))]).await
}

/// Channels the session user belongs to.
pub async fn list_joined(client: &SupabaseClient, workspace: &RecordId) -> StoreResult<Vec<Channel>> {
    let me = client.user_id();
    Ok(all_in_workspace(client, workspace)
        .await?
        .into_iter()
        .filter(|c| c.is_member(me))
        .collect())
}

/// Public channels the session user has not joined.
pub async fn list_joinable(
    client: &SupabaseClient,
    workspace: &RecordId,
) -> StoreResult<Vec<Channel>> {
    let me = client.user_id();
    Ok(all_in_workspace(client, workspace)
        .await?
        .into_iter()
        .filter(|c| !c.is_private && !c.is_member(me))
        .collect())
}

pub async fn find_by_name(
    client: &SupabaseClient,
    workspace: &RecordId,
    name: &str,
) -> StoreResult<Option<Channel>> {
    let Ok(name) = normalize_channel_name(name) else {
        return Ok(None);
    };
    let found = select_channels(
        client,
        vec![
            ("workspace_id", format!("eq.{}", workspace)),
            ("name", format!("eq.{}", name)),
        ],
    )
    .await?;
    Ok(found.into_iter().next())
}

/// Whether a channel row is still visible to the session user.
pub async fn exists(client: &SupabaseClient, id: &RecordId) -> StoreResult<bool> {
    let rows: Vec<serde_json::Value> = client
        .select(
            "channels",
            &[("select", "id".to_string()), ("id", format!("eq.{}", id))],
        )
        .await?;
    Ok(!rows.is_empty())
}

/// Add the session user to a channel. Returns false if already a member.
pub async fn join(client: &SupabaseClient, channel_id: &RecordId) -> StoreResult<bool> {
    let body = json!({ "channel_id": channel_id, "user_id": client.user_id() });
    match client.insert::<serde_json::Value>("channel_members", &body).await {
        Ok(_) => Ok(true),
        // Unique (channel_id, user_id): already joined.
        Err(StoreError::Rejected { status: 409, .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Create a channel and join it as its creator.
pub async fn create(
    client: &SupabaseClient,
    workspace: &RecordId,
    raw_name: &str,
    description: Option<&str>,
    is_private: bool,
) -> Result<Channel> {
    let name = normalize_channel_name(raw_name)?;
    if find_by_name(client, workspace, &name).await?.is_some() {
        bail!("#{} already exists", name);
    }

    let body = json!({
        "workspace_id": workspace,
        "name": name,
        "description": description.map(str::trim).filter(|d| !d.is_empty()),
        "is_private": is_private,
        "created_by": client.user_id(),
    });
    let rows: Vec<ChannelRow> = client.insert("channels", &body).await?;
    let Some(row) = rows.into_iter().next() else {
        bail!("Server returned no row for the new channel");
    };
    let mut channel = Channel::from(row);

    join(client, &channel.id).await?;
    channel.members.insert(client.user_id());
    Ok(channel)
}

#[derive(Debug, Deserialize)]
struct WorkspaceRow {
    id: RecordId,
}

/// Find or create the default workspace and its `#general` channel, and
/// make sure the session user is in `#general`. Returns the workspace id.
pub async fn ensure_defaults(client: &SupabaseClient) -> Result<RecordId> {
    let found: Vec<WorkspaceRow> = client
        .select(
            "workspaces",
            &[
                ("select", "id".to_string()),
                ("name", format!("eq.{}", DEFAULT_WORKSPACE_NAME)),
                ("order", "id.asc".to_string()),
                ("limit", "1".to_string()),
            ],
        )
        .await?;

    let workspace = match found.into_iter().next() {
        Some(w) => w.id,
        None => {
            tracing::info!("Creating '{}'", DEFAULT_WORKSPACE_NAME);
            let body = json!({
                "name": DEFAULT_WORKSPACE_NAME,
                "description": "Default workspace for all users",
                "created_by": client.user_id(),
            });
            let rows: Vec<WorkspaceRow> = client.insert("workspaces", &body).await?;
            match rows.into_iter().next() {
                Some(w) => w.id,
                None => bail!("Server returned no row for the new workspace"),
            }
        }
    };

    match find_by_name(client, &workspace, GENERAL_CHANNEL).await? {
        Some(general) => {
            if join(client, &general.id).await? {
                tracing::info!("Joined #{}", GENERAL_CHANNEL);
            }
        }
        None => {
            create(
                client,
                &workspace,
                GENERAL_CHANNEL,
                Some("General discussion"),
                false,
            )
            .await?;
        }
    }

    Ok(workspace)
}

/// Print joined channels.
pub async fn list_channels() -> Result<()> {
    let client = SupabaseClient::new().await?;
    let channels = list_joined(&client, client.workspace()).await?;

    println!("\nChannels:");
    println!("{:-<60}", "");

    if channels.is_empty() {
        println!("  (not in any channels; try 'slack-sync browse')");
        return Ok(());
    }
    for c in &channels {
        print_channel(c);
    }
    Ok(())
}

/// Print public channels that can be joined.
pub async fn browse() -> Result<()> {
    let client = SupabaseClient::new().await?;
    let channels = list_joinable(&client, client.workspace()).await?;

    println!("\nJoinable channels:");
    println!("{:-<60}", "");

    if channels.is_empty() {
        println!("  (nothing new to join)");
        return Ok(());
    }
    for c in &channels {
        print_channel(c);
    }
    Ok(())
}

fn print_channel(c: &Channel) {
    let lock = if c.is_private { " (private)" } else { "" };
    println!("#{}{}  [id {}, {} members]", c.name, lock, c.id, c.members.len());
    if let Some(ref d) = c.description {
        println!("  {}", d);
    }
}

pub async fn join_channel(name: &str) -> Result<()> {
    let client = SupabaseClient::new().await?;
    let Some(channel) = find_by_name(&client, client.workspace(), name).await? else {
        bail!("No channel named {}", name);
    };
    if join(&client, &channel.id).await? {
        println!("Joined #{}.", channel.name);
    } else {
        println!("Already a member of #{}.", channel.name);
    }
    Ok(())
}

pub async fn create_channel(name: &str, description: Option<&str>, private: bool) -> Result<()> {
    let client = SupabaseClient::new().await?;
    let channel = create(&client, client.workspace(), name, description, private).await?;
    println!("Created #{} (id {}).", channel.name, channel.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_row_with_embedded_members() {
        let a = Uuid::new_v4();
        let row: ChannelRow = serde_json::from_value(json!({
            "id": 7,
            "workspace_id": 1,
            "name": "general",
            "description": "",
            "is_private": null,
            "channel_members": [{ "user_id": a }]
        }))
        .unwrap();

        let c = Channel::from(row);
        assert_eq!(c.id, RecordId::Int(7));
        assert!(c.description.is_none());
        assert!(!c.is_private);
        assert!(c.is_member(a));
    }

    #[test]
    fn test_channel_row_without_members() {
        let row: ChannelRow = serde_json::from_value(json!({
            "id": "c-1",
            "workspace_id": 1,
            "name": "random",
            "description": "off topic",
            "is_private": true
        }))
        .unwrap();
        let c = Channel::from(row);
        assert_eq!(c.id, RecordId::Text("c-1".into()));
        assert!(c.is_private);
        assert!(c.members.is_empty());
    }
}
