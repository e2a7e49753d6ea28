//! Channel and direct messages (`messages` table)

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::client::{collect_pages, page_params, SupabaseClient, PAGE_SIZE};
use super::{channels, reactions, users};
use crate::models::{sort_chronological, Message, RecordId, Target, UserProfile};
use crate::store::{StoreError, StoreResult};

const MESSAGE_COLUMNS: &str = "id,user_id,channel_id,recipient_id,content,created_at";

/// Raw `messages` row.
#[derive(Debug, Deserialize)]
struct MessageRow {
    id: RecordId,
    user_id: Uuid,
    channel_id: Option<RecordId>,
    recipient_id: Option<Uuid>,
    content: String,
    created_at: DateTime<Utc>,
}

/// PostgREST filters selecting the messages of one conversation.
fn target_filters(target: &Target) -> Vec<(&'static str, String)> {
    match target {
        Target::Channel(id) => vec![("channel_id", format!("eq.{}", id))],
        Target::Direct(pair) => {
            let (a, b) = pair.users();
            vec![
                ("channel_id", "is.null".to_string()),
                (
                    "or",
                    format!(
                        "(and(user_id.eq.{a},recipient_id.eq.{b}),and(user_id.eq.{b},recipient_id.eq.{a}))"
                    ),
                ),
            ]
        }
    }
}

/// All messages of a conversation, oldest first.
pub async fn list(client: &SupabaseClient, target: &Target) -> StoreResult<Vec<Message>> {
    let mut base = target_filters(target);
    base.push(("select", MESSAGE_COLUMNS.to_string()));
    base.push(("order", "created_at.asc,id.asc".to_string()));

    let rows: Vec<MessageRow> = collect_pages(PAGE_SIZE, |offset| {
        let mut query = base.clone();
        query.extend(page_params(offset));
        async move { client.select("messages", &query).await }
    })
    .await?;

    // PostgREST answers [] for a deleted channel; tell that apart from an
    // empty one.
    if rows.is_empty() {
        if let Some(id) = target.channel_id() {
            if !channels::exists(client, id).await? {
                return Err(StoreError::NotFound(format!("channel {}", id)));
            }
        }
    }

    // Hydrate a page at a time to keep the `in.(...)` lookups short.
    let mut messages = Vec::with_capacity(rows.len());
    let mut rows = rows.into_iter().peekable();
    while rows.peek().is_some() {
        let chunk: Vec<MessageRow> = rows.by_ref().take(PAGE_SIZE).collect();
        messages.extend(hydrate(client, chunk).await?);
    }
    Ok(messages)
}

/// The newest `limit` messages of a conversation, oldest first.
pub async fn list_recent(
    client: &SupabaseClient,
    target: &Target,
    limit: usize,
) -> StoreResult<Vec<Message>> {
    let mut query = target_filters(target);
    query.push(("select", MESSAGE_COLUMNS.to_string()));
    query.push(("order", "created_at.desc,id.desc".to_string()));
    query.push(("limit", limit.to_string()));

    let rows: Vec<MessageRow> = client.select("messages", &query).await?;
    let mut messages = hydrate(client, rows).await?;
    sort_chronological(&mut messages);
    Ok(messages)
}

/// Post a message as the session user.
pub async fn send(client: &SupabaseClient, target: &Target, body: &str) -> StoreResult<Message> {
    let (channel_id, recipient_id) = match target {
        Target::Channel(id) => (Some(id.clone()), None),
        Target::Direct(pair) => (None, Some(pair.other(client.user_id()))),
    };
    let row = json!({
        "user_id": client.user_id(),
        "channel_id": channel_id,
        "recipient_id": recipient_id,
        "content": body.trim(),
        "message_type": "text",
    });

    let rows: Vec<MessageRow> = client.insert("messages", &row).await?;
    let mut messages = hydrate(client, rows).await?;
    messages
        .pop()
        .ok_or_else(|| StoreError::Decode("insert returned no row".to_string()))
}

/// Turn rows into messages with author names and reactions attached.
///
/// Names and reactions are looked up in one request each. If either lookup
/// fails the messages still come back, without that decoration.
async fn hydrate(client: &SupabaseClient, rows: Vec<MessageRow>) -> StoreResult<Vec<Message>> {
    let mut messages = Vec::with_capacity(rows.len());
    for row in rows {
        match Target::from_columns(&row.id, row.user_id, row.channel_id, row.recipient_id) {
            Ok(target) => messages.push(Message {
                id: row.id,
                author_id: row.user_id,
                author_name: None,
                target,
                body: row.content,
                created_at: row.created_at,
                reactions: Default::default(),
            }),
            Err(e) => tracing::warn!("Skipping malformed message: {}", e),
        }
    }
    if messages.is_empty() {
        return Ok(messages);
    }

    let author_ids: Vec<Uuid> = messages.iter().map(|m| m.author_id).collect();
    let profiles: HashMap<Uuid, UserProfile> = match users::profiles_by_id(client, &author_ids).await {
        Ok(p) => p,
        Err(e @ StoreError::Unauthorized(_)) => return Err(e),
        Err(e) => {
            tracing::warn!("Author lookup failed: {}", e);
            HashMap::new()
        }
    };

    let ids: Vec<RecordId> = messages.iter().map(|m| m.id.clone()).collect();
    let mut grouped = match reactions::for_messages(client, &ids).await {
        Ok(r) => r,
        Err(e @ StoreError::Unauthorized(_)) => return Err(e),
        Err(e) => {
            tracing::warn!("Reaction lookup failed: {}", e);
            HashMap::new()
        }
    };

    for m in &mut messages {
        m.author_name = profiles.get(&m.author_id).map(|p| p.label().to_string());
        if let Some(r) = grouped.remove(&m.id) {
            m.reactions = r;
        }
    }
    Ok(messages)
}
