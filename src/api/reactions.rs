//! Message reactions (`message_reactions` table)

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::client::{collect_pages, in_filter, page_params, SupabaseClient, PAGE_SIZE};
use crate::models::{Reactions, RecordId};
use crate::store::{StoreError, StoreResult};

#[derive(Debug, Deserialize)]
struct ReactionRow {
    message_id: RecordId,
    user_id: Uuid,
    emoji: String,
}

/// Reactions for a batch of messages, grouped per message and emoji.
pub async fn for_messages(
    client: &SupabaseClient,
    ids: &[RecordId],
) -> StoreResult<HashMap<RecordId, Reactions>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let base = [
        ("select", "message_id,user_id,emoji".to_string()),
        ("message_id", in_filter(ids)),
        // (message_id, user_id, emoji) is unique, so pages never overlap.
        (
            "order",
            "created_at.asc,message_id.asc,user_id.asc,emoji.asc".to_string(),
        ),
    ];
    let rows: Vec<ReactionRow> = collect_pages(PAGE_SIZE, |offset| {
        let mut query = base.to_vec();
        query.extend(page_params(offset));
        async move { client.select("message_reactions", &query).await }
    })
    .await?;
    Ok(group(rows))
}

fn group(rows: Vec<ReactionRow>) -> HashMap<RecordId, Reactions> {
    let mut out: HashMap<RecordId, Reactions> = HashMap::new();
    for row in rows {
        out.entry(row.message_id)
            .or_default()
            .insert(&row.emoji, row.user_id);
    }
    out
}

/// Add a reaction. Reacting twice with the same emoji is a no-op.
pub async fn add(
    client: &SupabaseClient,
    message_id: &RecordId,
    emoji: &str,
    user: Uuid,
) -> StoreResult<()> {
    let body = json!({ "message_id": message_id, "user_id": user, "emoji": emoji });
    match client.insert::<serde_json::Value>("message_reactions", &body).await {
        Ok(_) => Ok(()),
        Err(StoreError::Rejected { status: 409, .. }) => Ok(()),
        Err(e) => Err(e),
    }
}

pub async fn remove(
    client: &SupabaseClient,
    message_id: &RecordId,
    emoji: &str,
    user: Uuid,
) -> StoreResult<()> {
    client
        .delete(
            "message_reactions",
            &[
                ("message_id", format!("eq.{}", message_id)),
                ("user_id", format!("eq.{}", user)),
                ("emoji", format!("eq.{}", emoji)),
            ],
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_message_and_emoji() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let rows: Vec<ReactionRow> = serde_json::from_value(json!([
            { "message_id": 1, "user_id": a, "emoji": "👍" },
            { "message_id": 1, "user_id": b, "emoji": "👍" },
            { "message_id": 1, "user_id": a, "emoji": "❤️" },
            { "message_id": 2, "user_id": b, "emoji": "😄" },
            { "message_id": 1, "user_id": a, "emoji": "👍" }
        ]))
        .unwrap();

        let grouped = group(rows);
        let first = &grouped[&RecordId::Int(1)];
        assert_eq!(first.groups()[0].emoji, "👍");
        assert_eq!(first.groups()[0].user_ids, vec![a, b]);
        assert_eq!(first.groups()[1].emoji, "❤️");
        assert_eq!(first.groups()[1].user_ids, vec![a]);
        assert!(grouped[&RecordId::Int(2)].has_reacted("😄", b));
    }
}
