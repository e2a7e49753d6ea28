//! Supabase-backed workspace API and the CLI commands built on it

pub mod channels;
pub mod client;
pub mod messages;
pub mod reactions;
mod store;
pub mod users;

use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;

use crate::auth::oauth::GoTrueUser;
use crate::config::Config;
use crate::models::{format_message_time, Message, RecordId, Target};
use crate::sync::{self, SyncEvent, SyncLoop};

use self::client::SupabaseClient;

pub use channels::{browse, create_channel, join_channel, list_channels};
pub use users::{list_users, whoami};

/// First-login setup: profile row, default workspace, `#general` membership.
pub async fn bootstrap(user: &GoTrueUser) -> Result<RecordId> {
    let client = SupabaseClient::new().await?;
    let profile = users::upsert_profile(&client, user).await?;
    tracing::info!("Profile ready: @{}", profile.username);
    channels::ensure_defaults(&client).await
}

/// Resolve a conversation argument to a target and a display label.
///
/// Accepted forms: `#name` or `name` for a channel, a numeric channel id,
/// and `@username` for a direct-message thread.
pub async fn resolve_conversation(client: &SupabaseClient, arg: &str) -> Result<(Target, String)> {
    let arg = arg.trim();
    if arg.is_empty() {
        bail!("Empty conversation name");
    }

    if let Some(who) = arg.strip_prefix('@') {
        let people = users::list_others(client).await?;
        let Some(user) = people.iter().find(|u| u.matches(who)) else {
            bail!("No user named @{}. Try 'slack-sync users'.", who);
        };
        return Ok((
            Target::direct(client.user_id(), user.id),
            format!("@{}", user.username),
        ));
    }

    if !arg.starts_with('#') {
        if let Ok(n) = arg.parse::<i64>() {
            let id = RecordId::Int(n);
            let joined = channels::list_joined(client, client.workspace()).await?;
            let label = joined
                .iter()
                .find(|c| c.id == id)
                .map(|c| format!("#{}", c.name))
                .unwrap_or_else(|| format!("channel {}", id));
            return Ok((Target::Channel(id), label));
        }
    }

    match channels::find_by_name(client, client.workspace(), arg).await? {
        Some(c) => Ok((Target::Channel(c.id), format!("#{}", c.name))),
        None => bail!("No channel named {}. Try 'slack-sync channels'.", arg),
    }
}

fn print_message(m: &Message, now: chrono::DateTime<Utc>) {
    println!(
        "[{}] {} ({}): {}",
        format_message_time(m.created_at, now),
        m.author_label(),
        m.id,
        m.body
    );
    if !m.reactions.is_empty() {
        let summary: Vec<String> = m
            .reactions
            .groups()
            .iter()
            .map(|g| format!("{} {}", g.emoji, g.user_ids.len()))
            .collect();
        println!("    {}", summary.join("  "));
    }
}

/// Print the newest `limit` messages of a conversation.
pub async fn read_messages(conversation: &str, limit: usize) -> Result<()> {
    let client = SupabaseClient::new().await?;
    let (target, label) = resolve_conversation(&client, conversation).await?;
    let msgs = messages::list_recent(&client, &target, limit).await?;

    if msgs.is_empty() {
        println!("No messages in {} yet", label);
        return Ok(());
    }

    let now = Utc::now();
    for m in &msgs {
        print_message(m, now);
    }
    Ok(())
}

pub async fn send_message(conversation: &str, body: &str) -> Result<()> {
    if body.trim().is_empty() {
        bail!("Message is empty");
    }
    let client = SupabaseClient::new().await?;
    let (target, label) = resolve_conversation(&client, conversation).await?;
    let sent = messages::send(&client, &target, body).await?;
    println!("Message sent to {} (id {}).", label, sent.id);
    Ok(())
}

/// Add or remove a reaction on a message.
pub async fn react(message_id: &str, emoji: &str, remove: bool) -> Result<()> {
    let emoji = emoji.trim();
    if emoji.is_empty() {
        bail!("Emoji is empty");
    }
    let client = SupabaseClient::new().await?;
    let id: RecordId = message_id.parse()?;
    if remove {
        reactions::remove(&client, &id, emoji, client.user_id()).await?;
        println!("Removed {} from message {}.", emoji, id);
    } else {
        reactions::add(&client, &id, emoji, client.user_id()).await?;
        println!("Reacted {} to message {}.", emoji, id);
    }
    Ok(())
}

/// Follow a conversation, printing messages as they arrive, until Ctrl-C.
pub async fn watch(conversation: &str) -> Result<()> {
    let config = Config::load()?;
    let client = SupabaseClient::new().await?;
    let (target, label) = resolve_conversation(&client, conversation).await?;

    println!("Watching {} (Ctrl-C to stop)", label);
    let period = config.poll_interval();
    let mut handle = sync::spawn(SyncLoop::new(Arc::new(client), Some(target)), period);

    loop {
        tokio::select! {
            event = handle.recv() => match event {
                Some(SyncEvent::Messages { messages, seen_before, .. }) => {
                    if seen_before.is_none() && messages.is_empty() {
                        println!("No messages in {} yet", label);
                    }
                    let now = Utc::now();
                    for m in messages.iter().filter(|m| Some(m.cursor()) > seen_before) {
                        print_message(m, now);
                    }
                }
                Some(SyncEvent::Unauthorized) => {
                    bail!("Session expired. Run 'slack-sync login'.");
                }
                Some(SyncEvent::TargetGone(_)) => {
                    println!("{} no longer exists.", label);
                    return Ok(());
                }
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                handle.stop();
                return Ok(());
            }
        }
    }
}
