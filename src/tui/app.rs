//! TUI application state and main event loop
//!
//! Input, sync events and backend responses all funnel into `App`, which
//! mutates its state and returns `Effect`s. The loop then applies those
//! effects to the sync task and backend. Keeping `App` free of I/O lets the
//! tests drive it directly.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use tokio::time;
use uuid::Uuid;

use super::backend::{Backend, BackendCommand, BackendResponse};
use super::compose::{ComposeState, QUICK_REACTIONS};
use super::messages::MessagesState;
use super::sidebar::SidebarState;
use super::ui;
use crate::models::{RecordId, Target};
use crate::store::{RemoteStore, StoreError};
use crate::sync::{self, SyncEvent, SyncHandle, SyncLoop};

/// How often to redraw with no input, so relative times stay current.
const CLOCK_TICK: Duration = Duration::from_secs(30);

const SESSION_EXPIRED: &str = "Session expired. Run 'slack-sync login', then restart.";

/// Active pane in the TUI
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    #[default]
    Sidebar,
    Messages,
    Compose,
}

impl Pane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pane::Sidebar => "sidebar",
            Pane::Messages => "messages",
            Pane::Compose => "compose",
        }
    }

    fn next(self) -> Self {
        match self {
            Pane::Sidebar => Pane::Messages,
            Pane::Messages => Pane::Compose,
            Pane::Compose => Pane::Sidebar,
        }
    }

    fn prev(self) -> Self {
        match self {
            Pane::Sidebar => Pane::Compose,
            Pane::Messages => Pane::Sidebar,
            Pane::Compose => Pane::Messages,
        }
    }
}

/// Side effects requested by the app.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Point the sync loop at a conversation.
    Open(Target),
    /// Poll the open conversation now and re-render.
    Refresh,
    Backend(BackendCommand),
}

/// Application state
pub struct App {
    pub should_exit: bool,
    /// Session user
    pub me: Uuid,
    pub user_name: String,
    /// False once the store has reported the session as expired.
    pub session_ok: bool,
    pub poll_interval: Duration,
    pub active_pane: Pane,
    pub sidebar: SidebarState,
    pub messages: MessagesState,
    pub compose: ComposeState,
    pub show_help: bool,
    pub status_message: Option<String>,
    pub status_is_error: bool,
}

impl App {
    pub fn new(me: Uuid, user_name: String, poll_interval: Duration) -> Self {
        Self {
            should_exit: false,
            me,
            user_name,
            session_ok: true,
            poll_interval,
            active_pane: Pane::default(),
            sidebar: SidebarState::default(),
            messages: MessagesState::default(),
            compose: ComposeState::default(),
            show_help: false,
            status_message: None,
            status_is_error: false,
        }
    }

    /// Requests to issue once at startup.
    pub fn startup(&self) -> Vec<Effect> {
        vec![
            Effect::Backend(BackendCommand::LoadChannels),
            Effect::Backend(BackendCommand::LoadUsers),
        ]
    }

    /// Label of the open conversation ("" when none).
    pub fn conversation_label(&self) -> &str {
        &self.messages.header
    }

    fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_is_error = false;
    }

    fn set_error(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_is_error = true;
    }

    /// A request went through, so any earlier expiry no longer applies.
    fn session_restored(&mut self) {
        if self.session_ok {
            return;
        }
        self.session_ok = true;
        if self.status_message.as_deref() == Some(SESSION_EXPIRED) {
            self.status_message = None;
            self.status_is_error = false;
        }
    }

    fn store_error(&mut self, context: &str, err: StoreError) {
        tracing::warn!("{}: {}", context, err);
        if matches!(err, StoreError::Unauthorized(_)) {
            self.session_ok = false;
            self.set_error(SESSION_EXPIRED);
        } else {
            self.set_error(format!("{}: {}", context, err));
        }
    }

    fn open(&mut self, target: Target, label: String) -> Vec<Effect> {
        tracing::debug!("Opening {}", label);
        self.sidebar.active = Some(target.clone());
        self.sidebar.focus(&target, self.me);
        self.messages.open(label);
        vec![Effect::Open(target)]
    }

    fn open_fallback(&mut self) -> Vec<Effect> {
        match self.sidebar.fallback_channel() {
            Some((target, label)) => self.open(target, label),
            None => {
                self.sidebar.active = None;
                self.messages = MessagesState::default();
                Vec::new()
            }
        }
    }

    /// Handle a key press.
    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            self.should_exit = true;
            return Vec::new();
        }
        if self.show_help {
            self.show_help = false;
            return Vec::new();
        }
        if ctrl && key.code == KeyCode::Char('r') {
            return match self.sidebar.active {
                Some(_) => vec![Effect::Refresh],
                None => vec![Effect::Backend(BackendCommand::LoadChannels)],
            };
        }

        match key.code {
            KeyCode::Tab => {
                self.active_pane = self.active_pane.next();
                return Vec::new();
            }
            KeyCode::BackTab => {
                self.active_pane = self.active_pane.prev();
                return Vec::new();
            }
            _ => {}
        }

        match self.active_pane {
            Pane::Compose => self.handle_compose_key(key, ctrl),
            Pane::Sidebar | Pane::Messages => {
                match key.code {
                    KeyCode::Char('q') => {
                        self.should_exit = true;
                        return Vec::new();
                    }
                    KeyCode::Char('?') => {
                        self.show_help = true;
                        return Vec::new();
                    }
                    _ => {}
                }
                if self.active_pane == Pane::Sidebar {
                    self.handle_sidebar_key(key)
                } else {
                    self.handle_messages_key(key)
                }
            }
        }
    }

    fn handle_sidebar_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.sidebar.move_up(),
            KeyCode::Down | KeyCode::Char('j') => self.sidebar.move_down(),
            KeyCode::Enter => {
                if let Some((target, label)) = self.sidebar.selected_conversation(self.me) {
                    self.active_pane = Pane::Compose;
                    if self.sidebar.active.as_ref() != Some(&target) {
                        return self.open(target, label);
                    }
                }
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_messages_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.messages.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => self.messages.select_next(),
            KeyCode::Char('G') | KeyCode::End => self.messages.select_last(),
            KeyCode::Char('i') | KeyCode::Enter => self.active_pane = Pane::Compose,
            KeyCode::Char(c @ '1'..='3') => {
                let idx = (c as u8 - b'1') as usize;
                return self.toggle_reaction(QUICK_REACTIONS[idx]);
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_compose_key(&mut self, key: KeyEvent, ctrl: bool) -> Vec<Effect> {
        match key.code {
            KeyCode::Esc => self.active_pane = Pane::Messages,
            KeyCode::Enter => return self.send(),
            KeyCode::Backspace => self.compose.backspace(),
            KeyCode::Delete => self.compose.delete(),
            KeyCode::Left => self.compose.move_left(),
            KeyCode::Right => self.compose.move_right(),
            KeyCode::Home => self.compose.move_home(),
            KeyCode::End => self.compose.move_end(),
            KeyCode::Char('u') if ctrl => self.compose.clear(),
            KeyCode::Char(c) if !ctrl => self.compose.insert_char(c),
            _ => {}
        }
        Vec::new()
    }

    fn send(&mut self) -> Vec<Effect> {
        let Some(target) = self.sidebar.active.clone() else {
            self.set_error("Open a conversation first");
            return Vec::new();
        };
        match self.compose.take_message() {
            Some(body) => vec![Effect::Backend(BackendCommand::Send { target, body })],
            None => Vec::new(),
        }
    }

    /// Add `emoji` from the highlighted message, or remove it if already there.
    fn toggle_reaction(&mut self, emoji: &str) -> Vec<Effect> {
        let Some(msg) = self.messages.selected_message() else {
            return Vec::new();
        };
        let add = !msg.reactions.has_reacted(emoji, self.me);
        vec![Effect::Backend(BackendCommand::React {
            message_id: msg.id.clone(),
            emoji: emoji.to_string(),
            add,
        })]
    }

    /// Handle a notification from the sync task.
    pub fn on_sync_event(&mut self, event: SyncEvent) -> Vec<Effect> {
        match event {
            SyncEvent::Messages { target, messages, .. } => {
                self.session_restored();
                // Lists for a conversation we already left are stale.
                if self.sidebar.active.as_ref() == Some(&target) {
                    self.messages.replace(messages);
                }
                Vec::new()
            }
            SyncEvent::Unauthorized => {
                self.session_ok = false;
                self.set_error(SESSION_EXPIRED);
                Vec::new()
            }
            SyncEvent::TargetGone(target) => {
                if self.sidebar.active.as_ref() != Some(&target) {
                    return Vec::new();
                }
                self.set_error(format!("{} is no longer available", self.messages.header));
                if let Some(id) = target.channel_id() {
                    self.sidebar.channels.retain(|c| &c.id != id);
                    self.sidebar.clamp_selection();
                }
                let mut effects = self.open_fallback();
                effects.push(Effect::Backend(BackendCommand::LoadChannels));
                effects
            }
        }
    }

    /// Handle a backend response.
    pub fn on_backend(&mut self, resp: BackendResponse) -> Vec<Effect> {
        match resp {
            BackendResponse::Channels(Ok(channels)) => {
                self.session_restored();
                self.sidebar.update_channels(channels);
                match self.sidebar.active.clone() {
                    Some(active) if self.sidebar.contains(&active) => {
                        if let Some(label) = self.sidebar.label_for(&active, self.me) {
                            self.messages.header = label;
                        }
                        Vec::new()
                    }
                    _ => self.open_fallback(),
                }
            }
            BackendResponse::Channels(Err(e)) => {
                self.sidebar.loading = false;
                self.store_error("Could not load channels", e);
                Vec::new()
            }
            BackendResponse::Users(Ok(users)) => {
                self.sidebar.update_users(users);
                Vec::new()
            }
            BackendResponse::Users(Err(e)) => {
                self.store_error("Could not load people", e);
                Vec::new()
            }
            BackendResponse::Sent { target, result } => match result {
                Ok(_) => {
                    self.compose.sent();
                    if self.status_is_error {
                        self.status_message = None;
                    }
                    if self.sidebar.active.as_ref() == Some(&target) {
                        vec![Effect::Refresh]
                    } else {
                        Vec::new()
                    }
                }
                Err(e) => {
                    self.compose.send_failed();
                    self.store_error("Message not sent", e);
                    Vec::new()
                }
            },
            BackendResponse::Reacted(Ok(())) => vec![Effect::Refresh],
            BackendResponse::Reacted(Err(e)) => {
                self.store_error("Reaction failed", e);
                Vec::new()
            }
        }
    }
}

fn apply(effects: Vec<Effect>, sync: &SyncHandle, backend: &Backend) {
    for effect in effects {
        match effect {
            Effect::Open(target) => sync.select(target),
            Effect::Refresh => sync.refresh(),
            Effect::Backend(cmd) => backend.send(cmd),
        }
    }
}

/// Run the TUI against `store` until the user quits.
pub async fn run<S: RemoteStore>(
    store: Arc<S>,
    workspace: RecordId,
    user_name: String,
    poll_interval: Duration,
) -> Result<()> {
    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, store, workspace, user_name, poll_interval).await;
    ratatui::restore();
    result
}

async fn run_app<S: RemoteStore>(
    terminal: &mut DefaultTerminal,
    store: Arc<S>,
    workspace: RecordId,
    user_name: String,
    poll_interval: Duration,
) -> Result<()> {
    let mut app = App::new(store.current_user(), user_name, poll_interval);
    let mut backend = Backend::start(Arc::clone(&store), workspace);
    let mut sync = sync::spawn(SyncLoop::new(store, None), poll_interval);
    let mut events = EventStream::new();
    let mut clock = time::interval(CLOCK_TICK);

    apply(app.startup(), &sync, &backend);
    app.set_status("Loading channels...");

    while !app.should_exit {
        terminal.draw(|frame| ui::render(frame, &app))?;

        let effects = tokio::select! {
            ev = events.next() => match ev {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if !app.status_is_error {
                        app.status_message = None;
                    }
                    app.handle_key(key)
                }
                Some(Ok(_)) => Vec::new(),
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            Some(ev) = sync.recv() => app.on_sync_event(ev),
            Some(resp) = backend.recv() => {
                if matches!(resp, BackendResponse::Channels(Ok(_))) && !app.status_is_error {
                    app.status_message = None;
                }
                app.on_backend(resp)
            }
            _ = clock.tick() => Vec::new(),
        };
        apply(effects, &sync, &backend);
    }

    sync.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, Message, Reactions};
    use chrono::Utc;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn channel(id: i64, name: &str) -> Channel {
        Channel {
            id: RecordId::Int(id),
            workspace_id: RecordId::Int(1),
            name: name.to_string(),
            description: None,
            is_private: false,
            members: Default::default(),
        }
    }

    fn message(id: i64, target: &Target) -> Message {
        Message {
            id: RecordId::Int(id),
            author_id: Uuid::nil(),
            author_name: None,
            target: target.clone(),
            body: "hi".to_string(),
            created_at: Utc::now(),
            reactions: Reactions::default(),
        }
    }

    fn app_with_channels() -> (App, Vec<Effect>) {
        let mut app = App::new(Uuid::new_v4(), "me".into(), Duration::from_secs(5));
        let effects = app.on_backend(BackendResponse::Channels(Ok(vec![
            channel(1, "dev"),
            channel(2, "general"),
        ])));
        (app, effects)
    }

    #[test]
    fn test_first_channel_load_opens_general() {
        let (app, effects) = app_with_channels();
        let general = Target::Channel(RecordId::Int(2));
        assert_eq!(effects, vec![Effect::Open(general.clone())]);
        assert_eq!(app.sidebar.active, Some(general));
        assert_eq!(app.conversation_label(), "#general");
        assert!(app.messages.loading);
    }

    #[test]
    fn test_enter_in_sidebar_switches_conversation() {
        let (mut app, _) = app_with_channels();
        app.sidebar.selected = 1;
        let effects = app.handle_key(press(KeyCode::Enter));
        assert_eq!(effects, vec![Effect::Open(Target::Channel(RecordId::Int(1)))]);
        assert_eq!(app.active_pane, Pane::Compose);
        assert_eq!(app.conversation_label(), "#dev");
    }

    #[test]
    fn test_stale_lists_are_ignored() {
        let (mut app, _) = app_with_channels();
        let dev = Target::Channel(RecordId::Int(1));
        app.on_sync_event(SyncEvent::Messages {
            target: dev.clone(),
            messages: vec![message(1, &dev)].into(),
            seen_before: None,
        });
        assert!(app.messages.loading);
        assert!(app.messages.messages.is_empty());

        let general = Target::Channel(RecordId::Int(2));
        app.on_sync_event(SyncEvent::Messages {
            target: general.clone(),
            messages: vec![message(2, &general)].into(),
            seen_before: None,
        });
        assert!(!app.messages.loading);
        assert_eq!(app.messages.messages.len(), 1);
    }

    #[test]
    fn test_compose_enter_sends_and_refreshes() {
        let (mut app, _) = app_with_channels();
        app.active_pane = Pane::Compose;
        for c in "hey q".chars() {
            app.handle_key(press(KeyCode::Char(c)));
        }
        let effects = app.handle_key(press(KeyCode::Enter));
        let general = Target::Channel(RecordId::Int(2));
        assert_eq!(
            effects,
            vec![Effect::Backend(BackendCommand::Send {
                target: general.clone(),
                body: "hey q".to_string(),
            })]
        );
        // 'q' is text while composing.
        assert!(!app.should_exit);

        let sent = message(9, &general);
        let effects = app.on_backend(BackendResponse::Sent {
            target: general,
            result: Ok(sent),
        });
        assert_eq!(effects, vec![Effect::Refresh]);
        assert!(app.compose.input.is_empty());
    }

    #[test]
    fn test_failed_send_keeps_text() {
        let (mut app, _) = app_with_channels();
        app.active_pane = Pane::Compose;
        app.handle_key(press(KeyCode::Char('x')));
        app.handle_key(press(KeyCode::Enter));
        app.on_backend(BackendResponse::Sent {
            target: Target::Channel(RecordId::Int(2)),
            result: Err(StoreError::NetworkUnavailable("offline".into())),
        });
        assert_eq!(app.compose.input, "x");
        assert!(!app.compose.sending);
        assert!(app.status_is_error);
    }

    #[test]
    fn test_reaction_keys_toggle() {
        let (mut app, _) = app_with_channels();
        let general = Target::Channel(RecordId::Int(2));
        let mut m = message(5, &general);
        m.reactions.insert("👍", app.me);
        app.on_sync_event(SyncEvent::Messages {
            target: general,
            messages: vec![m].into(),
            seen_before: None,
        });
        app.active_pane = Pane::Messages;

        let effects = app.handle_key(press(KeyCode::Char('1')));
        assert_eq!(
            effects,
            vec![Effect::Backend(BackendCommand::React {
                message_id: RecordId::Int(5),
                emoji: "👍".to_string(),
                add: false,
            })]
        );
        let effects = app.handle_key(press(KeyCode::Char('2')));
        assert!(matches!(
            &effects[..],
            [Effect::Backend(BackendCommand::React { add: true, .. })]
        ));

        assert_eq!(
            app.on_backend(BackendResponse::Reacted(Ok(()))),
            vec![Effect::Refresh]
        );
    }

    #[test]
    fn test_unauthorized_shows_relogin_hint() {
        let (mut app, _) = app_with_channels();
        app.on_sync_event(SyncEvent::Unauthorized);
        assert!(!app.session_ok);
        assert_eq!(app.status_message.as_deref(), Some(SESSION_EXPIRED));
    }

    #[test]
    fn test_successful_poll_clears_expired_session() {
        let (mut app, _) = app_with_channels();
        app.on_sync_event(SyncEvent::Unauthorized);
        assert!(!app.session_ok);

        let general = Target::Channel(RecordId::Int(2));
        app.on_sync_event(SyncEvent::Messages {
            target: general.clone(),
            messages: vec![message(3, &general)].into(),
            seen_before: None,
        });
        assert!(app.session_ok);
        assert_eq!(app.status_message, None);
        assert!(!app.status_is_error);
    }

    #[test]
    fn test_restored_session_keeps_other_errors() {
        let (mut app, _) = app_with_channels();
        app.on_sync_event(SyncEvent::Unauthorized);
        app.set_error("Send failed: offline");

        let general = Target::Channel(RecordId::Int(2));
        app.on_sync_event(SyncEvent::Messages {
            target: general.clone(),
            messages: vec![message(3, &general)].into(),
            seen_before: None,
        });
        assert!(app.session_ok);
        assert_eq!(app.status_message.as_deref(), Some("Send failed: offline"));
    }

    #[test]
    fn test_deleted_channel_falls_back() {
        let (mut app, _) = app_with_channels();
        let general = Target::Channel(RecordId::Int(2));
        let effects = app.on_sync_event(SyncEvent::TargetGone(general));
        assert_eq!(
            effects,
            vec![
                Effect::Open(Target::Channel(RecordId::Int(1))),
                Effect::Backend(BackendCommand::LoadChannels),
            ]
        );
        assert_eq!(app.conversation_label(), "#dev");
        assert!(app.status_is_error);
    }

    #[test]
    fn test_quit_and_help() {
        let (mut app, _) = app_with_channels();
        app.handle_key(press(KeyCode::Char('?')));
        assert!(app.show_help);
        // Any key closes help without acting.
        app.handle_key(press(KeyCode::Char('q')));
        assert!(!app.show_help);
        assert!(!app.should_exit);
        app.handle_key(press(KeyCode::Char('q')));
        assert!(app.should_exit);
    }
}
