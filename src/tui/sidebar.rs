//! Sidebar widget: joined channels, then direct-message contacts.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use uuid::Uuid;

use crate::api::channels::GENERAL_CHANNEL;
use crate::models::{Channel, Target, UserProfile};

/// Sidebar state: owns the data and tracks navigation.
pub struct SidebarState {
    pub channels: Vec<Channel>,
    pub users: Vec<UserProfile>,
    /// Index into the flat item list (0-based)
    pub selected: usize,
    /// Conversation currently open in the messages pane.
    pub active: Option<Target>,
    /// Whether the channel list is still loading.
    pub loading: bool,
}

impl Default for SidebarState {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            users: Vec::new(),
            selected: 0,
            active: None,
            loading: true,
        }
    }
}

/// One row in the sidebar's flat list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebarItem {
    /// "CHANNELS" header (not selectable)
    ChannelsHeader,
    /// Index into `SidebarState.channels`
    Channel(usize),
    /// "DIRECT MESSAGES" separator (not selectable)
    DirectHeader,
    /// Index into `SidebarState.users`
    Direct(usize),
}

impl SidebarItem {
    fn is_header(self) -> bool {
        matches!(self, SidebarItem::ChannelsHeader | SidebarItem::DirectHeader)
    }
}

impl SidebarState {
    pub fn update_channels(&mut self, channels: Vec<Channel>) {
        self.channels = channels;
        self.loading = false;
        self.clamp_selection();
    }

    pub fn update_users(&mut self, users: Vec<UserProfile>) {
        self.users = users;
        self.clamp_selection();
    }

    /// Build a flat list of items in display order.
    pub fn flat_items(&self) -> Vec<SidebarItem> {
        let mut items = vec![SidebarItem::ChannelsHeader];
        items.extend((0..self.channels.len()).map(SidebarItem::Channel));
        items.push(SidebarItem::DirectHeader);
        items.extend((0..self.users.len()).map(SidebarItem::Direct));
        items
    }

    /// Conversation and label for a row.
    fn conversation_at(&self, item: SidebarItem, me: Uuid) -> Option<(Target, String)> {
        match item {
            SidebarItem::Channel(i) => {
                let c = self.channels.get(i)?;
                Some((Target::Channel(c.id.clone()), format!("#{}", c.name)))
            }
            SidebarItem::Direct(i) => {
                let u = self.users.get(i)?;
                Some((Target::direct(me, u.id), u.label().to_string()))
            }
            SidebarItem::ChannelsHeader | SidebarItem::DirectHeader => None,
        }
    }

    /// Conversation under the cursor.
    pub fn selected_conversation(&self, me: Uuid) -> Option<(Target, String)> {
        let item = *self.flat_items().get(self.selected)?;
        self.conversation_at(item, me)
    }

    /// Label for `target` if it is listed.
    pub fn label_for(&self, target: &Target, me: Uuid) -> Option<String> {
        self.flat_items()
            .into_iter()
            .filter_map(|item| self.conversation_at(item, me))
            .find(|(t, _)| t == target)
            .map(|(_, label)| label)
    }

    /// Move the cursor onto `target`'s row if it is listed.
    pub fn focus(&mut self, target: &Target, me: Uuid) {
        let items = self.flat_items();
        if let Some(pos) = items
            .iter()
            .position(|item| matches!(self.conversation_at(*item, me), Some((t, _)) if &t == target))
        {
            self.selected = pos;
        }
    }

    /// Channel to land on when nothing else is open: `#general`, else the
    /// first joined channel.
    pub fn fallback_channel(&self) -> Option<(Target, String)> {
        self.channels
            .iter()
            .find(|c| c.name == GENERAL_CHANNEL)
            .or_else(|| self.channels.first())
            .map(|c| (Target::Channel(c.id.clone()), format!("#{}", c.name)))
    }

    /// Whether `target` is still one of the listed channels. DMs always are.
    pub fn contains(&self, target: &Target) -> bool {
        match target {
            Target::Channel(id) => self.channels.iter().any(|c| &c.id == id),
            Target::Direct(_) => true,
        }
    }

    pub fn move_up(&mut self) {
        let items = self.flat_items();
        let mut i = self.selected;
        while i > 0 {
            i -= 1;
            if !items[i].is_header() {
                self.selected = i;
                return;
            }
        }
    }

    pub fn move_down(&mut self) {
        let items = self.flat_items();
        let mut i = self.selected;
        while i + 1 < items.len() {
            i += 1;
            if !items[i].is_header() {
                self.selected = i;
                return;
            }
        }
    }

    /// Clamp the selection after the lists change and step off headers.
    pub fn clamp_selection(&mut self) {
        let items = self.flat_items();
        if self.selected >= items.len() {
            self.selected = items.len().saturating_sub(1);
        }
        if items.get(self.selected).is_some_and(|i| i.is_header()) {
            if let Some(pos) = items.iter().position(|i| !i.is_header()) {
                self.selected = pos;
            }
        }
    }
}

/// Render the sidebar into the given area.
pub fn render(area: Rect, buf: &mut Buffer, state: &SidebarState, me: Uuid, focused: bool) {
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let border_type = if focused {
        BorderType::Double
    } else {
        BorderType::Plain
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if state.loading && state.channels.is_empty() {
        let line = Line::from(Span::styled(" Loading...", Style::default().fg(Color::DarkGray)));
        Paragraph::new(line).render(Rect::new(inner.x, inner.y, inner.width, 1), buf);
        return;
    }

    let items = state.flat_items();
    let height = inner.height as usize;
    let scroll = compute_scroll_offset(state.selected, height, items.len());

    for (row, idx) in (scroll..items.len()).take(height).enumerate() {
        let row_area = Rect::new(inner.x, inner.y + row as u16, inner.width, 1);
        let selected = idx == state.selected;
        render_item(buf, row_area, items[idx], state, me, selected, focused);
    }
}

/// Keep the selected item visible.
fn compute_scroll_offset(selected: usize, height: usize, total: usize) -> usize {
    if total <= height || selected < height {
        return 0;
    }
    selected
        .saturating_sub(height - 1)
        .min(total.saturating_sub(height))
}

fn item_style(selected: bool, active: bool) -> Style {
    if selected {
        Style::default()
            .fg(Color::White)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    } else if active {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    }
}

fn render_item(
    buf: &mut Buffer,
    area: Rect,
    item: SidebarItem,
    state: &SidebarState,
    me: Uuid,
    selected: bool,
    pane_focused: bool,
) {
    let header_style = Style::default()
        .fg(Color::White)
        .add_modifier(Modifier::BOLD);
    let cursor = if selected { "\u{25BA}" } else { " " };
    let active = state
        .conversation_at(item, me)
        .is_some_and(|(t, _)| state.active.as_ref() == Some(&t));

    match item {
        SidebarItem::ChannelsHeader => {
            let label = if pane_focused { ">> CHANNELS" } else { "   CHANNELS" };
            render_row(buf, area, label, "", header_style, header_style);
        }
        SidebarItem::Channel(i) => {
            let c = &state.channels[i];
            let icon = if c.is_private { "*" } else { "#" };
            let label = format!("{}{} {}", cursor, icon, c.name);
            let style = item_style(selected, active);
            render_row(buf, area, &label, "", style, style);
        }
        SidebarItem::DirectHeader => {
            let prefix = " -- DIRECT ";
            let dashes = (area.width as usize).saturating_sub(prefix.len());
            let label = format!("{}{}", prefix, "-".repeat(dashes));
            let style = Style::default().fg(Color::DarkGray);
            render_row(buf, area, &label, "", style, style);
        }
        SidebarItem::Direct(i) => {
            let u = &state.users[i];
            let label = format!("{}@ {}", cursor, u.label());
            let online = u.status.as_deref() == Some("online");
            let badge = if online { "*" } else { "" };
            let style = item_style(selected, active);
            let bstyle = if online {
                Style::default().fg(Color::Green)
            } else {
                style
            };
            render_row(buf, area, &label, badge, style, bstyle);
        }
    }
}

/// Render a row with left-aligned text and an optional right-aligned badge.
fn render_row(
    buf: &mut Buffer,
    area: Rect,
    left: &str,
    badge: &str,
    text_style: Style,
    badge_style: Style,
) {
    let width = area.width as usize;
    if width == 0 {
        return;
    }

    let badge_len = badge.chars().count();
    let max_left = if badge_len > 0 {
        width.saturating_sub(badge_len + 1)
    } else {
        width
    };
    let left_truncated: String = left.chars().take(max_left).collect();
    let left_len = left_truncated.chars().count();
    let pad = width.saturating_sub(left_len + badge_len);

    let line = Line::from(vec![
        Span::styled(left_truncated, text_style),
        Span::styled(" ".repeat(pad), text_style),
        Span::styled(badge.to_string(), badge_style),
    ]);
    Paragraph::new(line).render(area, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordId;

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

    fn user(name: &str) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            username: name.to_string(),
            display_name: None,
            avatar_url: None,
            status: None,
        }
    }

    fn state() -> SidebarState {
        let mut s = SidebarState::default();
        s.update_channels(vec![channel(1, "dev"), channel(2, "general")]);
        s.update_users(vec![user("alex"), user("sarah")]);
        s
    }

    #[test]
    fn test_selection_skips_headers() {
        let mut s = state();
        // Header at 0 is stepped over on load.
        assert_eq!(s.selected, 1);
        s.move_up();
        assert_eq!(s.selected, 1);

        s.move_down();
        s.move_down();
        // Skipped the DIRECT header at index 3.
        assert_eq!(s.flat_items()[s.selected], SidebarItem::Direct(0));
        s.move_down();
        s.move_down();
        assert_eq!(s.flat_items()[s.selected], SidebarItem::Direct(1));
    }

    #[test]
    fn test_selected_conversation_builds_targets() {
        let me = Uuid::new_v4();
        let mut s = state();
        assert_eq!(
            s.selected_conversation(me),
            Some((Target::Channel(RecordId::Int(1)), "#dev".to_string()))
        );

        s.selected = 4;
        let alex = s.users[0].id;
        assert_eq!(
            s.selected_conversation(me),
            Some((Target::direct(alex, me), "alex".to_string()))
        );
    }

    #[test]
    fn test_fallback_prefers_general() {
        let s = state();
        assert_eq!(
            s.fallback_channel().map(|(_, l)| l),
            Some("#general".to_string())
        );

        let mut s = SidebarState::default();
        s.update_channels(vec![channel(9, "ops")]);
        assert_eq!(s.fallback_channel().map(|(_, l)| l), Some("#ops".to_string()));

        assert!(SidebarState::default().fallback_channel().is_none());
    }

    #[test]
    fn test_focus_and_contains() {
        let me = Uuid::new_v4();
        let mut s = state();
        let general = Target::Channel(RecordId::Int(2));
        s.focus(&general, me);
        assert_eq!(s.selected, 2);
        assert!(s.contains(&general));
        assert!(!s.contains(&Target::Channel(RecordId::Int(99))));
        assert_eq!(s.label_for(&general, me).as_deref(), Some("#general"));
    }
}
