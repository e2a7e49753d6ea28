//! Messages pane: the open conversation as cards with reactions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthStr;
use uuid::Uuid;

use crate::models::{format_message_time, Message};

/// State for the messages pane.
pub struct MessagesState {
    /// Conversation label shown in the pane header ("#general", "Alex").
    pub header: String,
    /// Latest list from the sync task.
    pub messages: Arc<[Message]>,
    /// Index of the highlighted message.
    pub selected: usize,
    /// Vertical scroll offset in rendered lines.
    pub scroll_offset: usize,
    /// True until the first list for the open conversation arrives.
    pub loading: bool,
}

impl Default for MessagesState {
    fn default() -> Self {
        Self {
            header: String::new(),
            messages: Arc::from(Vec::new()),
            selected: 0,
            scroll_offset: 0,
            loading: false,
        }
    }
}

impl MessagesState {
    /// Clear the pane for a newly opened conversation.
    pub fn open(&mut self, header: String) {
        self.header = header;
        self.messages = Arc::from(Vec::new());
        self.selected = 0;
        self.scroll_offset = 0;
        self.loading = true;
    }

    /// Swap in a fresh list.
    ///
    /// The highlight follows the newest message when it was already on the
    /// last one; otherwise it stays on the same message id.
    pub fn replace(&mut self, messages: Arc<[Message]>) {
        let at_end = self.loading || self.selected + 1 >= self.messages.len();
        let selected_id = self.messages.get(self.selected).map(|m| m.id.clone());

        self.messages = messages;
        self.loading = false;

        let last = self.messages.len().saturating_sub(1);
        self.selected = if at_end {
            last
        } else {
            selected_id
                .and_then(|id| self.messages.iter().position(|m| m.id == id))
                .unwrap_or(last)
        };
    }

    pub fn selected_message(&self) -> Option<&Message> {
        self.messages.get(self.selected)
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.messages.len() {
            self.selected += 1;
        }
    }

    pub fn select_last(&mut self) {
        self.selected = self.messages.len().saturating_sub(1);
    }
}

/// Render the messages pane into the given area.
pub fn render(
    area: Rect,
    buf: &mut Buffer,
    state: &MessagesState,
    me: Uuid,
    now: DateTime<Utc>,
    focused: bool,
) {
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

    render_header(Rect::new(inner.x, inner.y, inner.width, 1), buf, &state.header);

    let body = Rect::new(
        inner.x,
        inner.y + 1,
        inner.width,
        inner.height.saturating_sub(1),
    );
    if body.height == 0 {
        return;
    }

    if state.header.is_empty() {
        placeholder(body, buf, " Select a channel or person to start");
        return;
    }
    if state.loading {
        placeholder(body, buf, " Loading...");
        return;
    }
    if state.messages.is_empty() {
        placeholder(body, buf, &format!(" No messages in {} yet", state.header));
        return;
    }

    let (lines, ranges) = build_message_lines(state, me, now, body.width as usize);
    let total = lines.len();
    let visible = body.height as usize;
    let scroll = compute_auto_scroll(state.scroll_offset, state.selected, &ranges, visible, total);

    for (row, idx) in (scroll..total).take(visible).enumerate() {
        let line_area = Rect::new(body.x, body.y + row as u16, body.width, 1);
        Paragraph::new(lines[idx].clone()).render(line_area, buf);
    }

    if total > visible {
        let x = body.x + body.width.saturating_sub(1);
        if scroll > 0 {
            let cell = &mut buf[(x, body.y)];
            cell.set_char('^');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
        if scroll + visible < total {
            let cell = &mut buf[(x, body.y + body.height.saturating_sub(1))];
            cell.set_char('v');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
    }
}

fn render_header(area: Rect, buf: &mut Buffer, header: &str) {
    let line = Line::from(Span::styled(
        format!(" {} ", header),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    ));
    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

fn placeholder(area: Rect, buf: &mut Buffer, text: &str) {
    let line = Line::from(Span::styled(text.to_string(), Style::default().fg(Color::DarkGray)));
    Paragraph::new(line).render(Rect::new(area.x, area.y, area.width, 1), buf);
}

/// Flat line buffer plus the line range each message occupies.
fn build_message_lines(
    state: &MessagesState,
    me: Uuid,
    now: DateTime<Utc>,
    width: usize,
) -> (Vec<Line<'static>>, Vec<(usize, usize)>) {
    let mut lines = Vec::new();
    let mut ranges = Vec::with_capacity(state.messages.len());

    for (idx, msg) in state.messages.iter().enumerate() {
        let start = lines.len();
        render_message_card(&mut lines, msg, me, now, width, idx == state.selected);
        lines.push(Line::from(""));
        ranges.push((start, lines.len()));
    }
    (lines, ranges)
}

fn render_message_card(
    lines: &mut Vec<Line<'static>>,
    msg: &Message,
    me: Uuid,
    now: DateTime<Utc>,
    width: usize,
    is_selected: bool,
) {
    let inner_width = width.saturating_sub(2);
    if inner_width < 10 {
        return;
    }
    let content_width = inner_width.saturating_sub(2);

    let border_style = if is_selected {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Gray)
    };
    let author_style = if msg.author_id == me {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    };
    let edge = format!("+-{}-+", "-".repeat(inner_width.saturating_sub(2)));

    lines.push(Line::from(Span::styled(edge.clone(), border_style)));

    let author = msg.author_label().to_string();
    let time = format_message_time(msg.created_at, now);
    let pad = content_width
        .saturating_sub(author.width())
        .saturating_sub(time.width());
    lines.push(Line::from(vec![
        Span::styled("| ".to_string(), border_style),
        Span::styled(author, author_style),
        Span::raw(" ".repeat(pad)),
        Span::styled(time, Style::default().fg(Color::DarkGray)),
        Span::styled(" |".to_string(), border_style),
    ]));

    for text in wrap_text(&msg.body, content_width) {
        let pad = content_width.saturating_sub(text.width());
        lines.push(Line::from(vec![
            Span::styled("| ".to_string(), border_style),
            Span::raw(format!("{}{}", text, " ".repeat(pad))),
            Span::styled(" |".to_string(), border_style),
        ]));
    }

    if !msg.reactions.is_empty() {
        let mut spans = vec![Span::styled("| ".to_string(), border_style)];
        let mut used = 0;
        for group in msg.reactions.groups() {
            let mine = group.user_ids.contains(&me);
            let text = format!("{} {}", group.emoji, group.user_ids.len());
            let style = if mine {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Yellow)
            };
            used += text.width() + 3;
            spans.push(Span::styled(text, style));
            spans.push(Span::raw("   "));
        }
        spans.push(Span::raw(" ".repeat(content_width.saturating_sub(used))));
        spans.push(Span::styled(" |".to_string(), border_style));
        lines.push(Line::from(spans));
    }

    lines.push(Line::from(Span::styled(edge, border_style)));
}

/// Word-wrap by display width. Explicit newlines are kept; a single word
/// wider than the line is split by characters.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    for line in text.lines() {
        if line.width() <= max_width {
            out.push(line.to_string());
            continue;
        }
        let mut current = String::new();
        for word in line.split_whitespace() {
            let sep = usize::from(!current.is_empty());
            if current.width() + sep + word.width() <= max_width {
                if sep == 1 {
                    current.push(' ');
                }
                current.push_str(word);
                continue;
            }
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            for ch in word.chars() {
                let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
                if current.width() + w > max_width {
                    out.push(std::mem::take(&mut current));
                }
                current.push(ch);
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
    if out.is_empty() {
        out.push(String::new());
    }
    out
}

/// Scroll offset that keeps the selected message visible.
fn compute_auto_scroll(
    current_scroll: usize,
    selected: usize,
    ranges: &[(usize, usize)],
    visible_height: usize,
    total_lines: usize,
) -> usize {
    if ranges.is_empty() || total_lines <= visible_height {
        return 0;
    }
    let Some(&(start, end)) = ranges.get(selected) else {
        return current_scroll;
    };

    let mut scroll = current_scroll;
    if end - start >= visible_height {
        scroll = start;
    } else {
        if start < scroll {
            scroll = start;
        }
        if end > scroll + visible_height {
            scroll = end - visible_height;
        }
    }
    scroll.min(total_lines - visible_height)
}
