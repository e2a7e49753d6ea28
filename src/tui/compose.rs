//! Compose box: single-line message input with a hint bar.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthStr;

/// Quick reactions, bound to keys 1..=3 in the messages pane.
pub const QUICK_REACTIONS: [&str; 3] = ["👍", "❤️", "😄"];

/// Height of the compose box: border + hint line + input line + border.
pub const COMPOSE_HEIGHT: u16 = 4;

/// State for the compose box.
#[derive(Default)]
pub struct ComposeState {
    pub input: String,
    /// Cursor position in characters.
    pub cursor_pos: usize,
    /// A send is in flight; the text is kept until it succeeds.
    pub sending: bool,
}

impl ComposeState {
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = self.char_to_byte(self.cursor_pos);
        self.input.insert(byte_pos, c);
        self.cursor_pos += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            let end = self.char_to_byte(self.cursor_pos);
            let start = self.char_to_byte(self.cursor_pos - 1);
            self.input.drain(start..end);
            self.cursor_pos -= 1;
        }
    }

    pub fn delete(&mut self) {
        if self.cursor_pos < self.input.chars().count() {
            let start = self.char_to_byte(self.cursor_pos);
            let end = self.char_to_byte(self.cursor_pos + 1);
            self.input.drain(start..end);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor_pos < self.input.chars().count() {
            self.cursor_pos += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_pos = self.input.chars().count();
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor_pos = 0;
    }

    /// Text to send, trimmed. `None` if blank or a send is already running.
    ///
    /// The input is left in place; call `sent()` once the store accepts it.
    pub fn take_message(&mut self) -> Option<String> {
        if self.sending {
            return None;
        }
        let text = self.input.trim();
        if text.is_empty() {
            return None;
        }
        self.sending = true;
        Some(text.to_string())
    }

    /// The pending send went through.
    pub fn sent(&mut self) {
        self.sending = false;
        self.clear();
    }

    /// The pending send failed; keep the text for another try.
    pub fn send_failed(&mut self) {
        self.sending = false;
    }

    fn char_to_byte(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

/// Render the compose box. Takes the frame so it can place the cursor.
pub fn render(
    area: Rect,
    frame: &mut Frame,
    state: &ComposeState,
    conversation: &str,
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
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    render_hints(Rect::new(inner.x, inner.y, inner.width, 1), frame.buffer_mut(), state, focused);

    if inner.height >= 2 {
        let input_area = Rect::new(inner.x, inner.y + 1, inner.width, 1);
        let display = display_text(&state.input, state.cursor_pos, input_area.width as usize);
        render_input(input_area, frame.buffer_mut(), state, &display, conversation);

        if focused {
            let x = input_area.x + 1 + display.cursor_offset as u16;
            frame.set_cursor_position((x, input_area.y));
        }
    }
}

fn render_hints(area: Rect, buf: &mut Buffer, state: &ComposeState, focused: bool) {
    let w = area.width as usize;
    let left = format!(
        " 1 {}  2 {}  3 {}  on a message",
        QUICK_REACTIONS[0], QUICK_REACTIONS[1], QUICK_REACTIONS[2]
    );
    let right = if state.sending { "sending... " } else { "Enter \u{27A4} " };

    let dim = Style::default().fg(Color::DarkGray);
    let right_style = if focused && !state.sending {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        dim
    };
    let padding = w.saturating_sub(left.width() + right.width());

    let line = Line::from(vec![
        Span::styled(left, dim),
        Span::raw(" ".repeat(padding)),
        Span::styled(right, right_style),
    ]);
    Paragraph::new(line).render(area, buf);
}

fn render_input(
    area: Rect,
    buf: &mut Buffer,
    state: &ComposeState,
    display: &DisplayText,
    conversation: &str,
) {
    let line = if state.input.is_empty() {
        let placeholder = format!(" Message {}", conversation);
        let truncated: String = placeholder.chars().take(area.width as usize).collect();
        Line::from(Span::styled(truncated, Style::default().fg(Color::DarkGray)))
    } else {
        Line::from(Span::styled(
            format!(" {}", display.visible),
            Style::default().fg(Color::White),
        ))
    };
    Paragraph::new(line).render(area, buf);
}

/// Visible slice of the input and the cursor column within it.
#[derive(Debug, PartialEq, Eq)]
struct DisplayText {
    visible: String,
    cursor_offset: usize,
}

/// Horizontal scrolling that keeps the cursor on screen. One column on the
/// left is reserved for padding.
fn display_text(input: &str, cursor_pos: usize, width: usize) -> DisplayText {
    let avail = width.saturating_sub(1);
    let chars: Vec<char> = input.chars().collect();
    if avail == 0 {
        return DisplayText {
            visible: String::new(),
            cursor_offset: 0,
        };
    }
    if chars.len() < avail {
        return DisplayText {
            visible: input.to_string(),
            cursor_offset: cursor_pos,
        };
    }
    let start = (cursor_pos + 1).saturating_sub(avail);
    let end = (start + avail).min(chars.len());
    DisplayText {
        visible: chars[start..end].iter().collect(),
        cursor_offset: cursor_pos - start,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(s: &str) -> ComposeState {
        let mut c = ComposeState::default();
        for ch in s.chars() {
            c.insert_char(ch);
        }
        c
    }

    #[test]
    fn test_editing_with_multibyte_chars() {
        let mut c = typed("héllo");
        c.move_left();
        c.move_left();
        c.backspace();
        assert_eq!(c.input, "hélo");
        c.move_home();
        c.delete();
        assert_eq!(c.input, "élo");
        c.move_end();
        c.insert_char('👍');
        assert_eq!(c.input, "élo👍");
        assert_eq!(c.cursor_pos, 4);
    }

    #[test]
    fn test_take_message_keeps_text_until_sent() {
        let mut c = typed("  hi there ");
        assert_eq!(c.take_message().as_deref(), Some("hi there"));
        // Second Enter while the first send is running is ignored.
        assert_eq!(c.take_message(), None);
        assert_eq!(c.input, "  hi there ");

        c.send_failed();
        assert_eq!(c.take_message().as_deref(), Some("hi there"));
        c.sent();
        assert!(c.input.is_empty());
        assert_eq!(c.cursor_pos, 0);
    }

    #[test]
    fn test_blank_input_is_not_sent() {
        let mut c = typed("   ");
        assert_eq!(c.take_message(), None);
        assert!(!c.sending);
    }

    #[test]
    fn test_display_scrolls_to_cursor() {
        let d = display_text("abc", 3, 10);
        assert_eq!(d.visible, "abc");
        assert_eq!(d.cursor_offset, 3);

        // width 5 leaves 4 columns; cursor at the end of 10 chars.
        let d = display_text("abcdefghij", 10, 5);
        assert_eq!(d.visible, "hij");
        assert_eq!(d.cursor_offset, 3);

        let d = display_text("abcdefghij", 0, 5);
        assert_eq!(d.visible, "abcd");
        assert_eq!(d.cursor_offset, 0);
    }
}
