//! Help popup overlay listing the key bindings.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const POPUP_WIDTH: u16 = 72;
const POPUP_HEIGHT: u16 = 20;

struct Shortcut {
    key: &'static str,
    desc: &'static str,
}

struct Category {
    title: &'static str,
    shortcuts: &'static [Shortcut],
}

const NAVIGATION: Category = Category {
    title: "NAVIGATION",
    shortcuts: &[
        Shortcut { key: "Tab", desc: "Next pane" },
        Shortcut { key: "Shift+Tab", desc: "Previous pane" },
        Shortcut { key: "Up/Down", desc: "Move within pane" },
        Shortcut { key: "Enter", desc: "Open conversation" },
        Shortcut { key: "G", desc: "Jump to newest" },
    ],
};

const MISC: Category = Category {
    title: "MISC",
    shortcuts: &[
        Shortcut { key: "Ctrl+R", desc: "Refresh now" },
        Shortcut { key: "q", desc: "Quit" },
        Shortcut { key: "Ctrl+C", desc: "Quit from anywhere" },
        Shortcut { key: "?", desc: "Toggle this help" },
    ],
};

const MESSAGING: Category = Category {
    title: "MESSAGING",
    shortcuts: &[
        Shortcut { key: "Enter", desc: "Send message" },
        Shortcut { key: "Esc", desc: "Leave compose box" },
        Shortcut { key: "Ctrl+U", desc: "Clear compose box" },
        Shortcut { key: "i", desc: "Start typing" },
    ],
};

const REACTIONS: Category = Category {
    title: "REACTIONS",
    shortcuts: &[
        Shortcut { key: "1", desc: "Toggle \u{1F44D}" },
        Shortcut { key: "2", desc: "Toggle \u{2764}\u{FE0F}" },
        Shortcut { key: "3", desc: "Toggle \u{1F604}" },
    ],
};

/// Render the help popup centered on screen.
pub fn render_help_popup(frame: &mut Frame) {
    let area = frame.area();
    let popup_area = centered_rect(
        POPUP_WIDTH.min(area.width.saturating_sub(2)),
        POPUP_HEIGHT.min(area.height.saturating_sub(2)),
        area,
    );

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(vec![
            Span::styled(
                " HELP ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("(? to close) ", Style::default().fg(Color::Gray)),
        ]));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let [left, right] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(inner);

    frame.render_widget(
        Paragraph::new(build_column_lines(&[&NAVIGATION, &MISC])),
        inset(left, 1, 1),
    );
    frame.render_widget(
        Paragraph::new(build_column_lines(&[&MESSAGING, &REACTIONS])),
        inset(right, 1, 1),
    );
}

fn build_column_lines(categories: &[&Category]) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (i, cat) in categories.iter().enumerate() {
        if i > 0 {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(Span::styled(
            cat.title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            "\u{2500}".repeat(30),
            Style::default().fg(Color::DarkGray),
        )));
        for sc in cat.shortcuts {
            lines.push(Line::from(vec![
                Span::styled(format!("{:<11}", sc.key), Style::default().fg(Color::Yellow)),
                Span::styled(sc.desc, Style::default().fg(Color::Gray)),
            ]));
        }
    }
    lines
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}

fn inset(area: Rect, h: u16, v: u16) -> Rect {
    Rect::new(
        area.x + h,
        area.y + v,
        area.width.saturating_sub(h * 2),
        area.height.saturating_sub(v * 2),
    )
}
