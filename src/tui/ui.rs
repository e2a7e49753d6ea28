//! UI rendering for the TUI

use chrono::Utc;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::app::{App, Pane};
use super::compose;
use super::help;
use super::messages;
use super::sidebar;

/// Status indicator symbol and color for the session state.
fn status_indicator(ok: bool) -> (&'static str, Color) {
    if ok {
        ("*", Color::Green)
    } else {
        ("o", Color::Red)
    }
}

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), app);

    let [sidebar_area, content_area] =
        Layout::horizontal([Constraint::Length(24), Constraint::Fill(1)]).areas(main_area);

    sidebar::render(
        sidebar_area,
        frame.buffer_mut(),
        &app.sidebar,
        app.me,
        app.active_pane == Pane::Sidebar,
    );

    let [messages_area, compose_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(compose::COMPOSE_HEIGHT),
    ])
    .areas(content_area);

    messages::render(
        messages_area,
        frame.buffer_mut(),
        &app.messages,
        app.me,
        Utc::now(),
        app.active_pane == Pane::Messages,
    );

    compose::render(
        compose_area,
        frame,
        &app.compose,
        app.conversation_label(),
        app.active_pane == Pane::Compose,
    );

    render_status(status_area, frame.buffer_mut(), app);

    if app.show_help {
        help::render_help_popup(frame);
    }
}

fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let title = " slack-sync";
    let (symbol, color) = status_indicator(app.session_ok);
    let presence = if app.session_ok { "online" } else { "signed out" };

    let right = format!("[?] Help  {} {}  {} ", symbol, presence, app.user_name);
    let padding = (area.width as usize).saturating_sub(title.width() + right.width());

    let line = Line::from(vec![
        Span::styled(
            title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled("[?] Help ", Style::default().fg(Color::Gray)),
        Span::styled(format!(" {} {} ", symbol, presence), Style::default().fg(color)),
        Span::styled(format!(" {} ", app.user_name), Style::default().fg(Color::Cyan)),
    ]);

    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    if let Some(ref msg) = app.status_message {
        let style = if app.status_is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        Paragraph::new(Line::from(Span::styled(format!(" {} ", msg), style)))
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    let (symbol, color) = status_indicator(app.session_ok);
    let sync_state = if app.session_ok && app.sidebar.active.is_some() {
        format!(" {} Syncing every {}s ", symbol, app.poll_interval.as_secs())
    } else if app.session_ok {
        format!(" {} Idle ", symbol)
    } else {
        format!(" {} Paused ", symbol)
    };

    let sep = Span::styled(" | ", Style::default().fg(Color::Gray));
    let conversation = if app.conversation_label().is_empty() {
        "(none)".to_string()
    } else {
        app.conversation_label().to_string()
    };

    let line = Line::from(vec![
        Span::styled(sync_state, Style::default().fg(color)),
        sep.clone(),
        Span::styled(conversation, Style::default().fg(Color::Yellow)),
        sep.clone(),
        Span::styled(
            format!("Tab: {} ", app.active_pane.as_str()),
            Style::default().fg(Color::Cyan),
        ),
        sep,
        Span::styled("?: help", Style::default().fg(Color::Gray)),
    ]);

    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}
