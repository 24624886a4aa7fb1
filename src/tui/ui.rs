//! UI rendering for the operator console.

use ratatui::{
    prelude::*,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use super::app::OperatorApp;
use crate::bridge::Wait;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &OperatorApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(frame.area());

    // Left side: listing and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(3)])
        .split(chunks[0]);

    draw_listing(frame, left_chunks[0], app);
    draw_status(frame, left_chunks[1], app);

    // Right side: output, input and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(6),
            Constraint::Length(3),
            Constraint::Length(4),
        ])
        .split(chunks[1]);

    draw_output(frame, right_chunks[0], app);
    draw_input(frame, right_chunks[1], app);
    draw_help(frame, right_chunks[2]);
}

/// Program listing with the current boundary and breakpoints marked.
fn draw_listing(frame: &mut Frame, area: Rect, app: &OperatorApp) {
    let items: Vec<ListItem> = app
        .listing()
        .into_iter()
        .map(|(_, text, is_current, has_bp)| {
            let prefix = if is_current { "▶ " } else { "  " };
            let bp = if has_bp { "●" } else { " " };

            let style = if is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if has_bp {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{bp} {prefix}{text}")).style(style)
        })
        .collect();

    let list = List::new(items)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .block(
            Block::default()
                .title(" Program ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );

    let mut state = ListState::default().with_selected(Some(app.selected));
    frame.render_stateful_widget(list, area, &mut state);
}

/// Program output, newest at the bottom.
fn draw_output(frame: &mut Frame, area: Rect, app: &OperatorApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let skip = app.output.len().saturating_sub(visible_rows);
    let lines: Vec<Line> = app
        .output
        .iter()
        .skip(skip)
        .map(|line| Line::from(line.as_str()))
        .collect();

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title(" Output ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)),
    );

    frame.render_widget(paragraph, area);
}

/// Prompt for an awaited value.
fn draw_input(frame: &mut Frame, area: Rect, app: &OperatorApp) {
    let (title, content, style) = match app.waiting {
        Some(Wait::Value(kind)) => (
            format!(" {kind} "),
            format!("> {}_", app.input),
            Style::default().fg(Color::Yellow),
        ),
        _ => (
            " Input ".to_string(),
            String::new(),
            Style::default().fg(Color::DarkGray),
        ),
    };

    let input = Paragraph::new(content).style(style).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)),
    );

    frame.render_widget(input, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &OperatorApp) {
    let color = match app.waiting {
        Some(Wait::Resume { .. }) => Color::Yellow,
        Some(Wait::Value(_)) => Color::Magenta,
        None if app.finished => Color::Red,
        None => Color::White,
    };
    let status = Paragraph::new(app.status.as_str())
        .style(Style::default().fg(color))
        .block(Block::default().title(" Status ").borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  r: Run  p: Pause  b: Breakpoint"),
        Line::from("↑↓: Select line  Enter: Send value  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default().title(" Help ").borders(Borders::ALL));

    frame.render_widget(help, area);
}
