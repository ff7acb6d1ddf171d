use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use crate::app::{App, InputMode, Role};

/// Style **bold** segments in an agent reply line. Anything unmatched is kept
/// as literal text.
fn style_reply_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;
    let mut bold = false;

    while let Some(idx) = rest.find("**") {
        let (head, tail) = rest.split_at(idx);
        if !head.is_empty() {
            spans.push(if bold {
                Span::styled(
                    head.to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                )
            } else {
                Span::raw(head.to_string())
            });
        }
        bold = !bold;
        rest = &tail[2..];
    }

    if !rest.is_empty() {
        if bold {
            // Opening ** without a close, keep it literal
            spans.push(Span::raw(format!("**{}", rest)));
        } else {
            spans.push(Span::raw(rest.to_string()));
        }
    } else if bold {
        spans.push(Span::raw("**".to_string()));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, transcript, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(4),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.selector.visible {
        render_agent_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let agent_indicator = if app.selected_agent.is_empty() {
        Span::styled(" [no agent] ", Style::default().fg(Color::Red))
    } else {
        Span::styled(
            format!(" [{}] ", app.selected_agent),
            Style::default().fg(Color::Green),
        )
    };

    let title = Line::from(vec![
        Span::styled(" ACP Chat ", Style::default().fg(Color::Cyan).bold()),
        agent_indicator,
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store transcript dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");

    let chat_text = if app.messages.is_empty() && !app.is_sending() {
        let placeholder = if app.selected_agent.is_empty() {
            "Press 'a' to select an agent.".to_string()
        } else {
            format!("Start a conversation with {}!", app.selected_agent)
        };
        Text::from(Span::styled(
            placeholder,
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();
        let agent_label = if app.selected_agent.is_empty() {
            "Agent:".to_string()
        } else {
            format!("{}:", app.selected_agent)
        };

        for msg in &app.messages {
            match msg.role {
                Role::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(Line::from(line.to_string()));
                    }
                    lines.push(Line::default());
                }
                Role::Agent => {
                    lines.push(Line::from(Span::styled(
                        agent_label.clone(),
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(style_reply_line(line));
                    }
                    lines.push(Line::default());
                }
                Role::System => {
                    lines.push(Line::from(Span::styled(
                        "System:",
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(Line::from(Span::styled(
                            line.to_string(),
                            Style::default().fg(Color::Red),
                        )));
                    }
                    lines.push(Line::default());
                }
            }
        }

        if app.is_sending() {
            lines.push(Line::from(Span::styled(
                agent_label,
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let (border_color, title) = if app.is_sending() {
        (Color::DarkGray, " Message (waiting for reply...) ")
    } else if app.input_mode == InputMode::Editing {
        (Color::Yellow, " Message (Enter to send, Shift+Enter for newline) ")
    } else {
        (Color::DarkGray, " Message ('i' to type) ")
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;

    // Locate the cursor as (row, col) in character terms
    let rows: Vec<&str> = app.input.split('\n').collect();
    let mut cursor_row = 0usize;
    let mut cursor_col = app.cursor;
    for row in &rows {
        let len = row.chars().count();
        if cursor_col <= len {
            break;
        }
        cursor_col -= len + 1; // account for the newline
        cursor_row += 1;
    }

    // Keep the cursor's row and column inside the visible window
    let first_row = cursor_row.saturating_sub(inner_height.saturating_sub(1));
    let col_offset = if inner_width == 0 {
        0
    } else if cursor_col >= inner_width {
        cursor_col - inner_width + 1
    } else {
        0
    };

    let visible: Vec<Line> = rows
        .iter()
        .enumerate()
        .skip(first_row)
        .take(inner_height.max(1))
        .map(|(i, row)| {
            let skip = if i == cursor_row { col_offset } else { 0 };
            let text: String = row.chars().skip(skip).take(inner_width).collect();
            Line::from(text)
        })
        .collect();

    let input = Paragraph::new(visible)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    // Show cursor when editing
    if app.input_mode == InputMode::Editing && !app.selector.visible {
        let cursor_x = (cursor_col - col_offset) as u16;
        let cursor_y = (cursor_row - first_row) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + cursor_y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.input_mode {
        InputMode::Normal => " CHAT ",
        InputMode::Editing => " TYPE ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = if app.selector.visible {
        vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" nav ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" select ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ]
    } else {
        match app.input_mode {
            InputMode::Editing => vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" send ", label_style),
                Span::styled(" Shift+Enter ", key_style),
                Span::styled(" newline ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" scroll mode ", label_style),
            ],
            InputMode::Normal => vec![
                Span::styled(" i ", key_style),
                Span::styled(" type ", label_style),
                Span::styled(" j/k ", key_style),
                Span::styled(" scroll ", label_style),
                Span::styled(" a ", key_style),
                Span::styled(" agents ", label_style),
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ],
        }
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_agent_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 45.min(area.width.saturating_sub(4));
    let content_height = if app.selector.loading || app.selector.error.is_some() {
        4
    } else {
        app.selector.agents.len().max(1) as u16
    };
    let popup_height = (content_height + 2).min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    if app.selector.loading {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Select Agent ");
        let loading = Paragraph::new("Loading agents...")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(loading, popup_area);
        return;
    }

    // Discovery failure replaces the selector entirely, no retry offered
    if let Some(error) = &app.selector.error {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" Agent Discovery Failed ");
        let message = Paragraph::new(format!(
            "Error loading agents: {}\nRestart to try again.",
            error
        ))
        .style(Style::default().fg(Color::Red))
        .wrap(Wrap { trim: true })
        .block(block);
        frame.render_widget(message, popup_area);
        return;
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Agent (Enter to select, Esc to cancel) ");

    if app.selector.agents.is_empty() {
        let empty = Paragraph::new("No agents registered on the server.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, popup_area);
        return;
    }

    let items: Vec<ListItem> = app
        .selector
        .agents
        .iter()
        .map(|agent| {
            let is_current = *agent == app.selected_agent;
            let prefix = if is_current { "* " } else { "  " };
            let style = if is_current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!("{}{}", prefix, agent)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.selector.list_state);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn plain_text_passes_through_unstyled() {
        let line = style_reply_line("hello world");
        assert_eq!(line.spans.len(), 1);
        assert_eq!(plain_text(&line), "hello world");
    }

    #[test]
    fn bold_segments_are_styled() {
        let line = style_reply_line("a **bold** word");
        assert_eq!(plain_text(&line), "a bold word");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn unmatched_markers_stay_literal() {
        let line = style_reply_line("a **dangling tail");
        assert_eq!(plain_text(&line), "a **dangling tail");
        let line = style_reply_line("trailing**");
        assert_eq!(plain_text(&line), "trailing**");
    }

    #[test]
    fn empty_line_renders_empty() {
        let line = style_reply_line("");
        assert!(line.spans.is_empty());
    }
}
