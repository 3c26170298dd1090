use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use crate::app::{App, FocusPane, InputMode};
use crate::model::Model;
use crate::state::ChatRole;

/// Result lines kept visible under the upload input
const UPLOAD_STATUS_ROWS: u16 = 4;

/// Convert **bold** spans and `[file#chunk]` citation tokens to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let citation_style = Style::default().fg(Color::Magenta);
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                if !current_text.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current_text)));
                }
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else if c == '[' {
            let mut token = String::from("[");
            let mut closed = false;
            while let Some(c) = chars.next() {
                token.push(c);
                if c == ']' {
                    closed = true;
                    break;
                }
            }

            if closed && token.contains('#') {
                if !current_text.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current_text)));
                }
                spans.push(Span::styled(token, citation_style));
            } else {
                current_text.push_str(&token);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    // Uploader: input + status rows + borders
    let [uploader_area, chat_area] = Layout::vertical([
        Constraint::Length(3 + UPLOAD_STATUS_ROWS + 2),
        Constraint::Min(0),
    ])
    .areas(body_area);

    app.uploader_area = Some(uploader_area);
    app.chat_area = Some(chat_area);

    render_header(app, frame, header_area);
    render_uploader(app, frame, uploader_area);
    render_chat(app, frame, chat_area);
    render_footer(app, frame, footer_area);

    if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Personalized Resume Assistant ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("[{}] ", app.selected_model.display_name()),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled(app.base_url().to_string(), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.focus {
        FocusPane::Uploader => " UPLOAD ",
        FocusPane::Chat => " CHAT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = if app.show_model_picker {
        vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" nav ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" select ", label_style),
            Span::styled(" s ", key_style),
            Span::styled(" save default ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ]
    } else {
        match (app.input_mode, app.focus) {
            (InputMode::Editing, FocusPane::Chat) => vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" ask ", label_style),
                Span::styled(" Tab ", key_style),
                Span::styled(" upload ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" stop typing ", label_style),
            ],
            (InputMode::Editing, FocusPane::Uploader) => vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" upload ", label_style),
                Span::styled(" Tab ", key_style),
                Span::styled(" chat ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" stop typing ", label_style),
            ],
            (InputMode::Normal, _) => vec![
                Span::styled(" i ", key_style),
                Span::styled(" type ", label_style),
                Span::styled(" u ", key_style),
                Span::styled(" upload ", label_style),
                Span::styled(" j/k ", key_style),
                Span::styled(" scroll ", label_style),
                Span::styled(" m ", key_style),
                Span::styled(" model ", label_style),
                Span::styled(" Tab ", key_style),
                Span::styled(" focus ", label_style),
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ],
        }
    };

    if let Some(status) = &app.status_message {
        hints.push(Span::styled(format!("  {}", status), Style::default().fg(Color::Green)));
    }

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

fn render_uploader(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Uploader;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Upload resume or job description (PDF/DOCX/TXT) ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [input_area, status_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(inner);

    if app.uploader.is_uploading() {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        let current = app
            .uploader
            .in_flight()
            .map(crate::api::file_label)
            .unwrap_or_default();
        let caption = format!(
            "Uploading {}{} ({} queued)",
            current,
            dots,
            app.uploader.pending_count()
        );
        let busy = Paragraph::new(caption)
            .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC))
            .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
        frame.render_widget(busy, input_area);
    } else {
        let editing = focused && app.input_mode == InputMode::Editing;
        render_line_input(
            frame,
            input_area,
            " Files (space separated, quote paths with spaces) ",
            &app.upload_input,
            app.upload_cursor,
            editing,
        );
    }

    // Newest results last, only as many as fit
    let visible = status_area.height as usize;
    let lines = app.uploader.lines();
    let start = lines.len().saturating_sub(visible);
    let items: Vec<ListItem> = lines[start..]
        .iter()
        .map(|line| {
            let color = if line.starts_with("Upload failed") { Color::Red } else { Color::Green };
            ListItem::new(format!(" {}", line)).style(Style::default().fg(color))
        })
        .collect();

    frame.render_widget(List::new(items), status_area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let [history_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = history_area.height.saturating_sub(2);
    app.chat_width = history_area.width.saturating_sub(2);

    let focused = app.focus == FocusPane::Chat;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" Chat ({} turns) ", app.chat.messages().len()));

    let chat_text = if app.chat.messages().is_empty() && !app.chat.is_loading() {
        Text::from(Span::styled(
            "Ask about your resume or the JD...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in app.chat.messages() {
            match msg.role {
                ChatRole::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    lines.push(Line::from(msg.content.clone()));
                }
                ChatRole::Assistant => {
                    lines.push(Line::from(Span::styled(
                        "Assistant:",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(parse_markdown_line(line));
                    }
                }
            }
            lines.push(Line::default());
        }

        if app.chat.is_loading() {
            lines.push(Line::from(Span::styled(
                "Assistant:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, history_area);

    let title = if app.chat.is_loading() { " Thinking... " } else { " Ask " };
    let editing = focused && app.input_mode == InputMode::Editing && !app.chat.is_loading();
    render_line_input(frame, input_area, title, &app.chat.input, app.chat_cursor, editing);
}

/// Single-line input box that scrolls horizontally to keep the cursor visible
fn render_line_input(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    text: &str,
    cursor_pos: usize,
    editing: bool,
) {
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title.to_string());

    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = cursor_pos.min(text.chars().count());

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = text.chars().skip(scroll_offset).take(inner_width).collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let models = Model::all();

    // Calculate popup size and position (centered)
    let popup_width = 44.min(area.width.saturating_sub(4));
    let popup_height = (models.len() as u16 + 2).min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Model ");

    let items: Vec<ListItem> = models
        .iter()
        .map(|model| {
            let style = if *model == app.selected_model {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ({}) ", model.display_name(), model.as_str())).style(style)
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

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}
