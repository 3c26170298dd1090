use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => app.scroll_chat_to_bottom(),
        AppEvent::Tick => app.tick_animation(),
    }
    app.poll_tasks().await;
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_model_picker {
        handle_model_picker(app, key);
        return;
    }

    // Any key dismisses a transient status message
    app.status_message = None;

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_model_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_model_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.model_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.model_picker_nav_up(),
        KeyCode::Enter => app.select_model(),
        KeyCode::Char('s') => app.save_default_model(),
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Tab => toggle_focus(app),
        KeyCode::Char('u') if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.focus = FocusPane::Uploader;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Char('m') => app.open_model_picker(),

        // Transcript scrolling
        KeyCode::Char('j') | KeyCode::Down => app.chat_scroll = app.chat_scroll.saturating_add(1),
        KeyCode::Char('k') | KeyCode::Up => app.chat_scroll = app.chat_scroll.saturating_sub(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.chat_scroll = app.chat_scroll.saturating_add(app.chat_height / 2);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.chat_scroll = app.chat_scroll.saturating_sub(app.chat_height / 2);
        }
        KeyCode::Char('g') => app.chat_scroll = 0,
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        _ => {}
    }
}

fn toggle_focus(app: &mut App) {
    app.focus = match app.focus {
        FocusPane::Uploader => FocusPane::Chat,
        FocusPane::Chat => FocusPane::Uploader,
    };
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            return;
        }
        KeyCode::Tab => {
            toggle_focus(app);
            return;
        }
        _ => {}
    }

    match app.focus {
        FocusPane::Chat => {
            // Input is disabled until the pending answer arrives
            if app.chat.is_loading() {
                return;
            }
            if key.code == KeyCode::Enter {
                app.submit_chat();
            } else {
                edit_line(&mut app.chat.input, &mut app.chat_cursor, key);
            }
        }
        FocusPane::Uploader => {
            if app.uploader.is_uploading() {
                return;
            }
            if key.code == KeyCode::Enter {
                app.start_upload();
            } else {
                edit_line(&mut app.upload_input, &mut app.upload_cursor, key);
            }
        }
    }
}

/// Single-line editing shared by both inputs.
fn edit_line(input: &mut String, cursor: &mut usize, key: KeyEvent) {
    let char_count = input.chars().count();
    *cursor = (*cursor).min(char_count);

    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < char_count {
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Left => *cursor = cursor.saturating_sub(1),
        KeyCode::Right => *cursor = (*cursor + 1).min(char_count),
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = char_count,
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            input.clear();
            *cursor = 0;
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(input, *cursor);
            input.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    match app.focus {
        FocusPane::Uploader if !app.uploader.is_uploading() => app.paste_into_upload(text),
        FocusPane::Chat if !app.chat.is_loading() => {
            let flat: String = text.chars().map(|c| if c == '\n' { ' ' } else { c }).collect();
            let byte_pos = char_to_byte_index(&app.chat.input, app.chat_cursor);
            app.chat.input.insert_str(byte_pos, &flat);
            app.chat_cursor += flat.chars().count();
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown if in_chat => {
            app.chat_scroll = app.chat_scroll.saturating_add(3);
        }
        MouseEventKind::ScrollUp if in_chat => {
            app.chat_scroll = app.chat_scroll.saturating_sub(3);
        }
        MouseEventKind::Down(_) => {
            let in_uploader = app
                .uploader_area
                .map(|r| point_in_rect(mouse.column, mouse.row, r))
                .unwrap_or(false);
            if in_uploader {
                app.focus = FocusPane::Uploader;
            } else if in_chat {
                app.focus = FocusPane::Chat;
            }
        }
        _ => {}
    }
}
