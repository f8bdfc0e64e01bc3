use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        // The input box re-measures itself against the new width
        AppEvent::Resize(_, _) => app.adjust_input_height(false),
        AppEvent::Tick => app.tick_animation(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_search {
        handle_search_key(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_search_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_search(),

        // Enter and Ctrl-n step forward, Ctrl-p steps back
        KeyCode::Enter | KeyCode::Down => {
            app.session.search_next();
            app.scroll_to_current_match();
        }
        KeyCode::Char('n') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.session.search_next();
            app.scroll_to_current_match();
        }
        KeyCode::Up => {
            app.session.search_prev();
            app.scroll_to_current_match();
        }
        KeyCode::Char('p') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.session.search_prev();
            app.scroll_to_current_match();
        }

        KeyCode::Backspace => {
            app.session.pop_search_char();
            app.scroll_to_current_match();
        }
        KeyCode::Char(c) => {
            app.session.push_search_char(c);
            app.scroll_to_current_match();
        }
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Back into the input box
        KeyCode::Char('i') | KeyCode::Char('a') => {
            app.input_mode = InputMode::Editing;
            app.draft_cursor = app.session.draft.chars().count();
        }

        // Search
        KeyCode::Char('/') => app.open_search(),
        KeyCode::Char('n') => {
            app.session.search_next();
            app.scroll_to_current_match();
        }
        KeyCode::Char('N') => {
            app.session.search_prev();
            app.scroll_to_current_match();
        }

        // Transcript scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_chat_down(app.chat_height / 2);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_chat_up(app.chat_height / 2);
        }
        KeyCode::Char('g') => app.chat_scroll = 0,
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        // Session actions
        KeyCode::Char('c') => app.clear(),
        KeyCode::Char('e') => app.export_transcript(),
        KeyCode::Char('t') => app.toggle_theme(),
        KeyCode::Char('m') => app.toggle_sound(),

        // Quick questions
        KeyCode::Char(c @ '1'..='4') => {
            let index = (c as usize) - ('1' as usize);
            app.quick_question(index);
        }

        // Dismiss the error banner, then the status line
        KeyCode::Esc => {
            if app.session.last_error.is_some() {
                app.session.dismiss_error();
            } else {
                app.status = None;
            }
        }

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }

        // Alt-Enter inserts a line break; plain Enter sends
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => {
            let byte_pos = char_to_byte_index(&app.session.draft, app.draft_cursor);
            app.session.draft.insert(byte_pos, '\n');
            app.draft_cursor += 1;
            app.adjust_input_height(false);
        }
        KeyCode::Enter => app.submit(),

        KeyCode::Backspace => {
            if app.draft_cursor > 0 {
                app.draft_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.session.draft, app.draft_cursor);
                app.session.draft.remove(byte_pos);
                app.adjust_input_height(false);
            }
        }
        KeyCode::Delete => {
            let char_count = app.session.draft.chars().count();
            if app.draft_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.session.draft, app.draft_cursor);
                app.session.draft.remove(byte_pos);
                app.adjust_input_height(false);
            }
        }
        KeyCode::Left => {
            app.draft_cursor = app.draft_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.session.draft.chars().count();
            app.draft_cursor = (app.draft_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.draft_cursor = 0;
        }
        KeyCode::End => {
            app.draft_cursor = app.session.draft.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.session.draft, app.draft_cursor);
            app.session.draft.insert(byte_pos, c);
            app.draft_cursor += 1;
            app.adjust_input_height(false);
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

    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_chat_down(3),
        MouseEventKind::ScrollUp => app.scroll_chat_up(3),
        _ => {}
    }
}
