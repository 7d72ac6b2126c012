use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use collection_tree::view::Modifiers;

use crate::app::{App, AppMode};

/// Handle a key event.
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return;
    }
    match app.mode {
        AppMode::Normal => handle_normal_key(app, key),
        AppMode::Filter | AppMode::Prompt(_) => handle_input_key(app, key),
    }
}

fn handle_normal_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_previous(),
        KeyCode::Char('J') => app.extend_selection(true),
        KeyCode::Char('K') => app.extend_selection(false),
        KeyCode::Char('g') | KeyCode::Home => app.select_first(),
        KeyCode::Char('G') | KeyCode::End => app.select_last(),
        KeyCode::Char('l') | KeyCode::Right | KeyCode::Enter => app.expand_selected(),
        KeyCode::Char('h') | KeyCode::Left => app.collapse_selected(),
        KeyCode::Char(' ') => app.select_at_cursor(Modifiers::NONE),
        KeyCode::Char('x') => app.select_at_cursor(Modifiers::CTRL),
        KeyCode::Char('/') => app.start_filter(),
        KeyCode::Char('n') => app.start_new_group(),
        KeyCode::Char('f') => app.start_new_folder(),
        KeyCode::Char('r') => app.start_rename(),
        KeyCode::Char('D') | KeyCode::Delete => app.delete_selected(),
        KeyCode::Char('m') => app.begin_drag(),
        KeyCode::Char('p') => app.drop_at_cursor(),
        KeyCode::Char('s') => app.save(),
        KeyCode::Char('o') => app.cycle_sort(),
        KeyCode::Esc => {
            if app.drag.is_some() {
                app.cancel_drag();
            } else {
                app.collection.clear_selection();
            }
        }
        _ => {}
    }
}

fn handle_input_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_input(),
        KeyCode::Enter => app.submit_input(),
        KeyCode::Backspace => app.input_backspace(),
        KeyCode::Left => app.input.move_left(),
        KeyCode::Right => app.input.move_right(),
        KeyCode::Home => app.input.home(),
        KeyCode::End => app.input.end(),
        KeyCode::Char(c) => app.input_char(c),
        _ => {}
    }
}

/// Handle a mouse event. `tree_area` is where the tree was last drawn.
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent, tree_area: Rect) {
    if app.mode != AppMode::Normal {
        return;
    }
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            // Rows start one line below the border.
            let top = tree_area.y + 1;
            let bottom = tree_area.y + tree_area.height.saturating_sub(1);
            if mouse.row < top || mouse.row >= bottom {
                return;
            }
            let modifiers = Modifiers {
                shift: mouse.modifiers.contains(KeyModifiers::SHIFT),
                ctrl: mouse.modifiers.contains(KeyModifiers::CONTROL),
            };
            app.click_row((mouse.row - top) as usize, modifiers);
        }
        MouseEventKind::ScrollDown => app.select_next(),
        MouseEventKind::ScrollUp => app.select_previous(),
        _ => {}
    }
}
