use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    widgets::{Block, Borders},
    Frame,
};

use crate::app::{App, AppMode};
use crate::components::status_bar::StatusBarWidget;
use crate::components::tree::TreeWidget;
use crate::theme::Palette;

/// Render the application UI. Returns the area the tree was drawn in.
pub fn render(app: &mut App, frame: &mut Frame, palette: &Palette) -> Rect {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());
    let (tree_area, status_area) = (chunks[0], chunks[1]);

    // Keep the cursor row inside the bordered area.
    app.clamp_cursor();
    app.update_scroll(tree_area.height.saturating_sub(2) as usize);

    let title = match app.library_path.as_ref().and_then(|p| p.file_name()) {
        Some(name) => format!(" {} ", name.to_string_lossy()),
        None => " collection ".to_string(),
    };
    let filter = app.collection.filter().to_string();
    let (cursor, scroll_offset) = (app.cursor, app.scroll_offset);
    let dragging = app.drag.as_ref().map(|d| d.source().to_vec()).unwrap_or_default();

    let (store, view, selection) = app.collection.view_parts();
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border_fg));
    let tree = TreeWidget::new(store, view.flat(), selection, palette)
        .cursor(cursor, scroll_offset)
        .dragging(&dragging)
        .block(block);
    frame.render_widget(tree, tree_area);

    let path = view
        .get(cursor)
        .and_then(|item| store.full_path(item.id))
        .unwrap_or_default()
        .to_string();
    let mut info = format!("{} shown", view.len());
    if !selection.is_empty() {
        info.push_str(&format!(" | {} selected", selection.len()));
    }
    if !dragging.is_empty() {
        info.push_str(&format!(" | dragging {}", dragging.len()));
    }
    if !filter.is_empty() {
        info.push_str(&format!(" | filter \"{filter}\""));
    }

    let mut status = StatusBarWidget::new(&path, &info, palette);
    let prompt_title = match app.mode {
        AppMode::Normal => None,
        AppMode::Filter => Some("Filter"),
        AppMode::Prompt(kind) => Some(kind.title()),
    };
    if let Some(title) = prompt_title {
        status = status.prompt(title, &app.input.input);
    } else if let Some(msg) = &app.status_message {
        status = status.status_message(&msg.text, msg.is_error);
    }
    frame.render_widget(status, status_area);

    tree_area
}
