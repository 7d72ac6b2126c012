use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use collection_tree::collection::Collection;
use collection_tree::config::AppConfig;
use collection_tree::error::{AppError, Result};
use collection_tree::library::Library;
use collection_tree::transfer::DragSession;
use collection_tree::tree::{NodeId, NodeKind, Outcome, SortKey, Sorter};
use collection_tree::view::Modifiers;

/// What a text prompt will do once submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Rename(NodeId),
    NewGroup { parent: NodeId },
    NewFolder { parent: NodeId },
}

impl PromptKind {
    pub fn title(&self) -> &'static str {
        match self {
            PromptKind::Rename(_) => "Rename",
            PromptKind::NewGroup { .. } => "New group",
            PromptKind::NewFolder { .. } => "New folder",
        }
    }
}

/// Application mode.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum AppMode {
    #[default]
    Normal,
    /// Typing into the filter; the view follows every keystroke.
    Filter,
    Prompt(PromptKind),
}

/// Single-line text input with a byte cursor.
#[derive(Debug, Default)]
pub struct InputState {
    pub input: String,
    pub cursor_position: usize,
}

impl InputState {
    fn with_text(text: &str) -> Self {
        Self {
            input: text.to_string(),
            cursor_position: text.len(),
        }
    }

    pub fn insert_char(&mut self, c: char) {
        self.input.insert(self.cursor_position, c);
        self.cursor_position += c.len_utf8();
    }

    /// Backspace.
    pub fn delete_char(&mut self) {
        if let Some(prev) = self.input[..self.cursor_position].chars().next_back() {
            self.cursor_position -= prev.len_utf8();
            self.input.remove(self.cursor_position);
        }
    }

    pub fn move_left(&mut self) {
        if let Some(prev) = self.input[..self.cursor_position].chars().next_back() {
            self.cursor_position -= prev.len_utf8();
        }
    }

    pub fn move_right(&mut self) {
        if let Some(next) = self.input[self.cursor_position..].chars().next() {
            self.cursor_position += next.len_utf8();
        }
    }

    pub fn home(&mut self) {
        self.cursor_position = 0;
    }

    pub fn end(&mut self) {
        self.cursor_position = self.input.len();
    }
}

#[derive(Debug)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
    pub created: Instant,
}

/// Main application state.
pub struct App {
    pub collection: Collection<String>,
    pub library_path: Option<PathBuf>,
    /// Index into the flattened view.
    pub cursor: usize,
    pub scroll_offset: usize,
    pub mode: AppMode,
    pub input: InputState,
    pub drag: Option<DragSession>,
    pub status_message: Option<StatusMessage>,
    pub should_quit: bool,
}

impl App {
    pub fn new(collection: Collection<String>) -> Self {
        Self {
            collection,
            library_path: None,
            cursor: 0,
            scroll_offset: 0,
            mode: AppMode::Normal,
            input: InputState::default(),
            drag: None,
            status_message: None,
            should_quit: false,
        }
    }

    /// Build the app from config, opening `library` when it exists.
    ///
    /// A missing library file starts an empty tree that `save` will create.
    pub fn from_config(config: &AppConfig, library: Option<&Path>) -> Result<Self> {
        let mut app = Self::new(Collection::from_config(config));
        if let Some(path) = library {
            if path.exists() {
                let outcome = app.open_library(path)?;
                app.report(outcome, "open library");
            } else {
                app.library_path = Some(path.to_path_buf());
                app.set_status_message(format!("New library: {}", path.display()), false);
            }
        }
        Ok(app)
    }

    pub fn open_library(&mut self, path: &Path) -> Result<Outcome> {
        let mut library = Library::load(path)?;
        let shape = library.shape.clone();
        let outcome = self.collection.restore(&shape, &mut library);
        self.library_path = Some(path.to_path_buf());
        self.cursor = 0;
        self.scroll_offset = 0;
        self.drag = None;
        Ok(outcome)
    }

    pub fn save_library(&mut self) -> Result<()> {
        let path = self
            .library_path
            .clone()
            .ok_or_else(|| AppError::InvalidPath("no library file to save to".into()))?;
        Library::capture(self.collection.store()).save(&path)
    }

    pub fn set_status_message(&mut self, text: String, is_error: bool) {
        self.status_message = Some(StatusMessage {
            text,
            is_error,
            created: Instant::now(),
        });
    }

    /// Clear the status message if it has been displayed for more than 3 seconds.
    pub fn clear_expired_status(&mut self) {
        if let Some(msg) = &self.status_message {
            if msg.created.elapsed().as_secs() > 3 {
                self.status_message = None;
            }
        }
    }

    /// Show the result of a tree operation. Failures show as errors.
    pub fn report(&mut self, outcome: Outcome, context: &str) {
        match outcome.check(context) {
            Ok(outcome) => self.set_status_message(format!("{context}: {}", outcome.label()), false),
            Err(err) => self.set_status_message(err.to_string(), true),
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    // ── Cursor ──────────────────────────────────────────────────────────────

    pub fn visible_len(&mut self) -> usize {
        self.collection.view().len()
    }

    pub fn cursor_node(&mut self) -> Option<NodeId> {
        let cursor = self.cursor;
        self.collection.view().get(cursor).map(|item| item.id)
    }

    pub fn clamp_cursor(&mut self) {
        let len = self.visible_len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    /// Put the cursor on `id` if it is visible.
    pub fn focus(&mut self, id: NodeId) {
        if let Some(index) = self.collection.view().index_of(id) {
            self.cursor = index;
        } else {
            self.clamp_cursor();
        }
    }

    pub fn select_next(&mut self) {
        let len = self.visible_len();
        if len > 0 && self.cursor < len - 1 {
            self.cursor += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn select_first(&mut self) {
        self.cursor = 0;
    }

    pub fn select_last(&mut self) {
        self.cursor = self.visible_len().saturating_sub(1);
    }

    /// Keep the cursor row inside the visible window.
    pub fn update_scroll(&mut self, visible_height: usize) {
        if visible_height == 0 {
            return;
        }
        if self.cursor < self.scroll_offset {
            self.scroll_offset = self.cursor;
        } else if self.cursor >= self.scroll_offset + visible_height {
            self.scroll_offset = self.cursor - visible_height + 1;
        }
    }

    // ── Open state ──────────────────────────────────────────────────────────

    pub fn expand_selected(&mut self) {
        if let Some(node) = self.cursor_node() {
            self.collection.apply(|s| s.set_open(node, true));
        }
    }

    /// Close the container under the cursor, or jump to its parent when it is
    /// a leaf or already closed.
    pub fn collapse_selected(&mut self) {
        let Some(node) = self.cursor_node() else {
            return;
        };
        let store = self.collection.store();
        let is_open = store.get(node).is_some_and(|n| n.is_open());
        let parent = store.parent(node).filter(|p| *p != store.root());
        if is_open {
            self.collection.apply(|s| s.set_open(node, false));
            self.focus(node);
        } else if let Some(parent) = parent {
            self.focus(parent);
        }
    }

    /// Switch the container under the cursor (a leaf's folder) to the next
    /// sort key.
    pub fn cycle_sort(&mut self) {
        let cursor = self.cursor_node();
        let store = self.collection.store();
        let container = match cursor {
            Some(id) if store.kind(id) == Some(NodeKind::Leaf) => {
                store.parent(id).unwrap_or_else(|| store.root())
            }
            Some(id) => id,
            None => store.root(),
        };
        let current = store
            .get(container)
            .and_then(|n| n.container())
            .and_then(|c| c.sorter.steps().first().map(|step| step.key))
            .unwrap_or(SortKey::Name);
        let next = current.next();
        let outcome = self
            .collection
            .apply(|s| s.set_sorter(container, Sorter::by(next)));
        if outcome.is_success() {
            self.set_status_message(format!("Sort: {}", next.label()), false);
        } else {
            self.report(outcome, "sort");
        }
        if let Some(id) = cursor {
            self.focus(id);
        }
    }

    // ── Selection ───────────────────────────────────────────────────────────

    pub fn select_at_cursor(&mut self, modifiers: Modifiers) {
        if let Some(node) = self.cursor_node() {
            self.collection.select(node, modifiers);
        }
    }

    /// Move the cursor by one row and range-select up to it.
    pub fn extend_selection(&mut self, down: bool) {
        if self.collection.selection().anchor().is_none() {
            self.select_at_cursor(Modifiers::NONE);
        }
        if down {
            self.select_next();
        } else {
            self.select_previous();
        }
        self.select_at_cursor(Modifiers::SHIFT);
    }

    /// Click on a row of the tree, counted from the first visible row.
    pub fn click_row(&mut self, row: usize, modifiers: Modifiers) {
        let index = self.scroll_offset + row;
        if index < self.visible_len() {
            self.cursor = index;
            self.select_at_cursor(modifiers);
        }
    }

    // ── Prompts and filter ──────────────────────────────────────────────────

    pub fn start_filter(&mut self) {
        self.input = InputState::with_text(self.collection.filter());
        self.mode = AppMode::Filter;
    }

    pub fn start_rename(&mut self) {
        let Some(node) = self.cursor_node() else {
            return;
        };
        let name = self.collection.store().name(node).unwrap_or_default().to_string();
        self.input = InputState::with_text(&name);
        self.mode = AppMode::Prompt(PromptKind::Rename(node));
    }

    pub fn start_new_group(&mut self) {
        let parent = self.nearest_group();
        self.input = InputState::default();
        self.mode = AppMode::Prompt(PromptKind::NewGroup { parent });
    }

    pub fn start_new_folder(&mut self) {
        let parent = self.nearest_group();
        self.input = InputState::default();
        self.mode = AppMode::Prompt(PromptKind::NewFolder { parent });
    }

    pub fn input_char(&mut self, c: char) {
        self.input.insert_char(c);
        self.after_input_edit();
    }

    pub fn input_backspace(&mut self) {
        self.input.delete_char();
        self.after_input_edit();
    }

    fn after_input_edit(&mut self) {
        if self.mode == AppMode::Filter {
            self.collection.set_filter(&self.input.input);
            self.clamp_cursor();
        }
    }

    /// Leave the current prompt. Cancelling the filter clears it.
    pub fn cancel_input(&mut self) {
        if self.mode == AppMode::Filter {
            self.collection.set_filter("");
            self.clamp_cursor();
        }
        self.mode = AppMode::Normal;
        self.input = InputState::default();
    }

    pub fn submit_input(&mut self) {
        let mode = std::mem::take(&mut self.mode);
        let text = std::mem::take(&mut self.input).input;
        let AppMode::Prompt(kind) = mode else {
            return;
        };
        match kind {
            PromptKind::Rename(node) => {
                let outcome = self.collection.apply(|s| s.rename(node, &text));
                self.report(outcome, "rename");
                self.focus(node);
            }
            PromptKind::NewGroup { parent } => {
                let (outcome, id) = self.collection.apply(|s| s.create_group(parent, &text));
                self.report(outcome, "new group");
                self.reveal(parent, id);
            }
            PromptKind::NewFolder { parent } => {
                let (outcome, id) = self
                    .collection
                    .apply(|s| s.find_or_create_folder(parent, &text));
                self.report(outcome, "new folder");
                self.reveal(parent, id);
            }
        }
    }

    /// Open `parent` and move the cursor to a freshly created child.
    fn reveal(&mut self, parent: NodeId, child: Option<NodeId>) {
        if let Some(child) = child {
            self.collection.apply(|s| s.set_open(parent, true));
            self.focus(child);
        }
    }

    /// The group under the cursor, or the group holding it.
    fn nearest_group(&mut self) -> NodeId {
        let cursor = self.cursor_node();
        let store = self.collection.store();
        cursor
            .into_iter()
            .flat_map(|id| std::iter::once(id).chain(store.ancestors(id)))
            .find(|id| store.kind(*id) == Some(NodeKind::Group))
            .unwrap_or_else(|| store.root())
    }

    // ── Structural edits ────────────────────────────────────────────────────

    /// Delete the selection, or the node under the cursor when nothing is
    /// selected.
    pub fn delete_selected(&mut self) {
        let mut targets = self.collection.selection().snapshot();
        if targets.is_empty() {
            targets.extend(self.cursor_node());
        }
        if targets.is_empty() {
            return;
        }
        let outcome = self.collection.apply(|s| {
            let mut steps = Vec::with_capacity(targets.len());
            for id in &targets {
                // Already gone with an earlier target.
                if !s.contains(*id) {
                    continue;
                }
                steps.push(s.delete(*id));
            }
            Outcome::aggregate(steps)
        });
        debug!(count = targets.len(), ?outcome, "deleted nodes");
        self.report(outcome, "delete");
        self.clamp_cursor();
    }

    /// Start dragging the selection, or the node under the cursor.
    pub fn begin_drag(&mut self) {
        let drag = match self.collection.begin_drag() {
            Some(drag) => Some(drag),
            None => self
                .cursor_node()
                .map(|id| DragSession::from_nodes(vec![id])),
        };
        match drag {
            Some(drag) => {
                let count = drag.source().len();
                self.drag = Some(drag);
                self.set_status_message(format!("Dragging {count} item(s), p to drop"), false);
            }
            None => self.set_status_message("Nothing to drag".into(), true),
        }
    }

    /// Drop the current drag onto the node under the cursor.
    pub fn drop_at_cursor(&mut self) {
        let Some(target) = self.cursor_node() else {
            return;
        };
        let Some(drag) = self.drag.take() else {
            self.set_status_message("No drag in progress".into(), true);
            return;
        };
        match self.collection.drop_on(&drag, target) {
            Ok(report) => {
                info!(steps = report.steps.len(), outcome = ?report.outcome, "drop finished");
                self.report(report.outcome, "drop");
                self.focus(target);
            }
            Err(rejection) => self.set_status_message(format!("Drop rejected: {rejection}"), true),
        }
    }

    pub fn cancel_drag(&mut self) {
        if self.drag.take().is_some() {
            self.set_status_message("Drag cancelled".into(), false);
        }
    }

    pub fn save(&mut self) {
        match self.save_library() {
            Ok(()) => self.set_status_message("Library saved".into(), false),
            Err(err) => self.set_status_message(err.to_string(), true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LIBRARY: &str = r#"{
        "GroupHierarchy": { "Media": "Media" },
        "FolderParents": { "Rock": "Media", "Jazz": "Media" },
        "OpenedCollections": ["Media", "Rock", "Jazz"],
        "folders": {
            "Rock": ["acdc", "zeppelin"],
            "Jazz": ["miles"]
        }
    }"#;

    fn setup_app() -> (TempDir, App) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("library.json");
        std::fs::write(&path, LIBRARY).unwrap();
        let app = App::from_config(&AppConfig::default(), Some(&path)).unwrap();
        (dir, app)
    }

    fn names(app: &mut App) -> Vec<String> {
        let ids: Vec<NodeId> = app.collection.view().flat().iter().map(|i| i.id).collect();
        ids.iter()
            .map(|id| app.collection.store().name(*id).unwrap().to_string())
            .collect()
    }

    fn cursor_name(app: &mut App) -> String {
        let id = app.cursor_node().unwrap();
        app.collection.store().name(id).unwrap().to_string()
    }

    #[test]
    fn opens_library_sorted_by_name() {
        let (_dir, mut app) = setup_app();
        assert_eq!(
            names(&mut app),
            vec!["Media", "Jazz", "miles", "Rock", "acdc", "zeppelin"]
        );
        assert!(!app.status_message.as_ref().unwrap().is_error);
    }

    #[test]
    fn cursor_moves_and_clamps() {
        let (_dir, mut app) = setup_app();
        app.select_previous();
        assert_eq!(app.cursor, 0);
        app.select_last();
        assert_eq!(app.cursor, 5);
        app.select_next();
        assert_eq!(app.cursor, 5);
        app.select_first();
        assert_eq!(cursor_name(&mut app), "Media");
    }

    #[test]
    fn collapse_then_jump_to_parent() {
        let (_dir, mut app) = setup_app();
        app.cursor = 2; // miles
        app.collapse_selected();
        assert_eq!(cursor_name(&mut app), "Jazz");
        app.collapse_selected();
        assert_eq!(cursor_name(&mut app), "Jazz");
        assert_eq!(names(&mut app), vec!["Media", "Jazz", "Rock", "acdc", "zeppelin"]);
        app.expand_selected();
        assert_eq!(app.visible_len(), 6);
    }

    #[test]
    fn cycle_sort_reorders_leaf_folder() {
        let (_dir, mut app) = setup_app();
        app.cursor = 4; // acdc
        app.cycle_sort();
        let rock = app.collection.store().find("Rock").unwrap();
        let sorter = &app.collection.store().get(rock).unwrap().container().unwrap().sorter;
        assert_eq!(sorter.steps()[0].key, SortKey::Kind);
        assert_eq!(app.status_message.as_ref().unwrap().text, "Sort: Kind");
        assert_eq!(cursor_name(&mut app), "acdc");
    }

    #[test]
    fn extend_selection_selects_range() {
        let (_dir, mut app) = setup_app();
        app.cursor = 3; // Rock
        app.extend_selection(true);
        app.extend_selection(true);
        assert_eq!(app.collection.selection().len(), 3);
        assert_eq!(cursor_name(&mut app), "zeppelin");
    }

    #[test]
    fn filter_mode_narrows_view_and_cancel_restores() {
        let (_dir, mut app) = setup_app();
        app.start_filter();
        for c in "zep".chars() {
            app.input_char(c);
        }
        assert_eq!(names(&mut app), vec!["Media", "Rock", "zeppelin"]);
        app.cancel_input();
        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(app.visible_len(), 6);
    }

    #[test]
    fn rename_reports_collision() {
        let (_dir, mut app) = setup_app();
        app.cursor = 1; // Jazz
        app.start_rename();
        assert_eq!(app.input.input, "Jazz");
        for _ in 0..4 {
            app.input_backspace();
        }
        for c in "Rock".chars() {
            app.input_char(c);
        }
        app.submit_input();
        let msg = app.status_message.as_ref().unwrap();
        assert!(msg.is_error);
        assert!(msg.text.contains("already exists"));
    }

    #[test]
    fn new_group_lands_under_nearest_group() {
        let (_dir, mut app) = setup_app();
        app.cursor = 4; // acdc
        app.start_new_group();
        for c in "Live".chars() {
            app.input_char(c);
        }
        app.submit_input();
        let live = app.collection.store().find("Live").unwrap();
        assert_eq!(app.collection.store().full_path(live), Some("Media//Live"));
        assert_eq!(cursor_name(&mut app), "Live");
    }

    #[test]
    fn drag_leaf_onto_other_folder() {
        let (_dir, mut app) = setup_app();
        app.cursor = 2; // miles
        app.select_at_cursor(Modifiers::NONE);
        app.begin_drag();
        assert!(app.drag.is_some());
        app.cursor = 3; // Rock
        app.drop_at_cursor();
        assert!(app.drag.is_none());
        let rock = app.collection.store().find("Rock").unwrap();
        assert!(app.collection.store().find_leaf(rock, "miles").is_some());
    }

    #[test]
    fn dropping_group_on_folder_is_rejected() {
        let (_dir, mut app) = setup_app();
        app.begin_drag(); // Media under the cursor
        app.cursor = 3;
        app.drop_at_cursor();
        let msg = app.status_message.as_ref().unwrap();
        assert!(msg.is_error);
        assert!(msg.text.starts_with("Drop rejected"));
    }

    #[test]
    fn delete_selection_prunes_view() {
        let (_dir, mut app) = setup_app();
        app.cursor = 4;
        app.select_at_cursor(Modifiers::NONE);
        app.cursor = 5;
        app.select_at_cursor(Modifiers::CTRL);
        app.delete_selected();
        assert!(app.collection.selection().is_empty());
        assert_eq!(names(&mut app), vec!["Media", "Jazz", "miles", "Rock"]);
        assert_eq!(app.cursor, 3);
    }

    #[test]
    fn save_round_trips_library() {
        let (dir, mut app) = setup_app();
        app.cursor = 2;
        app.select_at_cursor(Modifiers::NONE);
        app.begin_drag();
        app.cursor = 3;
        app.drop_at_cursor();
        app.save();
        assert!(!app.status_message.as_ref().unwrap().is_error);

        let saved = Library::load(&dir.path().join("library.json")).unwrap();
        assert_eq!(
            saved.folders.get("Rock").unwrap(),
            &vec!["acdc".to_string(), "zeppelin".to_string(), "miles".to_string()]
        );
        assert!(saved.folders.get("Jazz").unwrap().is_empty());
    }

    #[test]
    fn save_without_path_is_error() {
        let mut app = App::new(Collection::default());
        app.save();
        assert!(app.status_message.as_ref().unwrap().is_error);
    }

    #[test]
    fn missing_library_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("new.json");
        let mut app = App::from_config(&AppConfig::default(), Some(&path)).unwrap();
        assert_eq!(app.visible_len(), 0);
        assert_eq!(app.library_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn input_cursor_editing() {
        let mut input = InputState::with_text("héllo");
        input.home();
        input.move_right();
        input.move_right();
        input.delete_char();
        assert_eq!(input.input, "hllo");
        input.move_left();
        input.move_left();
        assert_eq!(input.cursor_position, 0);
        input.delete_char();
        assert_eq!(input.input, "hllo");
        input.end();
        input.insert_char('!');
        assert_eq!(input.input, "hllo!");
    }
}
