use std::collections::HashSet;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Widget},
};

use collection_tree::tree::{NodeId, NodeKind, TreeStore};
use collection_tree::view::{FlatItem, Selection};

use crate::theme::{appearance_fg, Palette};

/// Renders the flattened view with box-drawing guides.
pub struct TreeWidget<'a, T> {
    store: &'a TreeStore<T>,
    items: &'a [FlatItem],
    selection: &'a Selection,
    palette: &'a Palette,
    cursor: usize,
    scroll_offset: usize,
    dragging: HashSet<NodeId>,
    block: Option<Block<'a>>,
}

impl<'a, T> TreeWidget<'a, T> {
    pub fn new(
        store: &'a TreeStore<T>,
        items: &'a [FlatItem],
        selection: &'a Selection,
        palette: &'a Palette,
    ) -> Self {
        Self {
            store,
            items,
            selection,
            palette,
            cursor: 0,
            scroll_offset: 0,
            dragging: HashSet::new(),
            block: None,
        }
    }

    pub fn cursor(mut self, cursor: usize, scroll_offset: usize) -> Self {
        self.cursor = cursor;
        self.scroll_offset = scroll_offset;
        self
    }

    pub fn dragging(mut self, nodes: &[NodeId]) -> Self {
        self.dragging = nodes.iter().copied().collect();
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    /// Indentation guides for the item at `index`.
    ///
    /// Each ancestor level draws a continuation line unless that ancestor was
    /// the last of its siblings.
    fn build_prefix(items: &[FlatItem], index: usize) -> String {
        let item = &items[index];
        if item.depth == 0 {
            return String::new();
        }
        let mut prefix = String::new();
        for d in 1..item.depth {
            let ancestor_is_last = items[..index]
                .iter()
                .rev()
                .take_while(|i| i.depth >= d)
                .find(|i| i.depth == d)
                .is_some_and(|i| i.is_last_sibling);
            prefix.push_str(if ancestor_is_last { "   " } else { "│  " });
        }
        prefix.push_str(if item.is_last_sibling { "└──" } else { "├──" });
        prefix
    }

    fn indicator(&self, item: &FlatItem) -> String {
        let icon = self
            .store
            .get(item.id)
            .and_then(|n| n.container())
            .and_then(|c| c.appearance.icon.clone());
        let arrow = match (item.kind, item.is_open, item.has_children) {
            (NodeKind::Leaf, _, _) => "  ",
            (_, true, _) => "▾ ",
            (_, false, true) => "▸ ",
            (_, false, false) => "  ",
        };
        match (icon, item.kind) {
            (Some(icon), _) => format!("{arrow}{icon} "),
            (None, NodeKind::Group) => format!("{arrow}[G] "),
            (None, NodeKind::Folder) => format!("{arrow}[F] "),
            (None, NodeKind::Leaf) => format!("{arrow}· "),
        }
    }

    fn base_style(&self, item: &FlatItem) -> Style {
        let p = self.palette;
        let container = self.store.get(item.id).and_then(|n| n.container());
        let mut style = match item.kind {
            NodeKind::Group => Style::default()
                .fg(container.map_or(p.group_fg, |c| appearance_fg(&c.appearance, p.group_fg)))
                .add_modifier(Modifier::BOLD),
            NodeKind::Folder => Style::default()
                .fg(container.map_or(p.folder_fg, |c| appearance_fg(&c.appearance, p.folder_fg))),
            NodeKind::Leaf => Style::default().fg(p.leaf_fg),
        };
        if !item.is_match {
            // Shown only because something inside matched.
            style = style.add_modifier(Modifier::DIM);
        }
        style
    }
}

impl<'a, T> Widget for TreeWidget<'a, T> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner_area = if let Some(block) = &self.block {
            let inner = block.inner(area);
            block.clone().render(area, buf);
            inner
        } else {
            area
        };

        let visible_height = inner_area.height as usize;
        if self.items.is_empty() || visible_height == 0 {
            return;
        }

        let rows = self
            .items
            .iter()
            .enumerate()
            .skip(self.scroll_offset)
            .take(visible_height);
        for (row, (index, item)) in rows.enumerate() {
            let y = inner_area.y + row as u16;
            let is_selected = self.selection.is_selected(item.id);
            let is_dragged = self.dragging.contains(&item.id);

            let mut style = self.base_style(item);
            if is_selected {
                style = style.fg(self.palette.selected_fg);
            }
            if is_dragged {
                style = style.fg(self.palette.drag_fg).add_modifier(Modifier::ITALIC);
            }
            if index == self.cursor {
                style = style.bg(self.palette.cursor_bg).add_modifier(Modifier::BOLD);
            }

            let name = self.store.name(item.id).unwrap_or_default();
            let marker = if is_selected { "● " } else { "" };
            let mut spans = vec![
                Span::styled(
                    Self::build_prefix(self.items, index),
                    Style::default().fg(self.palette.border_fg),
                ),
                Span::styled(format!("{marker}{}{name}", self.indicator(item)), style),
            ];
            if item.is_match && !self.store.children(item.id).is_empty() && !item.is_open {
                let count = self.store.children(item.id).len();
                spans.push(Span::styled(
                    format!(" ({count})"),
                    Style::default().fg(self.palette.dim_fg),
                ));
            }

            buf.set_line(inner_area.x, y, &Line::from(spans), inner_area.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collection_tree::tree::Appearance;
    use collection_tree::view::{Modifiers, ViewCache};

    fn render_lines(widget: TreeWidget<'_, ()>, width: u16, height: u16) -> Vec<String> {
        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);
        (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| buf.cell((x, y)).map_or(" ", |c| c.symbol()).to_string())
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .collect()
    }

    /// Music{Rock[acdc, zeppelin]}, Films (closed, with one folder).
    fn sample() -> (TreeStore<()>, ViewCache) {
        let mut store = TreeStore::new().with_open_new_containers(true);
        let music = store.materialize_path("Music").1.unwrap();
        let films = store.materialize_path("Films").1.unwrap();
        let rock = store.find_or_create_folder(music, "Rock").1.unwrap();
        store.add_leaf(rock, "acdc", ());
        store.add_leaf(rock, "zeppelin", ());
        store.find_or_create_folder(films, "SciFi");
        store.set_open(films, false);
        let mut view = ViewCache::default();
        view.rebuild(&store);
        (store, view)
    }

    #[test]
    fn draws_guides_and_kinds() {
        let (store, view) = sample();
        let selection = Selection::new();
        let palette = Palette::default();
        let lines = render_lines(TreeWidget::new(&store, view.flat(), &selection, &palette), 40, 6);
        assert_eq!(lines[0], "▸ [G] Films (1)");
        assert_eq!(lines[1], "▾ [G] Music");
        assert_eq!(lines[2], "└──▾ [F] Rock");
        assert_eq!(lines[3], "   ├──  · acdc");
        assert_eq!(lines[4], "   └──  · zeppelin");
        assert_eq!(lines[5], "");
    }

    #[test]
    fn marks_selection_and_honours_scroll() {
        let (store, view) = sample();
        let mut selection = Selection::new();
        let acdc = view.get(3).unwrap().id;
        selection.select_item(&store, &view, acdc, Modifiers::NONE, true, true);
        let palette = Palette::default();
        let widget = TreeWidget::new(&store, view.flat(), &selection, &palette).cursor(3, 2);
        let lines = render_lines(widget, 40, 2);
        assert_eq!(lines[0], "└──▾ [F] Rock");
        assert!(lines[1].contains("● "));
        assert!(lines[1].ends_with("acdc"));
    }

    #[test]
    fn cursor_row_is_highlighted() {
        let (store, view) = sample();
        let selection = Selection::new();
        let palette = Palette::default();
        let widget = TreeWidget::new(&store, view.flat(), &selection, &palette).cursor(1, 0);
        let area = Rect::new(0, 0, 30, 3);
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);
        assert_eq!(buf.cell((0, 0)).unwrap().bg, ratatui::style::Color::Reset);
        assert_eq!(buf.cell((0, 1)).unwrap().bg, palette.cursor_bg);
    }

    #[test]
    fn appearance_icon_replaces_kind_tag() {
        let (mut store, mut view) = sample();
        let music = store.find("Music").unwrap();
        store.set_appearance(
            music,
            Appearance {
                icon: Some("♪".into()),
                ..Default::default()
            },
        );
        view.mark_dirty();
        view.rebuild(&store);
        let selection = Selection::new();
        let palette = Palette::default();
        let lines = render_lines(TreeWidget::new(&store, view.flat(), &selection, &palette), 40, 2);
        assert_eq!(lines[1], "▾ ♪ Music");
    }
}
