use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::tree::node::{NodeId, NodeKind};
use crate::tree::store::TreeStore;
use crate::view::cache::ViewCache;

/// Modifier keys held during a selection gesture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
    };
    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
    };
    pub const CTRL: Modifiers = Modifiers {
        shift: false,
        ctrl: true,
    };
}

/// Set of selected nodes, with typed views for callers that need them.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    members: HashMap<NodeId, NodeKind>,
    /// Selection order.
    order: Vec<NodeId>,
    groups: Vec<NodeId>,
    folders: Vec<NodeId>,
    leaves: Vec<NodeId>,
    containers: Vec<NodeId>,
    /// Reference node for range and toggle gestures.
    anchor: Option<NodeId>,
    /// Node of the last plain click, for click-again-to-deselect.
    last_selected: Option<NodeId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` is in the selection.
    pub fn is_selected(&self, id: NodeId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Selected nodes in the order they were selected.
    pub fn ids(&self) -> &[NodeId] {
        &self.order
    }

    /// Selected groups, in selection order.
    pub fn groups(&self) -> &[NodeId] {
        &self.groups
    }

    pub fn folders(&self) -> &[NodeId] {
        &self.folders
    }

    /// Selected leaves, in selection order.
    pub fn leaves(&self) -> &[NodeId] {
        &self.leaves
    }

    /// Selected groups and folders.
    pub fn containers(&self) -> &[NodeId] {
        &self.containers
    }

    pub fn anchor(&self) -> Option<NodeId> {
        self.anchor
    }

    /// Node of the last plain click.
    pub fn last_selected(&self) -> Option<NodeId> {
        self.last_selected
    }

    /// Copy of the current selection, e.g. at drag start.
    pub fn snapshot(&self) -> Vec<NodeId> {
        self.order.clone()
    }

    /// Whether `id` is the one and only selected node and is a leaf.
    pub fn is_sole_selected_leaf(&self, id: NodeId) -> bool {
        self.order.len() == 1 && self.leaves.first() == Some(&id)
    }

    /// Deselect everything and forget the anchor.
    pub fn clear(&mut self) {
        self.members.clear();
        self.order.clear();
        self.groups.clear();
        self.folders.clear();
        self.leaves.clear();
        self.containers.clear();
        self.anchor = None;
        self.last_selected = None;
    }

    /// Apply a click on `node` under the given modifiers.
    ///
    /// - Shift with a usable anchor selects (or deselects) the whole visible
    ///   range between anchor and `node`, depending on whether `node` was
    ///   unselected (or selected) before the click.
    /// - Ctrl flips `node` and makes it the anchor.
    /// - Otherwise `node` becomes the only selected node; clicking it again
    ///   clears the selection.
    ///
    /// Returns whether anything was applied.
    pub fn select_item<T>(
        &mut self,
        store: &TreeStore<T>,
        view: &ViewCache,
        node: NodeId,
        modifiers: Modifiers,
        allow_multi_select: bool,
        allow_range_select: bool,
    ) -> bool {
        let Some(kind) = store.kind(node) else {
            return false;
        };
        if node == store.root() {
            return false;
        }

        if modifiers.shift && allow_range_select {
            if let Some(anchor) = self.anchor.filter(|a| *a != node) {
                if let (Some(a), Some(b)) = (view.index_of(anchor), view.index_of(node)) {
                    let (from, to) = if a <= b { (a, b) } else { (b, a) };
                    let selecting = !self.is_selected(node);
                    let range = &view.flat()[from..=to];
                    if selecting {
                        for item in range {
                            self.insert(item.id, item.kind);
                        }
                    } else {
                        self.remove_all(range.iter().map(|item| item.id));
                    }
                    debug!(from, to, selecting, "range selection");
                    return true;
                }
            }
        }

        if modifiers.ctrl && allow_multi_select {
            if self.is_selected(node) {
                self.remove_all([node]);
            } else {
                self.insert(node, kind);
            }
            self.anchor = Some(node);
            return true;
        }

        if self.order.len() == 1 && self.order[0] == node && self.last_selected == Some(node) {
            self.clear();
            return true;
        }
        self.clear();
        self.insert(node, kind);
        self.anchor = Some(node);
        self.last_selected = Some(node);
        true
    }

    /// Drop every selected node that no longer exists in `store`.
    ///
    /// Returns how many were dropped.
    pub fn retain_live<T>(&mut self, store: &TreeStore<T>) -> usize {
        let gone: Vec<NodeId> = self
            .order
            .iter()
            .copied()
            .filter(|id| !store.contains(*id))
            .collect();
        let dropped = self.remove_all(gone);
        if self.anchor.is_some_and(|a| !store.contains(a)) {
            self.anchor = None;
        }
        if self.last_selected.is_some_and(|l| !store.contains(l)) {
            self.last_selected = None;
        }
        dropped
    }

    fn insert(&mut self, id: NodeId, kind: NodeKind) {
        if self.members.insert(id, kind).is_some() {
            return;
        }
        self.order.push(id);
        match kind {
            NodeKind::Group => self.groups.push(id),
            NodeKind::Folder => self.folders.push(id),
            NodeKind::Leaf => self.leaves.push(id),
        }
        if kind.is_container() {
            self.containers.push(id);
        }
    }

    /// Deselect `ids`, sweeping each list once however many go.
    fn remove_all(&mut self, ids: impl IntoIterator<Item = NodeId>) -> usize {
        let gone: HashSet<NodeId> = ids
            .into_iter()
            .filter(|id| self.members.remove(id).is_some())
            .collect();
        if gone.is_empty() {
            return 0;
        }
        for list in [
            &mut self.order,
            &mut self.groups,
            &mut self.folders,
            &mut self.leaves,
            &mut self.containers,
        ] {
            list.retain(|i| !gone.contains(i));
        }
        gone.len()
    }
}
