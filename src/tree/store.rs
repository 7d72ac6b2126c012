use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, info, warn};

use crate::tree::change::{ChangeKind, TreeChange};
use crate::tree::node::{
    join_path, normalize_name, Appearance, Container, Node, NodeBody, NodeId, NodeKind,
    GROUP_SEPARATOR, ROOT_NAME,
};
use crate::tree::outcome::Outcome;
use crate::tree::sorter::Sorter;

/// How far container-name uniqueness reaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NameScope {
    /// Group and folder names are unique across the whole tree.
    #[default]
    Global,
    /// Names only need to be unique among siblings.
    Sibling,
}

impl NameScope {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Some(NameScope::Global),
            "sibling" | "siblings" => Some(NameScope::Sibling),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NameScope::Global => "global",
            NameScope::Sibling => "sibling",
        }
    }
}

/// Generator that supplies the leaves of a folder.
///
/// Returning `None` means the folder is unknown to the generator and should
/// not be created or refreshed.
pub trait FolderSource<T> {
    fn leaves_for(&mut self, folder: &str) -> Option<Vec<(String, T)>>;

    /// Every folder the source knows about, used when restoring folders that
    /// sit directly under the root.
    fn folder_names(&mut self) -> Vec<String> {
        Vec::new()
    }
}

impl<T, F> FolderSource<T> for F
where
    F: FnMut(&str) -> Option<Vec<(String, T)>>,
{
    fn leaves_for(&mut self, folder: &str) -> Option<Vec<(String, T)>> {
        self(folder)
    }
}

/// Owner of every node in the collection tree.
///
/// Nodes live in an arena keyed by [`NodeId`]; children are owned through
/// their parent's id list and point back at it by id. A flat name index maps
/// container names to nodes for constant-time lookup.
#[derive(Debug)]
pub struct TreeStore<T> {
    nodes: HashMap<NodeId, Node<T>>,
    index: HashMap<String, Vec<NodeId>>,
    root: NodeId,
    next_id: u64,
    scope: NameScope,
    default_sorter: Sorter,
    open_new_containers: bool,
    changes: VecDeque<TreeChange>,
}

impl<T> Default for TreeStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TreeStore<T> {
    /// Create a store holding only the root group.
    pub fn new() -> Self {
        Self::with_scope(NameScope::default())
    }

    pub fn with_scope(scope: NameScope) -> Self {
        let root = NodeId(0);
        let mut root_node = Node::new(
            root,
            ROOT_NAME.to_string(),
            None,
            NodeBody::Group(Container {
                is_open: true,
                ..Default::default()
            }),
        );
        root_node.full_path = String::new();
        let mut nodes = HashMap::new();
        nodes.insert(root, root_node);
        Self {
            nodes,
            index: HashMap::new(),
            root,
            next_id: 1,
            scope,
            default_sorter: Sorter::default(),
            open_new_containers: false,
            changes: VecDeque::new(),
        }
    }

    /// Comparator chain given to containers created from now on.
    pub fn with_default_sorter(mut self, sorter: Sorter) -> Self {
        self.default_sorter = sorter;
        self
    }

    /// Whether containers created from now on start open.
    pub fn with_open_new_containers(mut self, open: bool) -> Self {
        self.open_new_containers = open;
        self
    }

    // ── Read access ─────────────────────────────────────────────────────────

    /// The root group. It always exists and cannot be edited.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// How far container-name uniqueness reaches in this tree.
    pub fn scope(&self) -> NameScope {
        self.scope
    }

    /// Look up a node by id.
    pub fn get(&self, id: NodeId) -> Option<&Node<T>> {
        self.nodes.get(&id)
    }

    /// Whether `id` is still in the tree.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds nothing but the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Group, folder or leaf.
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get(id).map(Node::kind)
    }

    /// Display name of a node.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.get(id).map(Node::name)
    }

    /// Ancestor names joined with separators, e.g. `Media//Music/Rock`.
    pub fn full_path(&self, id: NodeId) -> Option<&str> {
        self.get(id).map(Node::full_path)
    }

    /// Parent of a node. `None` for the root and for unknown ids.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(Node::parent)
    }

    /// Children in display order. Empty for leaves and unknown ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(Node::children).unwrap_or(&[])
    }

    /// Payload of a leaf.
    pub fn payload(&self, id: NodeId) -> Option<&T> {
        self.get(id).and_then(Node::payload)
    }

    /// Mutable payload of a leaf. Raises no change.
    pub fn payload_mut(&mut self, id: NodeId) -> Option<&mut T> {
        match self.nodes.get_mut(&id).map(|n| &mut n.body) {
            Some(NodeBody::Leaf(payload)) => Some(payload),
            _ => None,
        }
    }

    /// Every node, root included, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Node<T>> {
        self.nodes.values()
    }

    /// First container carrying `name`.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).and_then(|ids| ids.first().copied())
    }

    /// Every container carrying `name`. At most one under [`NameScope::Global`].
    pub fn find_all(&self, name: &str) -> &[NodeId] {
        self.index.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct child of `parent` named `name`.
    pub fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|id| self.name(*id) == Some(name))
    }

    /// Leaf named `name` inside `folder`.
    pub fn find_leaf(&self, folder: NodeId, name: &str) -> Option<NodeId> {
        self.find_child(folder, name)
            .filter(|id| self.kind(*id) == Some(NodeKind::Leaf))
    }

    /// Ancestors of `id` from its parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.parent(id);
        while let Some(p) = cursor {
            out.push(p);
            cursor = self.parent(p);
        }
        out
    }

    /// Whether `ancestor` lies on the path from `node` up to the root.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = self.parent(node);
        while let Some(p) = cursor {
            if p == ancestor {
                return true;
            }
            cursor = self.parent(p);
        }
        false
    }

    /// Take every change raised since the last drain, oldest first.
    pub fn drain_changes(&mut self) -> Vec<TreeChange> {
        self.changes.drain(..).collect()
    }

    /// Whether changes are waiting to be drained.
    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    // ── Creation ────────────────────────────────────────────────────────────

    /// Walk `path` from the root, creating every missing group.
    ///
    /// Returns the outcome and the topmost group that was created. The path is
    /// validated before anything is created, so a failure leaves the tree
    /// untouched.
    pub fn materialize_path(&mut self, path: &str) -> (Outcome, Option<NodeId>) {
        let segments: Vec<String> = path
            .split(GROUP_SEPARATOR)
            .map(normalize_name)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.iter().any(|s| s == ROOT_NAME) {
            return (Outcome::InvalidOperation, None);
        }

        // Descend through the part that already exists.
        let mut cursor = self.root;
        let mut depth = 0;
        while depth < segments.len() {
            let segment = &segments[depth];
            let existing = match self.scope {
                NameScope::Global => match self.find(segment) {
                    Some(id) if self.parent(id) == Some(cursor) => Some(id),
                    Some(_) => return (Outcome::ItemExists, None),
                    None => None,
                },
                NameScope::Sibling => self.find_child(cursor, segment),
            };
            match existing {
                Some(id) if self.kind(id) == Some(NodeKind::Group) => {
                    cursor = id;
                    depth += 1;
                }
                Some(_) => return (Outcome::ItemExists, None),
                None => break,
            }
        }

        if depth == segments.len() {
            return (Outcome::SuccessNothingDone, None);
        }

        if self.scope == NameScope::Global {
            let mut fresh = HashSet::new();
            for segment in &segments[depth..] {
                if self.find(segment).is_some() || !fresh.insert(segment.as_str()) {
                    return (Outcome::ItemExists, None);
                }
            }
        }

        let mut topmost = None;
        for segment in &segments[depth..] {
            let id = self.insert_container(cursor, segment.clone(), NodeKind::Group);
            topmost.get_or_insert(id);
            cursor = id;
        }
        if let Some(top) = topmost {
            debug!(path, node = %top, "materialized group path");
            let parent = self.parent(top);
            self.emit(TreeChange::new(ChangeKind::Added, top).with_parents(None, parent));
        }
        (Outcome::Success, topmost)
    }

    /// Create a single group under `parent`.
    pub fn create_group(&mut self, parent: NodeId, name: &str) -> (Outcome, Option<NodeId>) {
        if self.kind(parent) != Some(NodeKind::Group) {
            return (Outcome::InvalidOperation, None);
        }
        let Some(name) = valid_name(name) else {
            return (Outcome::InvalidOperation, None);
        };
        if self.container_name_taken(&name, parent, None) {
            return (Outcome::ItemExists, None);
        }
        let id = self.insert_container(parent, name, NodeKind::Group);
        self.emit(TreeChange::new(ChangeKind::Added, id).with_parents(None, Some(parent)));
        (Outcome::Success, Some(id))
    }

    /// Return the folder `name` under `parent`, creating it if needed.
    pub fn find_or_create_folder(
        &mut self,
        parent: NodeId,
        name: &str,
    ) -> (Outcome, Option<NodeId>) {
        if self.kind(parent) != Some(NodeKind::Group) {
            return (Outcome::InvalidOperation, None);
        }
        let Some(name) = valid_name(name) else {
            return (Outcome::InvalidOperation, None);
        };
        if let Some(existing) = self.find_child(parent, &name) {
            return match self.kind(existing) {
                Some(NodeKind::Folder) => (Outcome::SuccessNothingDone, Some(existing)),
                _ => (Outcome::ItemExists, None),
            };
        }
        if self.container_name_taken(&name, parent, None) {
            return (Outcome::ItemExists, None);
        }
        let id = self.insert_container(parent, name, NodeKind::Folder);
        self.emit(TreeChange::new(ChangeKind::Added, id).with_parents(None, Some(parent)));
        (Outcome::Success, Some(id))
    }

    /// Add a leaf wrapping `payload` to `folder`.
    pub fn add_leaf(&mut self, folder: NodeId, name: &str, payload: T) -> (Outcome, Option<NodeId>) {
        match self.insert_leaf(folder, name, payload) {
            Ok(id) => {
                self.emit(TreeChange::new(ChangeKind::Added, id).with_parents(None, Some(folder)));
                (Outcome::Success, Some(id))
            }
            Err(outcome) => (outcome, None),
        }
    }

    /// Replace the leaves of `folder` with whatever `source` generates for it.
    pub fn refresh_folder(&mut self, folder: NodeId, source: &mut dyn FolderSource<T>) -> Outcome {
        if self.kind(folder) != Some(NodeKind::Folder) {
            return Outcome::InvalidOperation;
        }
        let name = self.nodes[&folder].name.clone();
        let Some(leaves) = source.leaves_for(&name) else {
            debug!(folder = %name, "folder source has nothing for folder");
            return Outcome::NoSuccess;
        };
        self.replace_leaves(folder, leaves);
        self.emit(TreeChange::new(ChangeKind::FolderRefreshed, folder));
        Outcome::Success
    }

    // ── Mutation ────────────────────────────────────────────────────────────

    /// Rename `node`, recomputing the full path of its whole subtree.
    pub fn rename(&mut self, node: NodeId, new_name: &str) -> Outcome {
        if node == self.root || !self.contains(node) {
            return Outcome::InvalidOperation;
        }
        let Some(name) = valid_name(new_name) else {
            return Outcome::InvalidOperation;
        };
        let current = &self.nodes[&node];
        if current.name == name {
            return Outcome::SuccessNothingDone;
        }
        let kind = current.kind();
        let parent = current.parent.unwrap_or(self.root);
        let taken = if kind == NodeKind::Leaf {
            self.find_child(parent, &name).is_some_and(|id| id != node)
        } else {
            self.container_name_taken(&name, parent, Some(node))
        };
        if taken {
            return Outcome::ItemExists;
        }

        let Some(target) = self.nodes.get_mut(&node) else {
            return Outcome::InvalidOperation;
        };
        let old_name = std::mem::replace(&mut target.name, name.clone());
        if kind.is_container() {
            self.index_remove(&old_name, node);
            self.index_add(&name, node);
        }
        self.refresh_paths(node);
        debug!(node = %node, from = %old_name, to = %name, "renamed node");
        self.emit(TreeChange::new(ChangeKind::Renamed, node));
        Outcome::Success
    }

    /// Move `node` to the end of `new_parent`'s children.
    pub fn move_node(&mut self, node: NodeId, new_parent: NodeId) -> Outcome {
        let old_parent = self.parent(node);
        let outcome = self.move_inner(node, new_parent);
        if outcome == Outcome::Success {
            self.emit(
                TreeChange::new(ChangeKind::Moved, node).with_parents(old_parent, Some(new_parent)),
            );
        }
        outcome
    }

    /// Move several nodes under `new_parent` in one step.
    ///
    /// Nodes that already live under `new_parent` are reordered; the rest are
    /// spliced in. All of them land as one block before `anchor` (or at the end
    /// when there is no usable anchor). Nodes that cannot move are skipped.
    pub fn bulk_move(
        &mut self,
        nodes: &[NodeId],
        new_parent: NodeId,
        anchor: Option<NodeId>,
    ) -> Outcome {
        self.bulk_move_inner(nodes, new_parent, anchor).0
    }

    /// Like [`TreeStore::bulk_move`], but also reports what happened to each
    /// distinct node: `Success` when it moved or changed position, otherwise
    /// the reason it was left alone.
    pub fn bulk_move_each(
        &mut self,
        nodes: &[NodeId],
        new_parent: NodeId,
        anchor: Option<NodeId>,
    ) -> Vec<(NodeId, Outcome)> {
        self.bulk_move_inner(nodes, new_parent, anchor).1
    }

    fn bulk_move_inner(
        &mut self,
        nodes: &[NodeId],
        new_parent: NodeId,
        anchor: Option<NodeId>,
    ) -> (Outcome, Vec<(NodeId, Outcome)>) {
        let mut seen = HashSet::new();
        let unique: Vec<NodeId> = nodes.iter().copied().filter(|id| seen.insert(*id)).collect();
        if !self.get(new_parent).is_some_and(|n| n.kind().is_container()) {
            let steps = unique
                .into_iter()
                .map(|id| (id, Outcome::InvalidOperation))
                .collect();
            return (Outcome::InvalidOperation, steps);
        }

        let mut steps = Vec::with_capacity(unique.len());
        let mut incoming_names = HashSet::new();
        let mut local = Vec::new();
        let mut foreign = Vec::new();
        for id in unique {
            match self.check_move(id, new_parent) {
                Ok(()) => {
                    let name = self.nodes[&id].name.clone();
                    if incoming_names.insert(name) {
                        foreign.push(id);
                        steps.push((id, Outcome::Success));
                    } else {
                        debug!(node = %id, "skipping node with duplicate incoming name");
                        steps.push((id, Outcome::ItemExists));
                    }
                }
                Err(Outcome::SuccessNothingDone) => {
                    local.push(id);
                    steps.push((id, Outcome::SuccessNothingDone));
                }
                Err(outcome) => {
                    debug!(node = %id, ?outcome, "skipping node in bulk move");
                    steps.push((id, outcome));
                }
            }
        }
        if local.is_empty() && foreign.is_empty() {
            return (Outcome::SuccessNothingDone, steps);
        }

        let old_children = self.children(new_parent).to_vec();
        local.sort_by_key(|id| old_children.iter().position(|c| c == id));
        let local_set: HashSet<NodeId> = local.iter().copied().collect();
        let mut children: Vec<NodeId> = old_children
            .iter()
            .copied()
            .filter(|id| !local_set.contains(id))
            .collect();

        let insert_at = match anchor {
            Some(a) if !local_set.contains(&a) => children.iter().position(|c| *c == a),
            Some(a) => old_children
                .iter()
                .position(|c| *c == a)
                .map(|p| old_children[..p].iter().filter(|c| !local_set.contains(c)).count()),
            None => None,
        }
        .unwrap_or(children.len());

        let block: Vec<NodeId> = local.iter().chain(foreign.iter()).copied().collect();
        let first = block[0];
        children.splice(insert_at..insert_at, block);

        if foreign.is_empty() && children == old_children {
            return (Outcome::SuccessNothingDone, steps);
        }

        let old_parents: Vec<Option<NodeId>> = foreign.iter().map(|id| self.parent(*id)).collect();
        for &id in &foreign {
            self.detach(id);
            if let Some(node) = self.nodes.get_mut(&id) {
                node.parent = Some(new_parent);
            }
        }
        // Local nodes count as moved once their position changed.
        for step in steps.iter_mut() {
            if local_set.contains(&step.0) {
                let before = old_children.iter().position(|c| *c == step.0);
                let after = children.iter().position(|c| *c == step.0);
                if before != after {
                    step.1 = Outcome::Success;
                }
            }
        }
        if let Some(container) = self.container_mut(new_parent) {
            container.children = children;
        }
        for &id in &foreign {
            self.refresh_paths(id);
        }

        info!(
            parent = %new_parent,
            reordered = local.len(),
            moved = foreign.len(),
            "bulk move"
        );
        let old_parent = match old_parents.first() {
            Some(p) if !foreign.is_empty() && old_parents.iter().all(|o| o == p) => *p,
            _ => Some(new_parent),
        };
        self.emit(
            TreeChange::new(ChangeKind::Reordered, first).with_parents(old_parent, Some(new_parent)),
        );
        (Outcome::Success, steps)
    }

    /// Fold the children of `from` into `to`.
    ///
    /// Children whose name collides at `to` stay behind. `from` is removed once
    /// it is empty, unless nothing could be moved at all.
    pub fn merge(&mut self, from: NodeId, to: NodeId) -> Outcome {
        if from == to {
            return Outcome::SuccessNothingDone;
        }
        if from == self.root {
            return Outcome::InvalidOperation;
        }
        let (Some(from_kind), Some(to_kind)) = (self.kind(from), self.kind(to)) else {
            return Outcome::InvalidOperation;
        };
        if !from_kind.is_container() || from_kind != to_kind {
            return Outcome::InvalidOperation;
        }
        if self.is_ancestor(from, to) {
            return Outcome::CircularReference;
        }

        // Work from a snapshot of the child list; moves mutate the original.
        let work = self.children(from).to_vec();
        let total = work.len();
        let mut moved = 0;
        for child in work {
            match self.move_inner(child, to) {
                Outcome::Success => moved += 1,
                outcome => debug!(node = %child, ?outcome, "child stays behind in merge"),
            }
        }

        let outcome = if moved == total {
            Outcome::Success
        } else if moved > 0 {
            Outcome::PartialSuccess
        } else {
            Outcome::NoSuccess
        };

        let old_parent = self.parent(from);
        if outcome != Outcome::NoSuccess && self.children(from).is_empty() {
            self.detach(from);
            self.remove_subtree(from);
        }
        if outcome != Outcome::NoSuccess {
            info!(from = %from, to = %to, moved, total, "merged containers");
            self.emit(TreeChange::new(ChangeKind::Merged, from).with_parents(old_parent, Some(to)));
        }
        outcome
    }

    /// Delete `node`.
    ///
    /// Folders and leaves are removed with their subtree. Groups are merged
    /// into their own parent, so their children survive.
    pub fn delete(&mut self, node: NodeId) -> Outcome {
        if node == self.root {
            return Outcome::InvalidOperation;
        }
        let Some(kind) = self.kind(node) else {
            return Outcome::InvalidOperation;
        };
        let parent = self.parent(node).unwrap_or(self.root);
        if kind == NodeKind::Group {
            return self.merge(node, parent);
        }
        self.detach(node);
        self.remove_subtree(node);
        debug!(node = %node, "deleted node");
        self.emit(TreeChange::new(ChangeKind::Removed, node).with_parents(Some(parent), None));
        Outcome::Success
    }

    pub fn set_open(&mut self, node: NodeId, open: bool) -> Outcome {
        let Some(container) = self.container_mut(node) else {
            return Outcome::InvalidOperation;
        };
        if container.is_open == open {
            return Outcome::SuccessNothingDone;
        }
        container.is_open = open;
        self.emit(TreeChange::new(ChangeKind::OpenStateChanged, node));
        Outcome::Success
    }

    pub fn toggle_open(&mut self, node: NodeId) -> Outcome {
        let open = self.get(node).is_some_and(Node::is_open);
        self.set_open(node, !open)
    }

    pub fn set_sorter(&mut self, node: NodeId, sorter: Sorter) -> Outcome {
        let Some(container) = self.container_mut(node) else {
            return Outcome::InvalidOperation;
        };
        if container.sorter == sorter {
            return Outcome::SuccessNothingDone;
        }
        container.sorter = sorter;
        self.emit(TreeChange::new(ChangeKind::SorterChanged, node));
        Outcome::Success
    }

    /// Change display attributes. Raises no structural change.
    pub fn set_appearance(&mut self, node: NodeId, appearance: Appearance) -> Outcome {
        match self.container_mut(node) {
            Some(container) => {
                container.appearance = appearance;
                Outcome::Success
            }
            None => Outcome::InvalidOperation,
        }
    }

    /// Remove everything but the root. Ids keep counting up.
    pub fn clear(&mut self) {
        self.reset();
        let root = self.root;
        self.emit(TreeChange::new(ChangeKind::Removed, root));
    }

    // ── Crate-internal helpers ──────────────────────────────────────────────

    pub(crate) fn reset(&mut self) {
        let root = self.root;
        self.nodes.retain(|id, _| *id == root);
        self.index.clear();
        if let Some(container) = self.container_mut(root) {
            container.children.clear();
        }
    }

    pub(crate) fn emit(&mut self, change: TreeChange) {
        self.changes.push_back(change);
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.changes.len()
    }

    /// Drop changes queued after the first `len`.
    pub(crate) fn truncate_pending(&mut self, len: usize) {
        self.changes.truncate(len);
    }

    pub(crate) fn replace_leaves(&mut self, folder: NodeId, leaves: Vec<(String, T)>) {
        for leaf in self.children(folder).to_vec() {
            self.remove_subtree(leaf);
        }
        if let Some(container) = self.container_mut(folder) {
            container.children.clear();
        }
        for (name, payload) in leaves {
            if let Err(outcome) = self.insert_leaf(folder, &name, payload) {
                warn!(folder = %folder, leaf = %name, ?outcome, "skipping generated leaf");
            }
        }
    }

    // ── Private helpers ─────────────────────────────────────────────────────

    fn alloc_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn container_mut(&mut self, id: NodeId) -> Option<&mut Container> {
        self.nodes.get_mut(&id).and_then(Node::container_mut)
    }

    fn insert_container(&mut self, parent: NodeId, name: String, kind: NodeKind) -> NodeId {
        let id = self.alloc_id();
        let container = Container {
            is_open: self.open_new_containers,
            sorter: self.default_sorter.clone(),
            ..Default::default()
        };
        let body = match kind {
            NodeKind::Folder => NodeBody::Folder(container),
            _ => NodeBody::Group(container),
        };
        self.index_add(&name, id);
        self.attach_new(parent, Node::new(id, name, Some(parent), body));
        id
    }

    fn insert_leaf(&mut self, folder: NodeId, name: &str, payload: T) -> Result<NodeId, Outcome> {
        if self.kind(folder) != Some(NodeKind::Folder) {
            return Err(Outcome::InvalidOperation);
        }
        let name = valid_name(name).ok_or(Outcome::InvalidOperation)?;
        if self.find_child(folder, &name).is_some() {
            return Err(Outcome::ItemExists);
        }
        let id = self.alloc_id();
        self.attach_new(folder, Node::new(id, name, Some(folder), NodeBody::Leaf(payload)));
        Ok(id)
    }

    fn attach_new(&mut self, parent: NodeId, node: Node<T>) {
        let id = node.id;
        self.nodes.insert(id, node);
        if let Some(container) = self.container_mut(parent) {
            container.children.push(id);
        }
        self.refresh_paths(id);
    }

    /// Whether a container named `name` under `parent` would collide.
    fn container_name_taken(&self, name: &str, parent: NodeId, exclude: Option<NodeId>) -> bool {
        match self.scope {
            NameScope::Global => self.find_all(name).iter().any(|id| Some(*id) != exclude),
            NameScope::Sibling => self
                .find_child(parent, name)
                .is_some_and(|id| Some(id) != exclude),
        }
    }

    /// Validate moving `node` under `new_parent`.
    ///
    /// `Err(SuccessNothingDone)` means it is already there.
    fn check_move(&self, node: NodeId, new_parent: NodeId) -> Result<(), Outcome> {
        if node == self.root || node == new_parent {
            return Err(Outcome::InvalidOperation);
        }
        let (Some(kind), Some(parent_kind)) = (self.kind(node), self.kind(new_parent)) else {
            return Err(Outcome::InvalidOperation);
        };
        if !parent_kind.accepts(kind) {
            return Err(Outcome::InvalidOperation);
        }
        if self.parent(node) == Some(new_parent) {
            return Err(Outcome::SuccessNothingDone);
        }
        if self.is_ancestor(node, new_parent) {
            return Err(Outcome::CircularReference);
        }
        if self.find_child(new_parent, &self.nodes[&node].name).is_some() {
            return Err(Outcome::ItemExists);
        }
        Ok(())
    }

    fn move_inner(&mut self, node: NodeId, new_parent: NodeId) -> Outcome {
        if let Err(outcome) = self.check_move(node, new_parent) {
            return outcome;
        }
        self.detach(node);
        if let Some(n) = self.nodes.get_mut(&node) {
            n.parent = Some(new_parent);
        }
        if let Some(container) = self.container_mut(new_parent) {
            container.children.push(node);
        }
        self.refresh_paths(node);
        debug!(node = %node, parent = %new_parent, "moved node");
        Outcome::Success
    }

    /// Unlink `node` from its parent's child list. The node itself stays.
    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.parent(node) {
            if let Some(container) = self.container_mut(parent) {
                container.children.retain(|c| *c != node);
            }
        }
    }

    /// Drop `node` and its descendants from the arena and the index.
    fn remove_subtree(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(removed) = self.nodes.remove(&id) {
                if removed.kind().is_container() {
                    self.index_remove(&removed.name, id);
                }
                stack.extend(removed.children().iter().copied());
            }
        }
    }

    fn refresh_paths(&mut self, start: NodeId) {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if id == self.root {
                stack.extend(self.children(id).iter().copied());
                continue;
            }
            let parent_path = self
                .parent(id)
                .and_then(|p| self.full_path(p))
                .unwrap_or_default()
                .to_string();
            if let Some(node) = self.nodes.get_mut(&id) {
                node.full_path = join_path(&parent_path, &node.name, node.kind());
                stack.extend(node.children().iter().copied());
            }
        }
    }

    fn index_add(&mut self, name: &str, id: NodeId) {
        self.index.entry(name.to_string()).or_default().push(id);
    }

    fn index_remove(&mut self, name: &str, id: NodeId) {
        if let Some(ids) = self.index.get_mut(name) {
            ids.retain(|i| *i != id);
            if ids.is_empty() {
                self.index.remove(name);
            }
        }
    }
}

/// Normalize `raw` and reject empty or reserved names.
fn valid_name(raw: &str) -> Option<String> {
    let name = normalize_name(raw);
    if name.is_empty() || name == ROOT_NAME {
        None
    } else {
        Some(name)
    }
}
