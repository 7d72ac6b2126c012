use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tree::sorter::Sorter;

/// Separator between container names in a full path (`A//B//Folder`).
pub const GROUP_SEPARATOR: &str = "//";
/// Separator between a folder and one of its leaves (`A//Folder/Leaf`).
pub const LEAF_SEPARATOR: &str = "/";
/// Reserved name of the root group. No other node may carry it.
pub const ROOT_NAME: &str = "Root";

/// Stable identity of a node. Assigned at creation, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    /// Holds other groups and folders.
    Group,
    /// Holds leaves only.
    Folder,
    Leaf,
}

impl NodeKind {
    pub fn is_container(self) -> bool {
        !matches!(self, NodeKind::Leaf)
    }

    /// Whether a container of this kind may hold a child of `child` kind.
    pub fn accepts(self, child: NodeKind) -> bool {
        match self {
            NodeKind::Group => matches!(child, NodeKind::Group | NodeKind::Folder),
            NodeKind::Folder => child == NodeKind::Leaf,
            NodeKind::Leaf => false,
        }
    }
}

/// Display attributes of a container. They never affect structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appearance {
    pub icon: Option<String>,
    pub color: Option<String>,
    pub text_color: Option<String>,
}

/// State shared by groups and folders.
#[derive(Debug, Clone, Default)]
pub struct Container {
    /// Display order. Sorting happens in the view, not here.
    pub children: Vec<NodeId>,
    pub is_open: bool,
    pub sorter: Sorter,
    pub appearance: Appearance,
}

/// Variant-specific part of a node.
#[derive(Debug, Clone)]
pub enum NodeBody<T> {
    Group(Container),
    Folder(Container),
    Leaf(T),
}

/// A node in the collection tree.
#[derive(Debug, Clone)]
pub struct Node<T> {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) full_path: String,
    /// Non-owning link used for traversal and path computation.
    pub(crate) parent: Option<NodeId>,
    pub(crate) body: NodeBody<T>,
}

impl<T> Node<T> {
    pub(crate) fn new(id: NodeId, name: String, parent: Option<NodeId>, body: NodeBody<T>) -> Self {
        Self {
            id,
            name,
            full_path: String::new(),
            parent,
            body,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn body(&self) -> &NodeBody<T> {
        &self.body
    }

    pub fn kind(&self) -> NodeKind {
        match self.body {
            NodeBody::Group(_) => NodeKind::Group,
            NodeBody::Folder(_) => NodeKind::Folder,
            NodeBody::Leaf(_) => NodeKind::Leaf,
        }
    }

    pub fn container(&self) -> Option<&Container> {
        match &self.body {
            NodeBody::Group(c) | NodeBody::Folder(c) => Some(c),
            NodeBody::Leaf(_) => None,
        }
    }

    pub(crate) fn container_mut(&mut self) -> Option<&mut Container> {
        match &mut self.body {
            NodeBody::Group(c) | NodeBody::Folder(c) => Some(c),
            NodeBody::Leaf(_) => None,
        }
    }

    /// Children in display order; empty for leaves.
    pub fn children(&self) -> &[NodeId] {
        self.container().map(|c| c.children.as_slice()).unwrap_or(&[])
    }

    pub fn is_open(&self) -> bool {
        self.container().is_some_and(|c| c.is_open)
    }

    pub fn payload(&self) -> Option<&T> {
        match &self.body {
            NodeBody::Leaf(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Normalize a user-supplied node name.
///
/// Trims surrounding whitespace and strips group separator sequences so that a
/// name can never split a path. The result may be empty.
pub fn normalize_name(raw: &str) -> String {
    let mut name = raw.trim().to_string();
    while name.contains(GROUP_SEPARATOR) {
        name = name.replace(GROUP_SEPARATOR, "");
    }
    name.trim().to_string()
}

/// Build the full path of a node whose parent has `parent_path`.
pub(crate) fn join_path(parent_path: &str, name: &str, kind: NodeKind) -> String {
    if parent_path.is_empty() {
        return name.to_string();
    }
    let separator = if kind == NodeKind::Leaf {
        LEAF_SEPARATOR
    } else {
        GROUP_SEPARATOR
    };
    format!("{parent_path}{separator}{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_whitespace() {
        assert_eq!(normalize_name("  Favorites  "), "Favorites");
    }

    #[test]
    fn normalize_strips_group_separator() {
        assert_eq!(normalize_name("A//B"), "AB");
        assert_eq!(normalize_name("A////B"), "AB");
        assert_eq!(normalize_name("A///B"), "A/B");
    }

    #[test]
    fn normalize_can_produce_empty() {
        assert_eq!(normalize_name(" // "), "");
    }

    #[test]
    fn join_path_uses_kind_separator() {
        assert_eq!(join_path("", "A", NodeKind::Group), "A");
        assert_eq!(join_path("A", "F", NodeKind::Folder), "A//F");
        assert_eq!(join_path("A//F", "L", NodeKind::Leaf), "A//F/L");
    }

    #[test]
    fn container_kinds_accept_children() {
        assert!(NodeKind::Group.accepts(NodeKind::Group));
        assert!(NodeKind::Group.accepts(NodeKind::Folder));
        assert!(!NodeKind::Group.accepts(NodeKind::Leaf));
        assert!(NodeKind::Folder.accepts(NodeKind::Leaf));
        assert!(!NodeKind::Folder.accepts(NodeKind::Folder));
        assert!(!NodeKind::Leaf.accepts(NodeKind::Leaf));
    }
}
