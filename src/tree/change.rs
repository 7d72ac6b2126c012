use crate::tree::node::NodeId;

/// Kind of structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Renamed,
    Moved,
    /// Several siblings were moved or reordered under one parent.
    Reordered,
    /// A container's children were folded into another container.
    Merged,
    FolderRefreshed,
    OpenStateChanged,
    SorterChanged,
    ReloadStarted,
    ReloadFinished,
}

impl ChangeKind {
    /// Whether nodes may have left the tree.
    pub fn may_remove(self) -> bool {
        matches!(
            self,
            ChangeKind::Removed
                | ChangeKind::Merged
                | ChangeKind::FolderRefreshed
                | ChangeKind::ReloadStarted
                | ChangeKind::ReloadFinished
        )
    }
}

/// One notification per logical tree operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeChange {
    pub kind: ChangeKind,
    /// The primary node affected. For reloads this is the root.
    pub node: NodeId,
    pub old_parent: Option<NodeId>,
    pub new_parent: Option<NodeId>,
}

impl TreeChange {
    pub fn new(kind: ChangeKind, node: NodeId) -> Self {
        Self {
            kind,
            node,
            old_parent: None,
            new_parent: None,
        }
    }

    pub fn with_parents(mut self, old_parent: Option<NodeId>, new_parent: Option<NodeId>) -> Self {
        self.old_parent = old_parent;
        self.new_parent = new_parent;
        self
    }
}
