pub mod change;
pub mod node;
pub mod outcome;
pub mod shape;
pub mod sorter;
pub mod store;

pub use change::{ChangeKind, TreeChange};
pub use node::{Appearance, Node, NodeBody, NodeId, NodeKind};
pub use outcome::Outcome;
pub use shape::HierarchyShape;
pub use sorter::{SortKey, SortStep, Sorter};
pub use store::{FolderSource, NameScope, TreeStore};
