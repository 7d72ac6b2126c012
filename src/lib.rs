//! Hierarchical collection tree: groups of folders of leaves, with a filtered
//! and sorted view, a selection model and drag-and-drop transfer.

pub mod collection;
pub mod config;
pub mod error;
pub mod library;
pub mod transfer;
pub mod tree;
pub mod view;

pub use collection::{Collection, CollectionOptions};
pub use error::{AppError, Result};
pub use tree::{NodeId, NodeKind, Outcome, TreeStore};
