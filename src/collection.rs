//! The tree, its view and its selection, kept consistent with each other.
//!
//! Mutations go through [`Collection::apply`] (or `store_mut` followed by
//! [`Collection::sync`]). Syncing drains the store's change queue once, marks
//! the view dirty and drops selected nodes that left the tree.

use tracing::debug;

use crate::config::AppConfig;
use crate::transfer::{DragSession, TransferRejection, TransferReport};
use crate::tree::change::TreeChange;
use crate::tree::node::NodeId;
use crate::tree::outcome::Outcome;
use crate::tree::shape::HierarchyShape;
use crate::tree::sorter::Sorter;
use crate::tree::store::{FolderSource, NameScope, TreeStore};
use crate::view::cache::{FilterCase, ViewCache};
use crate::view::selection::{Modifiers, Selection};

/// Construction-time knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionOptions {
    pub scope: NameScope,
    pub default_sorter: Sorter,
    pub open_new_containers: bool,
    pub filter_case: FilterCase,
    pub allow_multi_select: bool,
    pub allow_range_select: bool,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            scope: NameScope::default(),
            default_sorter: Sorter::default(),
            open_new_containers: false,
            filter_case: FilterCase::default(),
            allow_multi_select: true,
            allow_range_select: true,
        }
    }
}

impl From<&AppConfig> for CollectionOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            scope: config.name_scope(),
            default_sorter: config.default_sorter(),
            open_new_containers: config.open_new_groups(),
            filter_case: config.filter_case(),
            allow_multi_select: config.allow_multi_select(),
            allow_range_select: config.allow_range_select(),
        }
    }
}

#[derive(Debug)]
pub struct Collection<T> {
    store: TreeStore<T>,
    view: ViewCache,
    selection: Selection,
    options: CollectionOptions,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self::new(CollectionOptions::default())
    }
}

impl<T> Collection<T> {
    pub fn new(options: CollectionOptions) -> Self {
        let store = TreeStore::with_scope(options.scope)
            .with_default_sorter(options.default_sorter.clone())
            .with_open_new_containers(options.open_new_containers);
        Self {
            store,
            view: ViewCache::new(options.filter_case),
            selection: Selection::new(),
            options,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(CollectionOptions::from(config))
    }

    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }

    pub fn store(&self) -> &TreeStore<T> {
        &self.store
    }

    /// Direct store access. Call [`Collection::sync`] afterwards.
    pub fn store_mut(&mut self) -> &mut TreeStore<T> {
        &mut self.store
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Run a store mutation and sync right after.
    pub fn apply<R>(&mut self, mutate: impl FnOnce(&mut TreeStore<T>) -> R) -> R {
        let result = mutate(&mut self.store);
        self.sync();
        result
    }

    /// Drain pending store changes and bring the view and selection up to
    /// date with them. Returns the drained changes.
    pub fn sync(&mut self) -> Vec<TreeChange> {
        let changes = self.store.drain_changes();
        if changes.is_empty() {
            return changes;
        }
        self.view.mark_dirty();
        if changes.iter().any(|c| c.kind.may_remove()) {
            let dropped = self.selection.retain_live(&self.store);
            if dropped > 0 {
                debug!(dropped, "pruned selection after removal");
            }
        }
        changes
    }

    /// The current view, rebuilt first if anything changed.
    pub fn view(&mut self) -> &ViewCache {
        self.sync();
        self.view.rebuild(&self.store);
        &self.view
    }

    /// Store, up-to-date view and selection, borrowed together for drawing.
    pub fn view_parts(&mut self) -> (&TreeStore<T>, &ViewCache, &Selection) {
        self.sync();
        self.view.rebuild(&self.store);
        (&self.store, &self.view, &self.selection)
    }

    /// Returns whether the filter text changed.
    pub fn set_filter(&mut self, filter: &str) -> bool {
        self.view.set_filter(filter)
    }

    pub fn filter(&self) -> &str {
        self.view.filter()
    }

    pub fn set_filter_case(&mut self, case: FilterCase) {
        self.options.filter_case = case;
        self.view.set_case(case);
    }

    /// Apply a selection gesture on `node` against the current view.
    pub fn select(&mut self, node: NodeId, modifiers: Modifiers) -> bool {
        self.sync();
        self.view.rebuild(&self.store);
        self.selection.select_item(
            &self.store,
            &self.view,
            node,
            modifiers,
            self.options.allow_multi_select,
            self.options.allow_range_select,
        )
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Snapshot the selection as the source of a drag.
    pub fn begin_drag(&self) -> Option<DragSession> {
        if self.selection.is_empty() {
            return None;
        }
        Some(DragSession::begin(&self.selection))
    }

    pub fn drop_on(
        &mut self,
        drag: &DragSession,
        target: NodeId,
    ) -> Result<TransferReport, TransferRejection> {
        let report = drag.drop_on(&mut self.store, target);
        self.sync();
        report
    }

    pub fn snapshot_shape(&self) -> HierarchyShape {
        self.store.snapshot_shape()
    }

    /// Rebuild everything from a persisted shape.
    pub fn restore(&mut self, shape: &HierarchyShape, source: &mut dyn FolderSource<T>) -> Outcome {
        let outcome = self.store.restore_shape(shape, source);
        self.sync();
        outcome
    }
}
