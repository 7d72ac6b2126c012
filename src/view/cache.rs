use std::collections::HashMap;

use tracing::debug;

use crate::tree::node::{Node, NodeId, NodeKind};
use crate::tree::store::TreeStore;

/// Case policy of the filter predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterCase {
    #[default]
    Insensitive,
    Sensitive,
}

/// A node of the projected tree.
///
/// Closed containers never carry children here; `has_children` tells whether
/// anything inside them would be visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub depth: usize,
    pub is_open: bool,
    pub has_children: bool,
    /// Whether the node's own full path matched the filter.
    pub is_match: bool,
    pub children: Vec<CacheNode>,
}

/// A flattened representation of a cache node for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatItem {
    pub id: NodeId,
    pub kind: NodeKind,
    pub depth: usize,
    pub is_open: bool,
    pub has_children: bool,
    pub is_match: bool,
    pub is_last_sibling: bool,
}

/// Filtered, sorted projection of a [`TreeStore`].
///
/// The projection is rebuilt lazily: mutations and filter changes only mark
/// it dirty, and [`ViewCache::rebuild`] does the work once before the next
/// read.
#[derive(Debug, Clone)]
pub struct ViewCache {
    dirty: bool,
    filter: String,
    /// `filter`, lowercased when matching is case-insensitive.
    needle: String,
    case: FilterCase,
    roots: Vec<CacheNode>,
    flat: Vec<FlatItem>,
    positions: HashMap<NodeId, usize>,
    rebuilds: usize,
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new(FilterCase::default())
    }
}

impl ViewCache {
    /// An empty, dirty cache. The first `rebuild` fills it.
    pub fn new(case: FilterCase) -> Self {
        Self {
            dirty: true,
            filter: String::new(),
            needle: String::new(),
            case,
            roots: Vec::new(),
            flat: Vec::new(),
            positions: HashMap::new(),
            rebuilds: 0,
        }
    }

    /// Force the next `rebuild` to re-project the tree.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether the projection is stale.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The filter as typed, before case folding.
    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn case(&self) -> FilterCase {
        self.case
    }

    /// Set the filter string. Returns whether it changed.
    pub fn set_filter(&mut self, filter: &str) -> bool {
        if self.filter == filter {
            return false;
        }
        self.filter = filter.to_string();
        self.refresh_needle();
        self.dirty = true;
        true
    }

    /// Change how the filter compares case. Marks dirty only on change.
    pub fn set_case(&mut self, case: FilterCase) {
        if self.case != case {
            self.case = case;
            self.refresh_needle();
            self.dirty = true;
        }
    }

    /// Number of rebuilds performed so far.
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }

    /// Top-level nodes (children of the root) of the projection.
    pub fn roots(&self) -> &[CacheNode] {
        &self.roots
    }

    /// Depth-first list of every materialized node.
    pub fn flat(&self) -> &[FlatItem] {
        &self.flat
    }

    /// Number of visible rows.
    pub fn len(&self) -> usize {
        self.flat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }

    /// Row at `index` in the flattened list.
    pub fn get(&self, index: usize) -> Option<&FlatItem> {
        self.flat.get(index)
    }

    /// Position of `id` in the flattened list.
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Whether `id` is currently visible.
    pub fn contains(&self, id: NodeId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Whether a full path passes the filter.
    pub fn matches(&self, full_path: &str) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        match self.case {
            FilterCase::Sensitive => full_path.contains(&self.needle),
            FilterCase::Insensitive => full_path.to_lowercase().contains(&self.needle),
        }
    }

    /// Rebuild the projection if it is dirty. Returns whether it rebuilt.
    pub fn rebuild<T>(&mut self, store: &TreeStore<T>) -> bool {
        if !self.dirty {
            return false;
        }
        let roots = match store.get(store.root()) {
            Some(root) => self.project_children(store, root, 0),
            None => Vec::new(),
        };
        self.roots = roots;

        self.flat.clear();
        self.positions.clear();
        Self::flatten(&self.roots, &mut self.flat);
        for (i, item) in self.flat.iter().enumerate() {
            self.positions.insert(item.id, i);
        }

        self.dirty = false;
        self.rebuilds += 1;
        debug!(
            visible = self.flat.len(),
            filter = %self.filter,
            "rebuilt view cache"
        );
        true
    }

    fn refresh_needle(&mut self) {
        self.needle = match self.case {
            FilterCase::Sensitive => self.filter.clone(),
            FilterCase::Insensitive => self.filter.to_lowercase(),
        };
    }

    /// Project the visible children of an open container, sorted by its chain.
    fn project_children<T>(
        &self,
        store: &TreeStore<T>,
        container: &Node<T>,
        depth: usize,
    ) -> Vec<CacheNode> {
        let mut kept: Vec<(&Node<T>, CacheNode)> = container
            .children()
            .iter()
            .filter_map(|id| store.get(*id))
            .filter_map(|child| self.project(store, child, depth).map(|c| (child, c)))
            .collect();
        if let Some(c) = container.container() {
            kept.sort_by(|a, b| c.sorter.compare(a.0, b.0));
        }
        kept.into_iter().map(|(_, cache)| cache).collect()
    }

    fn project<T>(&self, store: &TreeStore<T>, node: &Node<T>, depth: usize) -> Option<CacheNode> {
        let is_match = self.matches(node.full_path());
        let (is_open, has_children, children) = match node.container() {
            None => (false, false, Vec::new()),
            Some(c) if c.is_open => {
                let children = self.project_children(store, node, depth + 1);
                (true, !children.is_empty(), children)
            }
            Some(_) => (false, self.any_descendant_visible(store, node), Vec::new()),
        };
        if !is_match && !has_children {
            return None;
        }
        Some(CacheNode {
            id: node.id(),
            kind: node.kind(),
            depth,
            is_open,
            has_children,
            is_match,
            children,
        })
    }

    /// Probe a closed container's subtree, stopping at the first match.
    fn any_descendant_visible<T>(&self, store: &TreeStore<T>, node: &Node<T>) -> bool {
        let mut stack: Vec<NodeId> = node.children().to_vec();
        while let Some(id) = stack.pop() {
            let Some(child) = store.get(id) else {
                continue;
            };
            if self.matches(child.full_path()) {
                return true;
            }
            stack.extend_from_slice(child.children());
        }
        false
    }

    fn flatten(nodes: &[CacheNode], out: &mut Vec<FlatItem>) {
        for (i, node) in nodes.iter().enumerate() {
            out.push(FlatItem {
                id: node.id,
                kind: node.kind,
                depth: node.depth,
                is_open: node.is_open,
                has_children: node.has_children,
                is_match: node.is_match,
                is_last_sibling: i == nodes.len() - 1,
            });
            Self::flatten(&node.children, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::sorter::{SortKey, Sorter};

    /// Root ── Media ── Music ── Rock ── {zeppelin, acdc}
    ///      │        └─ Films (folder) ── {alien}
    ///      └─ Archive (closed) ── Old ── {rock_tape}
    fn sample() -> TreeStore<()> {
        let mut store = TreeStore::new().with_open_new_containers(true);
        store.materialize_path("Media//Music");
        store.materialize_path("Archive");
        let music = store.find("Music").unwrap();
        let media = store.find("Media").unwrap();
        let archive = store.find("Archive").unwrap();
        let (_, rock) = store.find_or_create_folder(music, "Rock");
        let (_, films) = store.find_or_create_folder(media, "Films");
        let (_, old) = store.find_or_create_folder(archive, "Old");
        store.add_leaf(rock.unwrap(), "zeppelin", ());
        store.add_leaf(rock.unwrap(), "acdc", ());
        store.add_leaf(films.unwrap(), "alien", ());
        store.add_leaf(old.unwrap(), "rock_tape", ());
        store.set_open(archive, false);
        store
    }

    fn flat_names(cache: &ViewCache, store: &TreeStore<()>) -> Vec<String> {
        cache
            .flat()
            .iter()
            .map(|item| store.name(item.id).unwrap().to_string())
            .collect()
    }

    #[test]
    fn unfiltered_view_sorts_each_level_by_name() {
        let store = sample();
        let mut cache = ViewCache::default();
        assert!(cache.rebuild(&store));
        assert_eq!(
            flat_names(&cache, &store),
            vec!["Archive", "Media", "Films", "alien", "Music", "Rock", "acdc", "zeppelin"]
        );
    }

    #[test]
    fn closed_container_is_not_materialized() {
        let store = sample();
        let mut cache = ViewCache::default();
        cache.rebuild(&store);
        let archive = store.find("Archive").unwrap();
        let old = store.find("Old").unwrap();
        let node = &cache.roots()[0];
        assert_eq!(node.id, archive);
        assert!(!node.is_open);
        assert!(node.has_children);
        assert!(node.children.is_empty());
        assert!(!cache.contains(old));
    }

    #[test]
    fn rebuild_is_noop_when_clean() {
        let store = sample();
        let mut cache = ViewCache::default();
        assert!(cache.rebuild(&store));
        assert!(!cache.rebuild(&store));
        assert_eq!(cache.rebuild_count(), 1);
        cache.mark_dirty();
        assert!(cache.rebuild(&store));
        assert_eq!(cache.rebuild_count(), 2);
    }

    #[test]
    fn filter_keeps_ancestors_of_matches() {
        let store = sample();
        let mut cache = ViewCache::default();
        assert!(cache.set_filter("zep"));
        cache.rebuild(&store);
        assert_eq!(
            flat_names(&cache, &store),
            vec!["Media", "Music", "Rock", "zeppelin"]
        );
        let leaf = cache.flat().last().unwrap();
        assert!(leaf.is_match);
        assert!(!cache.flat()[0].is_match);
    }

    #[test]
    fn filter_matches_full_path_not_just_name() {
        let store = sample();
        let mut cache = ViewCache::default();
        cache.set_filter("Music//Rock/");
        cache.rebuild(&store);
        assert_eq!(
            flat_names(&cache, &store),
            vec!["Media", "Music", "Rock", "acdc", "zeppelin"]
        );
    }

    #[test]
    fn closed_container_visible_when_descendant_matches() {
        let store = sample();
        let mut cache = ViewCache::default();
        cache.set_filter("rock_tape");
        cache.rebuild(&store);
        assert_eq!(flat_names(&cache, &store), vec!["Archive"]);
        assert!(cache.flat()[0].has_children);
    }

    #[test]
    fn filter_case_policy() {
        let store = sample();
        let mut cache = ViewCache::new(FilterCase::Sensitive);
        cache.set_filter("ROCK");
        cache.rebuild(&store);
        assert!(cache.is_empty());

        cache.set_case(FilterCase::Insensitive);
        assert!(cache.is_dirty());
        cache.rebuild(&store);
        assert!(!cache.is_empty());
    }

    #[test]
    fn set_filter_same_value_does_not_dirty() {
        let store = sample();
        let mut cache = ViewCache::default();
        cache.set_filter("x");
        cache.rebuild(&store);
        assert!(!cache.set_filter("x"));
        assert!(!cache.is_dirty());
    }

    #[test]
    fn index_of_follows_flat_order() {
        let store = sample();
        let mut cache = ViewCache::default();
        cache.rebuild(&store);
        for (i, item) in cache.flat().iter().enumerate() {
            assert_eq!(cache.index_of(item.id), Some(i));
        }
    }

    #[test]
    fn last_sibling_flags() {
        let store = sample();
        let mut cache = ViewCache::default();
        cache.rebuild(&store);
        let media = cache.index_of(store.find("Media").unwrap()).unwrap();
        let archive = cache.index_of(store.find("Archive").unwrap()).unwrap();
        assert!(cache.flat()[media].is_last_sibling);
        assert!(!cache.flat()[archive].is_last_sibling);
    }

    #[test]
    fn container_sorter_governs_child_order() {
        let mut store = sample();
        let rock = store.find("Rock").unwrap();
        store.set_sorter(rock, Sorter::by(SortKey::Manual));
        let mut cache = ViewCache::default();
        cache.rebuild(&store);
        let rock_idx = cache.index_of(rock).unwrap();
        let next: Vec<_> = cache.flat()[rock_idx + 1..rock_idx + 3]
            .iter()
            .map(|i| store.name(i.id).unwrap())
            .collect();
        assert_eq!(next, vec!["zeppelin", "acdc"]);
    }
}
