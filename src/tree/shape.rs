//! Persisted shape of the hierarchy: which groups nest where, which folder
//! lives in which group, and which containers were open.
//!
//! Leaves are not persisted. They come back from the [`FolderSource`] that
//! owns the folders.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::tree::change::{ChangeKind, TreeChange};
use crate::tree::node::{NodeKind, GROUP_SEPARATOR};
use crate::tree::outcome::Outcome;
use crate::tree::store::{FolderSource, TreeStore};

/// Serializable hierarchy shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct HierarchyShape {
    /// Group name → full path below the root.
    pub group_hierarchy: BTreeMap<String, String>,
    /// Folder name → parent group name. Missing folders sit under the root.
    pub folder_parents: BTreeMap<String, String>,
    /// Containers that should be open after a restore.
    pub opened_collections: Vec<String>,
}

impl HierarchyShape {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a shape file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Write the shape to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Group entries ordered so that ancestors come before descendants.
    fn groups_in_restore_order(&self) -> Vec<(&String, &String)> {
        let mut ordered: Vec<(&String, &String)> = self.group_hierarchy.iter().collect();
        ordered.sort_by(|a, b| {
            a.1.matches(GROUP_SEPARATOR)
                .count()
                .cmp(&b.1.matches(GROUP_SEPARATOR).count())
                .then_with(|| a.1.cmp(b.1))
        });
        ordered
    }
}

impl<T> TreeStore<T> {
    /// Capture the current hierarchy shape.
    pub fn snapshot_shape(&self) -> HierarchyShape {
        let mut shape = HierarchyShape::default();
        let mut opened = BTreeSet::new();
        for node in self.iter() {
            if node.is_root() {
                continue;
            }
            match node.kind() {
                NodeKind::Group => {
                    if shape
                        .group_hierarchy
                        .insert(node.name().to_string(), node.full_path().to_string())
                        .is_some()
                    {
                        warn!(group = node.name(), "duplicate group name in shape snapshot");
                    }
                }
                NodeKind::Folder => {
                    let parent = node.parent().filter(|p| *p != self.root());
                    if let Some(parent_name) = parent.and_then(|p| self.name(p)) {
                        shape
                            .folder_parents
                            .insert(node.name().to_string(), parent_name.to_string());
                    }
                }
                NodeKind::Leaf => continue,
            }
            if node.is_open() {
                opened.insert(node.name().to_string());
            }
        }
        shape.opened_collections = opened.into_iter().collect();
        shape
    }

    /// Rebuild the tree from `shape`, pulling folder contents from `source`.
    ///
    /// Raises `ReloadStarted` and `ReloadFinished` and nothing in between.
    /// Folders the source does not know are skipped.
    pub fn restore_shape(
        &mut self,
        shape: &HierarchyShape,
        source: &mut dyn FolderSource<T>,
    ) -> Outcome {
        let root = self.root();
        self.emit(TreeChange::new(ChangeKind::ReloadStarted, root));
        let mark = self.pending_len();
        self.reset();

        let mut steps = Vec::new();
        for (name, path) in shape.groups_in_restore_order() {
            let (outcome, _) = self.materialize_path(path);
            if !outcome.is_success() {
                warn!(group = %name, path = %path, ?outcome, "could not restore group");
            }
            steps.push(outcome);
        }

        let mut folders: BTreeSet<String> = source.folder_names().into_iter().collect();
        folders.extend(shape.folder_parents.keys().cloned());
        for folder in folders {
            let parent = match shape.folder_parents.get(&folder) {
                Some(group) => match self
                    .find_all(group)
                    .iter()
                    .copied()
                    .find(|id| self.kind(*id) == Some(NodeKind::Group))
                {
                    Some(id) => id,
                    None => {
                        warn!(folder = %folder, group = %group, "parent group missing, using root");
                        root
                    }
                },
                None => root,
            };
            let Some(leaves) = source.leaves_for(&folder) else {
                warn!(folder = %folder, "folder source does not provide folder");
                steps.push(Outcome::NoSuccess);
                continue;
            };
            let (outcome, id) = self.find_or_create_folder(parent, &folder);
            match id {
                Some(id) => self.replace_leaves(id, leaves),
                None => warn!(folder = %folder, ?outcome, "could not restore folder"),
            }
            steps.push(outcome);
        }

        for name in &shape.opened_collections {
            for id in self.find_all(name).to_vec() {
                self.set_open(id, true);
            }
        }

        self.truncate_pending(mark);
        self.emit(TreeChange::new(ChangeKind::ReloadFinished, root));
        let outcome = Outcome::aggregate(steps);
        info!(nodes = self.len(), ?outcome, "restored hierarchy");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::store::NameScope;
    use tempfile::TempDir;

    fn library(name: &str) -> Option<Vec<(String, String)>> {
        match name {
            "Tools" => Some(vec![
                ("hammer".to_string(), "H".to_string()),
                ("saw".to_string(), "S".to_string()),
            ]),
            "Loose" => Some(vec![("pebble".to_string(), "P".to_string())]),
            "Empty" => Some(Vec::new()),
            _ => None,
        }
    }

    struct Library;

    impl FolderSource<String> for Library {
        fn leaves_for(&mut self, folder: &str) -> Option<Vec<(String, String)>> {
            library(folder)
        }

        fn folder_names(&mut self) -> Vec<String> {
            vec!["Loose".to_string()]
        }
    }

    fn sample_store() -> TreeStore<String> {
        let mut store = TreeStore::new();
        store.materialize_path("Home//Garage");
        store.materialize_path("Work");
        let garage = store.find("Garage").unwrap();
        let (_, tools) = store.find_or_create_folder(garage, "Tools");
        let root = store.root();
        let (_, loose) = store.find_or_create_folder(root, "Loose");
        let mut source = Library;
        store.refresh_folder(tools.unwrap(), &mut source);
        store.refresh_folder(loose.unwrap(), &mut source);
        store.set_open(store.find("Home").unwrap(), true);
        store.set_open(tools.unwrap(), true);
        store.drain_changes();
        store
    }

    #[test]
    fn snapshot_captures_groups_folders_and_open_state() {
        let shape = sample_store().snapshot_shape();
        assert_eq!(shape.group_hierarchy.get("Garage").unwrap(), "Home//Garage");
        assert_eq!(shape.group_hierarchy.get("Work").unwrap(), "Work");
        assert_eq!(shape.folder_parents.get("Tools").unwrap(), "Garage");
        assert!(!shape.folder_parents.contains_key("Loose"));
        assert_eq!(shape.opened_collections, vec!["Home", "Tools"]);
    }

    #[test]
    fn restore_rebuilds_same_shape() {
        let store = sample_store();
        let shape = store.snapshot_shape();

        let mut restored: TreeStore<String> = TreeStore::new();
        let outcome = restored.restore_shape(&shape, &mut Library);
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(restored.snapshot_shape(), shape);

        let tools = restored.find("Tools").unwrap();
        assert_eq!(restored.full_path(tools), Some("Home//Garage//Tools"));
        assert_eq!(restored.children(tools).len(), 2);
        let loose = restored.find("Loose").unwrap();
        assert_eq!(restored.parent(loose), Some(restored.root()));
    }

    #[test]
    fn restore_raises_only_reload_markers() {
        let shape = sample_store().snapshot_shape();
        let mut restored: TreeStore<String> = TreeStore::new();
        restored.restore_shape(&shape, &mut Library);
        let kinds: Vec<ChangeKind> = restored.drain_changes().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ChangeKind::ReloadStarted, ChangeKind::ReloadFinished]);
    }

    #[test]
    fn restore_skips_unknown_folders() {
        let mut shape = HierarchyShape::default();
        shape.group_hierarchy.insert("G".into(), "G".into());
        shape.folder_parents.insert("Mystery".into(), "G".into());
        shape.folder_parents.insert("Empty".into(), "G".into());
        let mut store: TreeStore<String> = TreeStore::new();
        let mut source = library;
        assert_eq!(store.restore_shape(&shape, &mut source), Outcome::PartialSuccess);
        assert!(store.find("Mystery").is_none());
        assert!(store.find("Empty").is_some());
    }

    #[test]
    fn restore_orders_ancestors_first() {
        let mut shape = HierarchyShape::default();
        shape.group_hierarchy.insert("a".into(), "z//y//a".into());
        shape.group_hierarchy.insert("z".into(), "z".into());
        shape.group_hierarchy.insert("y".into(), "z//y".into());
        let order: Vec<&str> = shape
            .groups_in_restore_order()
            .into_iter()
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(order, vec!["z", "y", "a"]);

        let mut store: TreeStore<String> = TreeStore::with_scope(NameScope::Global);
        assert_eq!(store.restore_shape(&shape, &mut library), Outcome::Success);
        assert_eq!(store.full_path(store.find("a").unwrap()), Some("z//y//a"));
    }

    #[test]
    fn shape_json_uses_pascal_case_keys() {
        let shape = sample_store().snapshot_shape();
        let json = shape.to_json().unwrap();
        assert!(json.contains("\"GroupHierarchy\""));
        assert!(json.contains("\"FolderParents\""));
        assert!(json.contains("\"OpenedCollections\""));
        assert_eq!(HierarchyShape::from_json(&json).unwrap(), shape);
    }

    #[test]
    fn shape_json_tolerates_missing_sections() {
        let shape = HierarchyShape::from_json(r#"{ "OpenedCollections": ["A"] }"#).unwrap();
        assert!(shape.group_hierarchy.is_empty());
        assert_eq!(shape.opened_collections, vec!["A"]);
    }

    #[test]
    fn save_and_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shape.json");
        let shape = sample_store().snapshot_shape();
        shape.save(&path).unwrap();
        assert_eq!(HierarchyShape::load(&path).unwrap(), shape);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let result = HierarchyShape::load(Path::new("/nonexistent/shape.json"));
        assert!(matches!(result, Err(crate::error::AppError::Io(_))));
    }
}
