//! On-disk library: a hierarchy shape plus the contents of every folder.
//!
//! The library doubles as the folder generator when the shape is restored.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::tree::node::NodeKind;
use crate::tree::shape::HierarchyShape;
use crate::tree::store::{FolderSource, TreeStore};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    #[serde(flatten)]
    pub shape: HierarchyShape,
    /// Folder name → leaf names.
    #[serde(default)]
    pub folders: BTreeMap<String, Vec<String>>,
}

impl Library {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let library = Self::from_json(&std::fs::read_to_string(path)?)?;
        info!(
            path = %path.display(),
            folders = library.folders.len(),
            "loaded library"
        );
        Ok(library)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), "saved library");
        Ok(())
    }

    /// Capture the shape of `store` and the leaves each folder holds now.
    pub fn capture<T>(store: &TreeStore<T>) -> Self {
        let folders = store
            .iter()
            .filter(|node| node.kind() == NodeKind::Folder)
            .map(|folder| {
                let leaves = folder
                    .children()
                    .iter()
                    .filter_map(|id| store.name(*id))
                    .map(str::to_string)
                    .collect();
                (folder.name().to_string(), leaves)
            })
            .collect();
        Self {
            shape: store.snapshot_shape(),
            folders,
        }
    }
}

impl FolderSource<String> for Library {
    fn leaves_for(&mut self, folder: &str) -> Option<Vec<(String, String)>> {
        self.folders
            .get(folder)
            .map(|leaves| leaves.iter().map(|l| (l.clone(), l.clone())).collect())
    }

    fn folder_names(&mut self) -> Vec<String> {
        self.folders.keys().cloned().collect()
    }
}
