//! Drag and drop of a selection onto a target node.
//!
//! A drop is planned first and only then applied, so a rejected drop leaves
//! the tree untouched.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info};

use crate::tree::node::{NodeId, NodeKind};
use crate::tree::outcome::Outcome;
use crate::tree::store::TreeStore;
use crate::view::selection::Selection;

/// Why a drop was refused before touching the tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferRejection {
    #[error("nothing to transfer")]
    Empty,

    #[error("drop target {0} no longer exists")]
    TargetMissing(NodeId),

    /// A leaf cannot land in a group unless its folder comes along.
    #[error("leaf {0} cannot be dropped into a group without its folder")]
    OrphanedLeaf(NodeId),

    #[error("groups cannot be dropped onto folders or leaves")]
    GroupOntoFolder,
}

/// What a drop will do, decided up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferPlan {
    /// Move top-level containers of the source into a group.
    IntoGroup { target: NodeId, nodes: Vec<NodeId> },
    /// Merge folders into a folder and move leaves whose folder stays behind.
    IntoFolder {
        target_folder: NodeId,
        merge: Vec<NodeId>,
        move_leaves: Vec<NodeId>,
    },
}

/// Result of applying a plan: one entry per sub-operation plus the combined
/// outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub steps: Vec<(NodeId, Outcome)>,
    pub outcome: Outcome,
}

/// Decide what dropping `source` onto `target` would do.
pub fn plan_transfer<T>(
    store: &TreeStore<T>,
    source: &[NodeId],
    target: NodeId,
) -> Result<TransferPlan, TransferRejection> {
    let Some(target_kind) = store.kind(target) else {
        return Err(TransferRejection::TargetMissing(target));
    };

    let mut seen = HashSet::new();
    let live: Vec<(NodeId, NodeKind)> = source
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .filter_map(|id| store.kind(id).map(|kind| (id, kind)))
        .filter(|(id, _)| *id != store.root())
        .collect();
    if live.is_empty() {
        return Err(TransferRejection::Empty);
    }
    let members: HashSet<NodeId> = live.iter().map(|(id, _)| *id).collect();

    if target_kind == NodeKind::Group {
        for &(id, kind) in &live {
            if kind == NodeKind::Leaf && !store.parent(id).is_some_and(|p| members.contains(&p)) {
                debug!(leaf = %id, "rejecting drop of orphaned leaf into group");
                return Err(TransferRejection::OrphanedLeaf(id));
            }
        }
        // Containers nested under another source node travel with it.
        let nodes = live
            .iter()
            .filter(|(_, kind)| kind.is_container())
            .map(|(id, _)| *id)
            .filter(|id| !store.ancestors(*id).iter().any(|a| members.contains(a)))
            .collect();
        return Ok(TransferPlan::IntoGroup { target, nodes });
    }

    if live.iter().any(|(_, kind)| *kind == NodeKind::Group) {
        debug!(target = %target, "rejecting drop of group onto folder or leaf");
        return Err(TransferRejection::GroupOntoFolder);
    }

    let target_folder = match target_kind {
        NodeKind::Leaf => store
            .parent(target)
            .ok_or(TransferRejection::TargetMissing(target))?,
        _ => target,
    };
    let merge: Vec<NodeId> = live
        .iter()
        .filter(|(id, kind)| *kind == NodeKind::Folder && *id != target_folder)
        .map(|(id, _)| *id)
        .collect();
    let move_leaves = live
        .iter()
        .filter(|(_, kind)| *kind == NodeKind::Leaf)
        .map(|(id, _)| *id)
        .filter(|id| !store.parent(*id).is_some_and(|p| members.contains(&p)))
        .collect();
    Ok(TransferPlan::IntoFolder {
        target_folder,
        merge,
        move_leaves,
    })
}

/// Carry out `plan`. Each sub-operation may fail on its own without stopping
/// the rest.
pub fn apply_transfer<T>(store: &mut TreeStore<T>, plan: &TransferPlan) -> TransferReport {
    let steps = match plan {
        TransferPlan::IntoGroup { target, nodes } => store.bulk_move_each(nodes, *target, None),
        TransferPlan::IntoFolder {
            target_folder,
            merge,
            move_leaves,
        } => {
            let mut steps = Vec::with_capacity(merge.len() + move_leaves.len());
            for &folder in merge {
                steps.push((folder, store.merge(folder, *target_folder)));
            }
            for &leaf in move_leaves {
                steps.push((leaf, store.move_node(leaf, *target_folder)));
            }
            steps
        }
    };
    // A lone step keeps its own reason, e.g. a cycle.
    let outcome = match steps.as_slice() {
        [(_, only)] => *only,
        _ => Outcome::aggregate(steps.iter().map(|(_, o)| *o)),
    };
    info!(steps = steps.len(), ?outcome, "applied transfer");
    TransferReport { steps, outcome }
}

/// A drag in progress. The source is fixed when the drag starts, so later
/// selection changes do not affect it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    source: Vec<NodeId>,
}

impl DragSession {
    pub fn begin(selection: &Selection) -> Self {
        Self {
            source: selection.snapshot(),
        }
    }

    pub fn from_nodes(source: Vec<NodeId>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &[NodeId] {
        &self.source
    }

    pub fn plan<T>(
        &self,
        store: &TreeStore<T>,
        target: NodeId,
    ) -> Result<TransferPlan, TransferRejection> {
        plan_transfer(store, &self.source, target)
    }

    /// Plan and apply in one go.
    pub fn drop_on<T>(
        &self,
        store: &mut TreeStore<T>,
        target: NodeId,
    ) -> Result<TransferReport, TransferRejection> {
        let plan = self.plan(store, target)?;
        Ok(apply_transfer(store, &plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::store::NameScope;

    struct Fixture {
        store: TreeStore<u32>,
        music: NodeId,
        films: NodeId,
        rock: NodeId,
        jazz: NodeId,
        scifi: NodeId,
        acdc: NodeId,
        miles: NodeId,
        alien: NodeId,
    }

    /// Music{Rock[acdc], Jazz[miles]}, Films{SciFi[alien]}.
    fn fixture() -> Fixture {
        let mut store = TreeStore::with_scope(NameScope::Global);
        let (_, music) = store.materialize_path("Music");
        let (_, films) = store.materialize_path("Films");
        let (music, films) = (music.unwrap(), films.unwrap());
        let rock = store.find_or_create_folder(music, "Rock").1.unwrap();
        let jazz = store.find_or_create_folder(music, "Jazz").1.unwrap();
        let scifi = store.find_or_create_folder(films, "SciFi").1.unwrap();
        let acdc = store.add_leaf(rock, "acdc", 1).1.unwrap();
        let miles = store.add_leaf(jazz, "miles", 2).1.unwrap();
        let alien = store.add_leaf(scifi, "alien", 3).1.unwrap();
        store.drain_changes();
        Fixture {
            store,
            music,
            films,
            rock,
            jazz,
            scifi,
            acdc,
            miles,
            alien,
        }
    }

    #[test]
    fn folders_move_into_group() {
        let mut f = fixture();
        let drag = DragSession::from_nodes(vec![f.rock, f.acdc]);
        let report = drag.drop_on(&mut f.store, f.films).unwrap();
        assert_eq!(report.outcome, Outcome::Success);
        assert_eq!(f.store.parent(f.rock), Some(f.films));
        assert_eq!(f.store.parent(f.acdc), Some(f.rock));
        assert_eq!(f.store.full_path(f.acdc), Some("Films//Rock/acdc"));
    }

    #[test]
    fn orphan_leaf_into_group_rejects_whole_drop() {
        let mut f = fixture();
        let drag = DragSession::from_nodes(vec![f.jazz, f.acdc]);
        assert_eq!(
            drag.drop_on(&mut f.store, f.films),
            Err(TransferRejection::OrphanedLeaf(f.acdc))
        );
        assert_eq!(f.store.parent(f.jazz), Some(f.music));
        assert!(!f.store.has_pending_changes());
    }

    #[test]
    fn group_onto_folder_is_rejected() {
        let f = fixture();
        let result = plan_transfer(&f.store, &[f.music], f.scifi);
        assert_eq!(result, Err(TransferRejection::GroupOntoFolder));
        let result = plan_transfer(&f.store, &[f.films, f.rock], f.acdc);
        assert_eq!(result, Err(TransferRejection::GroupOntoFolder));
    }

    #[test]
    fn nested_containers_travel_with_their_group() {
        let f = fixture();
        let plan = plan_transfer(&f.store, &[f.music, f.rock, f.acdc], f.films).unwrap();
        assert_eq!(
            plan,
            TransferPlan::IntoGroup {
                target: f.films,
                nodes: vec![f.music],
            }
        );
    }

    #[test]
    fn drop_on_leaf_targets_its_folder() {
        let f = fixture();
        let plan = plan_transfer(&f.store, &[f.jazz, f.acdc], f.alien).unwrap();
        assert_eq!(
            plan,
            TransferPlan::IntoFolder {
                target_folder: f.scifi,
                merge: vec![f.jazz],
                move_leaves: vec![f.acdc],
            }
        );
    }

    #[test]
    fn leaves_under_merged_folder_are_not_moved_twice() {
        let f = fixture();
        let plan = plan_transfer(&f.store, &[f.jazz, f.miles], f.scifi).unwrap();
        assert_eq!(
            plan,
            TransferPlan::IntoFolder {
                target_folder: f.scifi,
                merge: vec![f.jazz],
                move_leaves: vec![],
            }
        );
    }

    #[test]
    fn merge_and_move_into_folder() {
        let mut f = fixture();
        let drag = DragSession::from_nodes(vec![f.jazz, f.acdc]);
        let report = drag.drop_on(&mut f.store, f.scifi).unwrap();
        assert_eq!(report.outcome, Outcome::Success);
        assert_eq!(report.steps.len(), 2);
        assert!(!f.store.contains(f.jazz));
        assert_eq!(f.store.parent(f.miles), Some(f.scifi));
        assert_eq!(f.store.parent(f.acdc), Some(f.scifi));
        assert_eq!(f.store.full_path(f.acdc), Some("Films//SciFi/acdc"));
    }

    #[test]
    fn failing_step_does_not_abort_the_drop() {
        let mut f = fixture();
        // A leaf named like one already in the target folder stays put.
        let twin = f.store.add_leaf(f.rock, "alien", 9).1.unwrap();
        let drag = DragSession::from_nodes(vec![twin, f.miles]);
        let report = drag.drop_on(&mut f.store, f.scifi).unwrap();
        assert_eq!(report.outcome, Outcome::PartialSuccess);
        assert_eq!(
            report.steps,
            vec![(twin, Outcome::ItemExists), (f.miles, Outcome::Success)]
        );
        assert_eq!(f.store.parent(twin), Some(f.rock));
        assert_eq!(f.store.parent(f.miles), Some(f.scifi));
    }

    #[test]
    fn group_into_own_descendant_reports_cycle() {
        let mut f = fixture();
        let live = f.store.materialize_path("Music//Live").1.unwrap();
        f.store.drain_changes();
        let report = DragSession::from_nodes(vec![f.music])
            .drop_on(&mut f.store, live)
            .unwrap();
        assert_eq!(report.steps, vec![(f.music, Outcome::CircularReference)]);
        assert_eq!(report.outcome, Outcome::CircularReference);
        assert!(report.outcome.check("drop").is_err());
        assert_eq!(f.store.parent(f.music), Some(f.store.root()));
        assert!(!f.store.has_pending_changes());
    }

    #[test]
    fn colliding_folder_stays_while_the_rest_moves() {
        let mut store: TreeStore<u32> = TreeStore::with_scope(NameScope::Sibling);
        let root = store.root();
        let x = store.create_group(root, "X").1.unwrap();
        let y = store.create_group(root, "Y").1.unwrap();
        let shared = store.find_or_create_folder(x, "Shared").1.unwrap();
        let other = store.find_or_create_folder(x, "Other").1.unwrap();
        store.find_or_create_folder(y, "Shared");

        let report = DragSession::from_nodes(vec![shared, other])
            .drop_on(&mut store, y)
            .unwrap();
        assert_eq!(
            report.steps,
            vec![(shared, Outcome::ItemExists), (other, Outcome::Success)]
        );
        assert_eq!(report.outcome, Outcome::PartialSuccess);
        assert_eq!(store.parent(shared), Some(x));
        assert_eq!(store.parent(other), Some(y));
    }

    #[test]
    fn drag_snapshot_ignores_later_selection_changes() {
        let f = fixture();
        let mut selection = Selection::new();
        let mut view = crate::view::cache::ViewCache::default();
        view.rebuild(&f.store);
        selection.select_item(
            &f.store,
            &view,
            f.rock,
            crate::view::selection::Modifiers::NONE,
            true,
            true,
        );
        let drag = DragSession::begin(&selection);
        selection.clear();
        assert_eq!(drag.source(), &[f.rock]);
    }

    #[test]
    fn empty_or_missing_inputs() {
        let mut f = fixture();
        assert_eq!(
            plan_transfer(&f.store, &[], f.films),
            Err(TransferRejection::Empty)
        );
        assert_eq!(
            plan_transfer(&f.store, &[f.store.root()], f.films),
            Err(TransferRejection::Empty)
        );
        f.store.delete(f.jazz);
        assert_eq!(
            plan_transfer(&f.store, &[f.rock], f.jazz),
            Err(TransferRejection::TargetMissing(f.jazz))
        );
    }
}
