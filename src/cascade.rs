//! Done-flag propagation. A business rule layered on top of the structural
//! API, kept out of the generic tree operations on purpose.

use std::collections::HashSet;

use crate::algorithms;
use crate::models::{NodeId, OutlineNode};

/// Sets `done` on `start` and every one of its descendants.
pub fn cascade_down(nodes: &mut [OutlineNode], start: NodeId, done: bool) {
    let targets = algorithms::descendant_ids(nodes, start);
    for node in nodes.iter_mut() {
        if node.id == start || targets.contains(&node.id) {
            node.done = done;
        }
    }
}

/// Clears `done` on `start` and every one of its ancestors. An undone child
/// means no ancestor can be considered finished.
pub fn cascade_up(nodes: &mut [OutlineNode], start: NodeId) {
    let targets: HashSet<NodeId> = algorithms::ancestor_chain(nodes, start).into_iter().collect();
    for node in nodes.iter_mut() {
        if node.id == start || targets.contains(&node.id) {
            node.done = false;
        }
    }
}

pub fn apply_done(nodes: &mut [OutlineNode], node_id: NodeId, done: bool) {
    if done {
        cascade_down(nodes, node_id, true);
    } else {
        cascade_up(nodes, node_id);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use uuid::Uuid;

    use super::*;

    fn node(id: NodeId, parent_id: Option<NodeId>, order: u32, done: bool) -> OutlineNode {
        OutlineNode {
            id,
            parent_id,
            order,
            title: "N".to_string(),
            done,
            payload: Value::Null,
        }
    }

    fn chain() -> (Vec<OutlineNode>, NodeId, NodeId, NodeId, NodeId) {
        let root = NodeId(Uuid::new_v4());
        let mid = NodeId(Uuid::new_v4());
        let leaf = NodeId(Uuid::new_v4());
        let aside = NodeId(Uuid::new_v4());
        let nodes = vec![
            node(root, None, 1, false),
            node(mid, Some(root), 1, false),
            node(leaf, Some(mid), 1, false),
            node(aside, Some(root), 2, false),
        ];
        (nodes, root, mid, leaf, aside)
    }

    fn done_of(nodes: &[OutlineNode], id: NodeId) -> bool {
        nodes
            .iter()
            .find(|node| node.id == id)
            .expect("node should exist")
            .done
    }

    #[test]
    fn marking_done_cascades_to_descendants() {
        let (mut nodes, root, mid, leaf, aside) = chain();
        apply_done(&mut nodes, root, true);
        assert!(done_of(&nodes, root));
        assert!(done_of(&nodes, mid));
        assert!(done_of(&nodes, leaf));
        assert!(done_of(&nodes, aside));
    }

    #[test]
    fn clearing_done_cascades_to_ancestors_only() {
        let (mut nodes, root, mid, leaf, aside) = chain();
        for node in nodes.iter_mut() {
            node.done = true;
        }
        apply_done(&mut nodes, leaf, false);
        assert!(!done_of(&nodes, leaf));
        assert!(!done_of(&nodes, mid));
        assert!(!done_of(&nodes, root));
        // Sibling subtree is untouched.
        assert!(done_of(&nodes, aside));
    }

    #[test]
    fn cascade_down_only_touches_the_subtree() {
        let (mut nodes, _, mid, leaf, aside) = chain();
        cascade_down(&mut nodes, mid, true);
        assert!(done_of(&nodes, mid));
        assert!(done_of(&nodes, leaf));
        assert!(!done_of(&nodes, aside));
    }
}
