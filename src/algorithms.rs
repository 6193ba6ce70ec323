use std::collections::{HashMap, HashSet, VecDeque};

use crate::models::{NodeId, OutlineNode, TreeNode};

pub fn children_map(nodes: &[OutlineNode]) -> HashMap<Option<NodeId>, Vec<NodeId>> {
    let mut children: HashMap<Option<NodeId>, Vec<(u32, NodeId)>> = HashMap::new();
    for node in nodes {
        children
            .entry(node.parent_id)
            .or_default()
            .push((node.order, node.id));
    }

    children
        .into_iter()
        .map(|(parent_id, mut group)| {
            group.sort_by_key(|(order, id)| (*order, *id));
            (
                parent_id,
                group.into_iter().map(|(_, id)| id).collect::<Vec<_>>(),
            )
        })
        .collect()
}

pub fn sorted_children(nodes: &[OutlineNode], parent_id: Option<NodeId>) -> Vec<NodeId> {
    let mut group: Vec<(u32, NodeId)> = nodes
        .iter()
        .filter(|node| node.parent_id == parent_id)
        .map(|node| (node.order, node.id))
        .collect();
    group.sort_by_key(|(order, id)| (*order, *id));
    group.into_iter().map(|(_, id)| id).collect()
}

/// Transitive child closure of `root`, excluding `root` itself.
/// Iterative so pathological depth cannot overflow the stack.
pub fn descendant_ids(nodes: &[OutlineNode], root: NodeId) -> HashSet<NodeId> {
    let children = children_map(nodes);
    let mut found = HashSet::new();
    let mut queue = VecDeque::from([root]);
    while let Some(node_id) = queue.pop_front() {
        if let Some(group) = children.get(&Some(node_id)) {
            for child in group {
                if found.insert(*child) {
                    queue.push_back(*child);
                }
            }
        }
    }
    found
}

/// Parent chain from `start` upward, nearest ancestor first.
pub fn ancestor_chain(nodes: &[OutlineNode], start: NodeId) -> Vec<NodeId> {
    let parents: HashMap<NodeId, Option<NodeId>> = nodes
        .iter()
        .map(|node| (node.id, node.parent_id))
        .collect();

    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = parents.get(&start).copied().flatten();
    while let Some(node_id) = current {
        // Guard against damaged parent links looping forever.
        if !seen.insert(node_id) {
            break;
        }
        chain.push(node_id);
        current = parents.get(&node_id).copied().flatten();
    }
    chain
}

/// Rewrites every sibling group's `order` to a contiguous 1..=N sequence,
/// keeping the current (order, id) sort.
pub fn renumber_siblings(nodes: &mut [OutlineNode]) {
    let mut groups: HashMap<Option<NodeId>, Vec<(u32, NodeId, usize)>> = HashMap::new();
    for (index, node) in nodes.iter().enumerate() {
        groups
            .entry(node.parent_id)
            .or_default()
            .push((node.order, node.id, index));
    }

    for group in groups.values_mut() {
        group.sort_by_key(|(order, id, _)| (*order, *id));
        for (position, (_, _, index)) in group.iter().enumerate() {
            nodes[*index].order = position as u32 + 1;
        }
    }
}

/// Depth-first display order over the forest, `(depth, node_id)` pairs.
pub fn preorder(nodes: &[OutlineNode]) -> Vec<(usize, NodeId)> {
    let children = children_map(nodes);
    let mut ordered = Vec::with_capacity(nodes.len());
    let mut stack: Vec<(usize, NodeId)> = Vec::new();

    if let Some(roots) = children.get(&None) {
        for root in roots.iter().rev() {
            stack.push((0, *root));
        }
    }

    while let Some((depth, node_id)) = stack.pop() {
        ordered.push((depth, node_id));
        if let Some(group) = children.get(&Some(node_id)) {
            for child in group.iter().rev() {
                stack.push((depth + 1, *child));
            }
        }
    }

    ordered
}

pub fn build_tree(nodes: &[OutlineNode]) -> Vec<TreeNode> {
    let mut views: HashMap<NodeId, TreeNode> = nodes
        .iter()
        .map(|node| {
            (
                node.id,
                TreeNode {
                    node: node.clone(),
                    children: Vec::new(),
                },
            )
        })
        .collect();

    // Reversed preorder visits children before their parent, so each view is
    // complete by the time it is attached. Nodes unreachable from a root
    // (orphans in damaged data) are skipped rather than failing the read.
    let ordered = preorder(nodes);
    let mut roots = Vec::new();
    for (_, node_id) in ordered.iter().rev() {
        let view = views
            .remove(node_id)
            .expect("preorder ids should exist in the view map");
        match view.node.parent_id {
            Some(parent_id) => views
                .get_mut(&parent_id)
                .expect("parent should exist in the view map")
                .children
                .insert(0, view),
            None => roots.insert(0, view),
        }
    }

    roots
}
