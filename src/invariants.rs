use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::anyhow;

use crate::algorithms;
use crate::error::{LibError, Result};
use crate::models::{NodeId, OutlineInvariantViolation, OutlineNode};

pub fn outline_invariant_violations(nodes: &[OutlineNode]) -> Vec<OutlineInvariantViolation> {
    let node_ids: HashSet<NodeId> = nodes.iter().map(|node| node.id).collect();
    let mut indegree: HashMap<NodeId, usize> = HashMap::with_capacity(nodes.len());
    let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::with_capacity(nodes.len());
    for node in nodes {
        indegree.insert(node.id, 0);
        adjacency.insert(node.id, Vec::new());
    }

    let mut violations = Vec::new();
    for node in nodes {
        let Some(parent_id) = node.parent_id else {
            continue;
        };

        if parent_id == node.id {
            violations.push(OutlineInvariantViolation::SelfParent { node_id: node.id });
        }

        if !node_ids.contains(&parent_id) {
            violations.push(OutlineInvariantViolation::UnknownParentReference {
                node_id: node.id,
                missing_parent_id: parent_id,
            });
            continue;
        }

        *indegree
            .get_mut(&node.id)
            .expect("node id should exist in indegree map") += 1;
        adjacency
            .get_mut(&parent_id)
            .expect("parent id should exist in adjacency map")
            .push(node.id);
    }

    if has_cycle(nodes, &adjacency, &indegree) {
        violations.push(OutlineInvariantViolation::CycleDetected);
    }

    let mut seen_orders = HashSet::with_capacity(nodes.len());
    for node in nodes {
        if !seen_orders.insert((node.parent_id, node.order)) {
            violations.push(OutlineInvariantViolation::DuplicateSiblingOrder {
                parent_id: node.parent_id,
                order: node.order,
            });
        }
    }

    violations
}

pub fn ensure_outline_invariants(nodes: &[OutlineNode]) -> Result<()> {
    let violations = outline_invariant_violations(nodes);
    if let Some(first) = violations.first() {
        let source = anyhow!("outline invariant validation failed: {:?}", violations);
        return Err(match first {
            OutlineInvariantViolation::CycleDetected => {
                LibError::cycle(first.public_message(), source)
            }
            _ => LibError::invalid_with_code(first.error_code(), first.public_message(), source),
        });
    }

    Ok(())
}

/// Checks a prospective re-parent without mutating anything. True when the
/// target is the node itself or one of its descendants.
pub fn would_create_cycle(
    nodes: &[OutlineNode],
    node_id: NodeId,
    new_parent_id: Option<NodeId>,
) -> bool {
    let Some(parent_id) = new_parent_id else {
        return false;
    };
    if parent_id == node_id {
        return true;
    }
    algorithms::ancestor_chain(nodes, parent_id).contains(&node_id)
}

fn has_cycle(
    nodes: &[OutlineNode],
    adjacency: &HashMap<NodeId, Vec<NodeId>>,
    indegree: &HashMap<NodeId, usize>,
) -> bool {
    let mut indegree = indegree.clone();
    let mut queue = VecDeque::new();
    for (node_id, degree) in &indegree {
        if *degree == 0 {
            queue.push_back(*node_id);
        }
    }

    let mut visited_count = 0usize;
    while let Some(node_id) = queue.pop_front() {
        visited_count += 1;
        if let Some(children) = adjacency.get(&node_id) {
            for child in children {
                if let Some(child_degree) = indegree.get_mut(child) {
                    *child_degree -= 1;
                    if *child_degree == 0 {
                        queue.push_back(*child);
                    }
                }
            }
        }
    }

    visited_count != nodes.len()
}
