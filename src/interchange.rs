use std::collections::HashMap;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::algorithms;
use crate::error::{LibError, Result};
use crate::models::{NodeId, OutlineNode};

/// External nesting shape for import/export. Internal ids and timestamps are
/// never part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedNode {
    pub title: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NestedNode>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

pub fn parse_nested_json(input: &str) -> Result<Vec<NestedNode>> {
    let items: Vec<NestedNode> = serde_json::from_str(input).map_err(|err| {
        LibError::invalid(
            "Import payload must be an array of titled nodes",
            anyhow!(err),
        )
    })?;
    validate_nested(&items)?;
    Ok(items)
}

/// Rejects the whole payload when any node is malformed. Nothing is ever
/// partially applied.
pub fn validate_nested(items: &[NestedNode]) -> Result<()> {
    let mut stack: Vec<&NestedNode> = items.iter().collect();
    while let Some(item) = stack.pop() {
        if item.title.trim().is_empty() {
            return Err(LibError::invalid(
                "Imported node title is required",
                anyhow!("import contained a node with an empty title"),
            ));
        }
        stack.extend(item.children.iter());
    }
    Ok(())
}

/// Flattens a nested import into outline nodes with fresh ids. Roots start at
/// `first_order` under `parent_id`; every deeper level numbers from 1.
pub fn flatten_nested(
    items: &[NestedNode],
    parent_id: Option<NodeId>,
    first_order: u32,
) -> Vec<OutlineNode> {
    let mut output = Vec::new();
    let mut stack: Vec<(&NestedNode, Option<NodeId>, u32)> = items
        .iter()
        .enumerate()
        .rev()
        .map(|(index, item)| (item, parent_id, first_order + index as u32))
        .collect();

    while let Some((item, parent, order)) = stack.pop() {
        let node_id = NodeId(Uuid::new_v4());
        output.push(OutlineNode {
            id: node_id,
            parent_id: parent,
            order,
            title: item.title.trim().to_string(),
            done: item.done,
            payload: item.payload.clone(),
        });
        for (index, child) in item.children.iter().enumerate().rev() {
            stack.push((child, Some(node_id), index as u32 + 1));
        }
    }

    output
}

pub fn nested_view(nodes: &[OutlineNode]) -> Vec<NestedNode> {
    let parents: HashMap<NodeId, Option<NodeId>> = nodes
        .iter()
        .map(|node| (node.id, node.parent_id))
        .collect();
    let mut views: HashMap<NodeId, NestedNode> = nodes
        .iter()
        .map(|node| {
            (
                node.id,
                NestedNode {
                    title: node.title.clone(),
                    done: node.done,
                    payload: node.payload.clone(),
                    children: Vec::new(),
                },
            )
        })
        .collect();

    let ordered = algorithms::preorder(nodes);
    let mut roots = Vec::new();
    for (_, node_id) in ordered.iter().rev() {
        let view = views
            .remove(node_id)
            .expect("preorder ids should exist in the view map");
        match parents.get(node_id).copied().flatten() {
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

/// Newline-delimited outline text. Leading tabs or double-spaces encode depth;
/// a single top-to-bottom scan assigns parents via the current-ancestor stack.
pub fn parse_outline_text(text: &str) -> Result<Vec<NestedNode>> {
    let mut entries = Vec::new();
    for line in text.lines() {
        let title = line.trim();
        if title.is_empty() {
            continue;
        }
        let rest = line.trim_start_matches([' ', '\t']);
        let prefix = &line[..line.len() - rest.len()];
        let tabs = prefix.matches('\t').count();
        let spaces = prefix.matches(' ').count();
        entries.push((
            tabs + spaces / 2,
            NestedNode {
                title: title.to_string(),
                done: false,
                payload: Value::Null,
                children: Vec::new(),
            },
        ));
    }

    Ok(assemble(entries))
}

fn assemble(entries: Vec<(usize, NestedNode)>) -> Vec<NestedNode> {
    let mut parents: Vec<Option<usize>> = Vec::with_capacity(entries.len());
    let mut last_at_depth: Vec<usize> = Vec::new();
    for (index, (raw_depth, _)) in entries.iter().enumerate() {
        // A line deeper than its predecessor plus one clamps to one level down.
        let depth = (*raw_depth).min(last_at_depth.len());
        parents.push(if depth == 0 {
            None
        } else {
            Some(last_at_depth[depth - 1])
        });
        last_at_depth.truncate(depth);
        last_at_depth.push(index);
    }

    let mut slots: Vec<Option<NestedNode>> = entries
        .into_iter()
        .map(|(_, node)| Some(node))
        .collect();
    let mut roots = Vec::new();
    for index in (0..slots.len()).rev() {
        let node = slots[index]
            .take()
            .expect("each entry should be taken exactly once");
        match parents[index] {
            Some(parent) => slots[parent]
                .as_mut()
                .expect("a parent is taken only after its children")
                .children
                .insert(0, node),
            None => roots.insert(0, node),
        }
    }

    roots
}

pub fn export_csv(nodes: &[OutlineNode]) -> String {
    let lookup: HashMap<NodeId, &OutlineNode> =
        nodes.iter().map(|node| (node.id, node)).collect();

    let mut out = String::from("depth,order,title,done\n");
    for (depth, node_id) in algorithms::preorder(nodes) {
        let node = lookup
            .get(&node_id)
            .expect("preorder ids should exist in the lookup map");
        out.push_str(&format!(
            "{},{},{},{}\n",
            depth,
            node.order,
            csv_escape(&node.title),
            node.done
        ));
    }
    out
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
