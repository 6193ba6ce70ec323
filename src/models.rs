use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::algorithms;
use crate::error::{LibError, Result};
use crate::invariants;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct OutlineId(pub Uuid);

impl fmt::Display for OutlineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OutlineId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

impl From<Uuid> for OutlineId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct NodeId(pub Uuid);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

impl From<Uuid> for NodeId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineNode {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    pub order: u32,
    pub title: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutlineInvariantViolation {
    UnknownParentReference {
        node_id: NodeId,
        missing_parent_id: NodeId,
    },
    SelfParent {
        node_id: NodeId,
    },
    CycleDetected,
    DuplicateSiblingOrder {
        parent_id: Option<NodeId>,
        order: u32,
    },
}

impl OutlineInvariantViolation {
    pub const fn error_code(&self) -> &'static str {
        match self {
            OutlineInvariantViolation::UnknownParentReference { .. } => "outline_unknown_parent",
            OutlineInvariantViolation::SelfParent { .. } => "outline_self_parent",
            OutlineInvariantViolation::CycleDetected => "outline_cycle",
            OutlineInvariantViolation::DuplicateSiblingOrder { .. } => "outline_duplicate_order",
        }
    }

    pub const fn public_message(&self) -> &'static str {
        match self {
            OutlineInvariantViolation::UnknownParentReference { .. } => {
                "Node references a parent that does not exist"
            }
            OutlineInvariantViolation::SelfParent { .. } => "A node cannot be its own parent",
            OutlineInvariantViolation::CycleDetected => {
                "A node must never appear in its own ancestor chain"
            }
            OutlineInvariantViolation::DuplicateSiblingOrder { .. } => {
                "Sibling order values must be unique under a parent"
            }
        }
    }
}

/// One owning entity's tree, read and rewritten as a unit on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outline {
    pub id: OutlineId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub metadata: Value,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub nodes: Vec<OutlineNode>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineSummary {
    pub id: OutlineId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub node_count: usize,
}

impl From<&Outline> for OutlineSummary {
    fn from(value: &Outline) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
            description: value.description.clone(),
            created_at: value.created_at,
            updated_at: value.updated_at,
            node_count: value.nodes.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    pub page: u32,
    pub limit: u32,
    pub items: Vec<T>,
}

/// Nested read view assembled from the flat node set, siblings sorted by `order`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    #[serde(flatten)]
    pub node: OutlineNode,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOutlineNode {
    pub id: Option<NodeId>,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    pub order: Option<u32>,
    pub title: String,
    #[serde(default)]
    pub done: bool,
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutlinePayload {
    pub name: String,
    pub description: Option<String>,
    pub metadata: Option<Value>,
    #[serde(default)]
    pub nodes: Vec<NewOutlineNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceOutlinePayload {
    pub name: String,
    pub description: Option<String>,
    pub metadata: Option<Value>,
    #[serde(default)]
    pub nodes: Vec<NewOutlineNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOutlinesQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct OutlineDefinition {
    pub name: String,
    pub description: Option<String>,
    pub metadata: Value,
    pub nodes: Vec<OutlineNode>,
}

impl ListOutlinesQuery {
    pub fn pagination(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(25).clamp(1, 200);
        (page, limit)
    }
}

impl CreateOutlinePayload {
    pub fn normalize(self) -> Result<OutlineDefinition> {
        normalize_outline_definition(self.name, self.description, self.metadata, self.nodes)
    }
}

impl ReplaceOutlinePayload {
    pub fn normalize(self) -> Result<OutlineDefinition> {
        normalize_outline_definition(self.name, self.description, self.metadata, self.nodes)
    }
}

fn normalize_outline_definition(
    name: String,
    description: Option<String>,
    metadata: Option<Value>,
    nodes: Vec<NewOutlineNode>,
) -> Result<OutlineDefinition> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(LibError::invalid(
            "Outline name is required",
            anyhow!("empty outline name"),
        ));
    }

    let nodes = normalize_nodes(nodes)?;

    Ok(OutlineDefinition {
        name,
        description,
        metadata: metadata.unwrap_or_else(|| json!({})),
        nodes,
    })
}

fn normalize_nodes(nodes: Vec<NewOutlineNode>) -> Result<Vec<OutlineNode>> {
    let mut seen_nodes = HashSet::with_capacity(nodes.len());
    let mut output_nodes = Vec::with_capacity(nodes.len());
    let mut missing_order = Vec::new();
    for (index, node) in nodes.into_iter().enumerate() {
        let node_id = node.id.unwrap_or_else(|| NodeId(Uuid::new_v4()));
        let title = node.title.trim().to_string();
        if title.is_empty() {
            return Err(LibError::invalid(
                "Node title is required",
                anyhow!("node {} had empty title", node_id),
            ));
        }

        if !seen_nodes.insert(node_id) {
            return Err(LibError::invalid(
                "Node IDs must be unique within an outline",
                anyhow!("duplicate node id {}", node_id),
            ));
        }

        if node.order.is_none() {
            missing_order.push(index);
        }

        output_nodes.push(OutlineNode {
            id: node_id,
            parent_id: node.parent_id,
            order: node.order.unwrap_or(0),
            title,
            done: node.done,
            payload: node.payload.unwrap_or(Value::Null),
        });
    }

    // Nodes without an explicit order are appended after the largest explicit
    // order in their sibling group, preserving input order among themselves.
    let mut max_order: HashMap<Option<NodeId>, u32> = HashMap::new();
    for (index, node) in output_nodes.iter().enumerate() {
        if !missing_order.contains(&index) {
            let entry = max_order.entry(node.parent_id).or_insert(0);
            *entry = (*entry).max(node.order);
        }
    }
    for index in missing_order {
        let parent_id = output_nodes[index].parent_id;
        let entry = max_order.entry(parent_id).or_insert(0);
        *entry += 1;
        output_nodes[index].order = *entry;
    }

    invariants::ensure_outline_invariants(&output_nodes)?;
    algorithms::renumber_siblings(&mut output_nodes);

    Ok(output_nodes)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{CreateOutlinePayload, NewOutlineNode, NodeId, ReplaceOutlinePayload};

    fn new_node(
        id: Option<NodeId>,
        parent_id: Option<NodeId>,
        order: Option<u32>,
        title: &str,
    ) -> NewOutlineNode {
        NewOutlineNode {
            id,
            parent_id,
            order,
            title: title.to_string(),
            done: false,
            payload: None,
        }
    }

    #[test]
    fn normalize_outline_generates_node_ids() {
        let payload = CreateOutlinePayload {
            name: "Subtasks".to_string(),
            description: None,
            metadata: None,
            nodes: vec![
                new_node(None, None, None, "draft"),
                new_node(None, None, None, "review"),
            ],
        };

        let normalized = payload.normalize().expect("payload should normalize");
        assert_eq!(normalized.nodes.len(), 2);
        assert_ne!(normalized.nodes[0].id, normalized.nodes[1].id);
        assert_eq!(normalized.nodes[0].order, 1);
        assert_eq!(normalized.nodes[1].order, 2);
    }

    #[test]
    fn normalize_outline_rejects_empty_name() {
        let payload = CreateOutlinePayload {
            name: "   ".to_string(),
            description: None,
            metadata: None,
            nodes: vec![],
        };

        let err = payload.normalize().expect_err("should reject blank name");
        assert_eq!(err.public, "Outline name is required");
    }

    #[test]
    fn normalize_outline_rejects_unknown_parent() {
        let missing = NodeId(uuid::Uuid::new_v4());
        let payload = CreateOutlinePayload {
            name: "Accounts".to_string(),
            description: None,
            metadata: None,
            nodes: vec![new_node(None, Some(missing), None, "assets")],
        };

        let err = payload.normalize().expect_err("should reject missing parent");
        assert_eq!(err.code, "outline_unknown_parent");
    }

    #[test]
    fn normalize_outline_rejects_parent_cycle() {
        let node_a = NodeId(uuid::Uuid::new_v4());
        let node_b = NodeId(uuid::Uuid::new_v4());
        let payload = ReplaceOutlinePayload {
            name: "Departments".to_string(),
            description: None,
            metadata: None,
            nodes: vec![
                new_node(Some(node_a), Some(node_b), None, "A"),
                new_node(Some(node_b), Some(node_a), None, "B"),
            ],
        };

        let err = payload.normalize().expect_err("parent cycle should fail");
        assert_eq!(err.code, "outline_cycle");
    }

    #[test]
    fn normalize_outline_rejects_duplicate_sibling_order() {
        let payload = CreateOutlinePayload {
            name: "Budget".to_string(),
            description: None,
            metadata: None,
            nodes: vec![
                new_node(None, None, Some(3), "Q1"),
                new_node(None, None, Some(3), "Q2"),
            ],
        };

        let err = payload.normalize().expect_err("duplicate order should fail");
        assert_eq!(err.code, "outline_duplicate_order");
    }

    #[test]
    fn normalize_outline_renumbers_gapped_orders() {
        let payload = CreateOutlinePayload {
            name: "Audit".to_string(),
            description: None,
            metadata: Some(json!({"source": "test"})),
            nodes: vec![
                new_node(None, None, Some(10), "first"),
                new_node(None, None, Some(40), "second"),
                new_node(None, None, None, "appended"),
            ],
        };

        let normalized = payload.normalize().expect("payload should normalize");
        let orders: Vec<u32> = normalized.nodes.iter().map(|node| node.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert_eq!(normalized.nodes[2].title, "appended");
    }

    #[test]
    fn normalize_outline_trims_titles() {
        let payload = CreateOutlinePayload {
            name: "Inbox".to_string(),
            description: None,
            metadata: None,
            nodes: vec![new_node(None, None, None, "  with spaces  ")],
        };

        let normalized = payload.normalize().expect("payload should normalize");
        assert_eq!(normalized.nodes[0].title, "with spaces");
    }
}
