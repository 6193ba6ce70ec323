use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::algorithms;
use crate::cascade;
use crate::error::{LibError, Result};
use crate::interchange::{self, NestedNode};
use crate::invariants;
use crate::models::{
    CreateOutlinePayload, ListOutlinesQuery, NodeId, Outline, OutlineId, OutlineNode,
    OutlineSummary, Paged, ReplaceOutlinePayload, TreeNode,
};
use crate::store::OutlineStore;

/// High-level outline actions.
///
/// Every node-level variant is an atomic read-modify-write of one outline
/// document; invariants are re-checked before anything is persisted.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OutlineOperation {
    Create {
        payload: CreateOutlinePayload,
    },
    Replace {
        outline_id: OutlineId,
        payload: ReplaceOutlinePayload,
    },
    Get {
        outline_id: OutlineId,
    },
    List {
        query: ListOutlinesQuery,
    },
    Delete {
        outline_id: OutlineId,
    },
    Tree {
        outline_id: OutlineId,
    },
    UpsertNode {
        outline_id: OutlineId,
        payload: UpsertNodePayload,
    },
    DeleteNode {
        outline_id: OutlineId,
        node_id: NodeId,
    },
    MoveNode {
        outline_id: OutlineId,
        payload: MoveNodePayload,
    },
    ReorderUp {
        outline_id: OutlineId,
        node_id: NodeId,
    },
    ReorderDown {
        outline_id: OutlineId,
        node_id: NodeId,
    },
    Indent {
        outline_id: OutlineId,
        node_id: NodeId,
    },
    Outdent {
        outline_id: OutlineId,
        node_id: NodeId,
    },
    SetDone {
        outline_id: OutlineId,
        node_id: NodeId,
        done: bool,
    },
    ImportNested {
        outline_id: OutlineId,
        items: Vec<NestedNode>,
    },
    ImportText {
        outline_id: OutlineId,
        text: String,
    },
    ExportNested {
        outline_id: OutlineId,
    },
    ExportCsv {
        outline_id: OutlineId,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertNodePayload {
    pub id: Option<NodeId>,
    /// Absent leaves placement untouched; present-but-null re-parents to the
    /// root level.
    #[serde(default)]
    pub parent_id: Option<Option<NodeId>>,
    pub title: Option<String>,
    pub done: Option<bool>,
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveNodePayload {
    pub node_id: NodeId,
    pub new_parent_id: Option<NodeId>,
    /// 1-based slot among the new siblings; appends when absent.
    pub new_order: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OutlineOperationResult {
    Outline {
        outline: Outline,
    },
    OutlinesPage {
        page: u32,
        limit: u32,
        items: Vec<OutlineSummary>,
    },
    Tree {
        roots: Vec<TreeNode>,
    },
    Nested {
        items: Vec<NestedNode>,
    },
    Csv {
        csv: String,
    },
    Deleted,
}

#[derive(Clone)]
pub struct OutlineOperations {
    store: Arc<dyn OutlineStore>,
}

impl OutlineOperations {
    pub fn new(store: Arc<dyn OutlineStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn OutlineStore> {
        Arc::clone(&self.store)
    }

    pub fn execute(&self, operation: OutlineOperation) -> Result<OutlineOperationResult> {
        match operation {
            OutlineOperation::Create { payload } => {
                let outline = self.create_outline(payload)?;
                Ok(OutlineOperationResult::Outline { outline })
            }
            OutlineOperation::Replace {
                outline_id,
                payload,
            } => {
                let outline = self.replace_outline(outline_id, payload)?;
                Ok(OutlineOperationResult::Outline { outline })
            }
            OutlineOperation::Get { outline_id } => {
                let outline = self.get_outline(outline_id)?;
                Ok(OutlineOperationResult::Outline { outline })
            }
            OutlineOperation::List { query } => {
                let page = self.list_outlines(query)?;
                Ok(OutlineOperationResult::OutlinesPage {
                    page: page.page,
                    limit: page.limit,
                    items: page.items,
                })
            }
            OutlineOperation::Delete { outline_id } => {
                self.delete_outline(outline_id)?;
                Ok(OutlineOperationResult::Deleted)
            }
            OutlineOperation::Tree { outline_id } => {
                let roots = self.tree(outline_id)?;
                Ok(OutlineOperationResult::Tree { roots })
            }
            OutlineOperation::UpsertNode {
                outline_id,
                payload,
            } => {
                let outline = self.upsert_node(outline_id, payload)?;
                Ok(OutlineOperationResult::Outline { outline })
            }
            OutlineOperation::DeleteNode {
                outline_id,
                node_id,
            } => {
                let outline = self.delete_node(outline_id, node_id)?;
                Ok(OutlineOperationResult::Outline { outline })
            }
            OutlineOperation::MoveNode {
                outline_id,
                payload,
            } => {
                let outline = self.move_node(outline_id, payload)?;
                Ok(OutlineOperationResult::Outline { outline })
            }
            OutlineOperation::ReorderUp {
                outline_id,
                node_id,
            } => {
                let outline = self.reorder_up(outline_id, node_id)?;
                Ok(OutlineOperationResult::Outline { outline })
            }
            OutlineOperation::ReorderDown {
                outline_id,
                node_id,
            } => {
                let outline = self.reorder_down(outline_id, node_id)?;
                Ok(OutlineOperationResult::Outline { outline })
            }
            OutlineOperation::Indent {
                outline_id,
                node_id,
            } => {
                let outline = self.indent(outline_id, node_id)?;
                Ok(OutlineOperationResult::Outline { outline })
            }
            OutlineOperation::Outdent {
                outline_id,
                node_id,
            } => {
                let outline = self.outdent(outline_id, node_id)?;
                Ok(OutlineOperationResult::Outline { outline })
            }
            OutlineOperation::SetDone {
                outline_id,
                node_id,
                done,
            } => {
                let outline = self.set_done(outline_id, node_id, done)?;
                Ok(OutlineOperationResult::Outline { outline })
            }
            OutlineOperation::ImportNested { outline_id, items } => {
                let outline = self.import_nested(outline_id, items)?;
                Ok(OutlineOperationResult::Outline { outline })
            }
            OutlineOperation::ImportText { outline_id, text } => {
                let outline = self.import_text(outline_id, &text)?;
                Ok(OutlineOperationResult::Outline { outline })
            }
            OutlineOperation::ExportNested { outline_id } => {
                let items = self.export_nested(outline_id)?;
                Ok(OutlineOperationResult::Nested { items })
            }
            OutlineOperation::ExportCsv { outline_id } => {
                let csv = self.export_csv(outline_id)?;
                Ok(OutlineOperationResult::Csv { csv })
            }
        }
    }

    pub fn create_outline(&self, payload: CreateOutlinePayload) -> Result<Outline> {
        let definition = payload.normalize()?;
        let now = Utc::now().naive_utc();
        let outline = Outline {
            id: OutlineId(Uuid::new_v4()),
            name: definition.name,
            description: definition.description,
            metadata: definition.metadata,
            created_at: now,
            updated_at: now,
            nodes: definition.nodes,
        };
        self.store.save(&outline)?;
        tracing::info!(outline_id = %outline.id, nodes = outline.nodes.len(), "created outline");
        Ok(outline)
    }

    pub fn replace_outline(
        &self,
        outline_id: OutlineId,
        payload: ReplaceOutlinePayload,
    ) -> Result<Outline> {
        let definition = payload.normalize()?;
        let mut outline = self.store.load(outline_id)?;
        outline.name = definition.name;
        outline.description = definition.description;
        outline.metadata = definition.metadata;
        outline.nodes = definition.nodes;
        outline.updated_at = Utc::now().naive_utc();
        self.store.save(&outline)?;
        Ok(outline)
    }

    pub fn get_outline(&self, outline_id: OutlineId) -> Result<Outline> {
        self.store.load(outline_id)
    }

    pub fn list_outlines(&self, query: ListOutlinesQuery) -> Result<Paged<OutlineSummary>> {
        let (page, limit) = query.pagination();
        let offset = (page as usize - 1).saturating_mul(limit as usize);
        let items = self
            .store
            .list()?
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect();
        Ok(Paged { page, limit, items })
    }

    pub fn delete_outline(&self, outline_id: OutlineId) -> Result<()> {
        self.store.remove(outline_id)?;
        tracing::info!(outline_id = %outline_id, "deleted outline");
        Ok(())
    }

    pub fn tree(&self, outline_id: OutlineId) -> Result<Vec<TreeNode>> {
        let outline = self.store.load(outline_id)?;
        Ok(algorithms::build_tree(&outline.nodes))
    }

    pub fn upsert_node(
        &self,
        outline_id: OutlineId,
        payload: UpsertNodePayload,
    ) -> Result<Outline> {
        self.mutate(outline_id, "upsert_node", move |nodes| {
            let existing = payload
                .id
                .and_then(|id| nodes.iter().position(|node| node.id == id));
            match existing {
                Some(index) => {
                    if let Some(title) = payload.title {
                        let title = title.trim().to_string();
                        if title.is_empty() {
                            return Err(LibError::invalid(
                                "Node title is required",
                                anyhow!("node {} had empty title", nodes[index].id),
                            ));
                        }
                        nodes[index].title = title;
                    }
                    if let Some(done) = payload.done {
                        nodes[index].done = done;
                    }
                    if let Some(value) = payload.payload {
                        nodes[index].payload = value;
                    }
                    if let Some(new_parent_id) = payload.parent_id {
                        let node_id = nodes[index].id;
                        if new_parent_id != nodes[index].parent_id {
                            if let Some(parent_id) = new_parent_id {
                                require_node(nodes, parent_id)?;
                            }
                            if invariants::would_create_cycle(nodes, node_id, new_parent_id) {
                                return Err(cycle_error(node_id, new_parent_id));
                            }
                            nodes[index].parent_id = new_parent_id;
                            place_in_siblings(nodes, node_id, new_parent_id, None);
                        }
                    }
                    Ok(())
                }
                None => {
                    let title = payload
                        .title
                        .as_deref()
                        .map(str::trim)
                        .filter(|title| !title.is_empty())
                        .ok_or_else(|| {
                            LibError::invalid(
                                "Node title is required",
                                anyhow!("insert without a title"),
                            )
                        })?
                        .to_string();
                    let parent_id = payload.parent_id.flatten();
                    if let Some(parent_id) = parent_id {
                        require_node(nodes, parent_id)?;
                    }
                    let order = next_order(nodes, parent_id);
                    nodes.push(OutlineNode {
                        id: payload.id.unwrap_or_else(|| NodeId(Uuid::new_v4())),
                        parent_id,
                        order,
                        title,
                        done: payload.done.unwrap_or(false),
                        payload: payload.payload.unwrap_or(Value::Null),
                    });
                    Ok(())
                }
            }
        })
    }

    pub fn delete_node(&self, outline_id: OutlineId, node_id: NodeId) -> Result<Outline> {
        self.mutate(outline_id, "delete_node", move |nodes| {
            require_node(nodes, node_id)?;
            let doomed = algorithms::descendant_ids(nodes, node_id);
            nodes.retain(|node| node.id != node_id && !doomed.contains(&node.id));
            Ok(())
        })
    }

    pub fn move_node(&self, outline_id: OutlineId, payload: MoveNodePayload) -> Result<Outline> {
        self.mutate(outline_id, "move_node", move |nodes| {
            let index = require_node(nodes, payload.node_id)?;
            if let Some(parent_id) = payload.new_parent_id {
                require_node(nodes, parent_id)?;
            }
            if invariants::would_create_cycle(nodes, payload.node_id, payload.new_parent_id) {
                return Err(cycle_error(payload.node_id, payload.new_parent_id));
            }
            nodes[index].parent_id = payload.new_parent_id;
            place_in_siblings(nodes, payload.node_id, payload.new_parent_id, payload.new_order);
            Ok(())
        })
    }

    pub fn reorder_up(&self, outline_id: OutlineId, node_id: NodeId) -> Result<Outline> {
        self.reorder(outline_id, "reorder_up", node_id, Direction::Up)
    }

    pub fn reorder_down(&self, outline_id: OutlineId, node_id: NodeId) -> Result<Outline> {
        self.reorder(outline_id, "reorder_down", node_id, Direction::Down)
    }

    fn reorder(
        &self,
        outline_id: OutlineId,
        operation: &'static str,
        node_id: NodeId,
        direction: Direction,
    ) -> Result<Outline> {
        self.mutate(outline_id, operation, move |nodes| {
            let index = require_node(nodes, node_id)?;
            let siblings = algorithms::sorted_children(nodes, nodes[index].parent_id);
            let position = siblings
                .iter()
                .position(|id| *id == node_id)
                .expect("node should appear in its sibling group");
            let neighbor = match direction {
                Direction::Up => position.checked_sub(1),
                Direction::Down => (position + 1 < siblings.len()).then_some(position + 1),
            };
            // Boundary: nothing to swap with.
            let Some(neighbor) = neighbor else {
                return Ok(());
            };
            swap_orders(nodes, node_id, siblings[neighbor]);
            Ok(())
        })
    }

    pub fn indent(&self, outline_id: OutlineId, node_id: NodeId) -> Result<Outline> {
        self.mutate(outline_id, "indent", move |nodes| {
            let index = require_node(nodes, node_id)?;
            let siblings = algorithms::sorted_children(nodes, nodes[index].parent_id);
            let position = siblings
                .iter()
                .position(|id| *id == node_id)
                .expect("node should appear in its sibling group");
            // First sibling has nothing to indent under.
            if position == 0 {
                return Ok(());
            }
            let new_parent_id = siblings[position - 1];
            nodes[index].parent_id = Some(new_parent_id);
            place_in_siblings(nodes, node_id, Some(new_parent_id), None);
            Ok(())
        })
    }

    pub fn outdent(&self, outline_id: OutlineId, node_id: NodeId) -> Result<Outline> {
        self.mutate(outline_id, "outdent", move |nodes| {
            let index = require_node(nodes, node_id)?;
            // Already at root level.
            let Some(parent_id) = nodes[index].parent_id else {
                return Ok(());
            };
            let parent_index = require_node(nodes, parent_id)?;
            let grandparent_id = nodes[parent_index].parent_id;
            let new_siblings = algorithms::sorted_children(nodes, grandparent_id);
            let parent_position = new_siblings
                .iter()
                .position(|id| *id == parent_id)
                .expect("parent should appear in its sibling group");
            nodes[index].parent_id = grandparent_id;
            // Slot in right after the old parent.
            place_in_siblings(
                nodes,
                node_id,
                grandparent_id,
                Some(parent_position as u32 + 2),
            );
            Ok(())
        })
    }

    pub fn set_done(&self, outline_id: OutlineId, node_id: NodeId, done: bool) -> Result<Outline> {
        self.mutate(outline_id, "set_done", move |nodes| {
            require_node(nodes, node_id)?;
            cascade::apply_done(nodes, node_id, done);
            Ok(())
        })
    }

    pub fn import_nested(
        &self,
        outline_id: OutlineId,
        items: Vec<NestedNode>,
    ) -> Result<Outline> {
        interchange::validate_nested(&items)?;
        self.mutate(outline_id, "import_nested", move |nodes| {
            let first_order = next_order(nodes, None);
            let mut imported = interchange::flatten_nested(&items, None, first_order);
            nodes.append(&mut imported);
            Ok(())
        })
    }

    pub fn import_text(&self, outline_id: OutlineId, text: &str) -> Result<Outline> {
        let items = interchange::parse_outline_text(text)?;
        self.import_nested(outline_id, items)
    }

    pub fn export_nested(&self, outline_id: OutlineId) -> Result<Vec<NestedNode>> {
        let outline = self.store.load(outline_id)?;
        Ok(interchange::nested_view(&outline.nodes))
    }

    pub fn export_csv(&self, outline_id: OutlineId) -> Result<String> {
        let outline = self.store.load(outline_id)?;
        Ok(interchange::export_csv(&outline.nodes))
    }

    fn mutate<F>(&self, outline_id: OutlineId, operation: &'static str, apply: F) -> Result<Outline>
    where
        F: FnOnce(&mut Vec<OutlineNode>) -> Result<()>,
    {
        let mut outline = self.store.load(outline_id)?;
        apply(&mut outline.nodes)?;
        algorithms::renumber_siblings(&mut outline.nodes);
        invariants::ensure_outline_invariants(&outline.nodes)?;
        outline.updated_at = Utc::now().naive_utc();
        self.store.save(&outline)?;
        tracing::debug!(outline_id = %outline_id, operation, "applied outline mutation");
        Ok(outline)
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Up,
    Down,
}

fn require_node(nodes: &[OutlineNode], node_id: NodeId) -> Result<usize> {
    nodes
        .iter()
        .position(|node| node.id == node_id)
        .ok_or_else(|| {
            LibError::not_found("Node not found", anyhow!("node {} not found", node_id))
        })
}

fn cycle_error(node_id: NodeId, new_parent_id: Option<NodeId>) -> LibError {
    LibError::cycle(
        "A node cannot move under itself or one of its descendants",
        anyhow!(
            "re-parenting {} under {:?} would create a cycle",
            node_id,
            new_parent_id
        ),
    )
}

fn next_order(nodes: &[OutlineNode], parent_id: Option<NodeId>) -> u32 {
    nodes
        .iter()
        .filter(|node| node.parent_id == parent_id)
        .map(|node| node.order)
        .max()
        .unwrap_or(0)
        + 1
}

/// Rewrites the orders of `parent_id`'s children so that `node_id` sits at the
/// requested 1-based slot (appended when absent). The node's `parent_id` must
/// already point at the target group.
fn place_in_siblings(
    nodes: &mut [OutlineNode],
    node_id: NodeId,
    parent_id: Option<NodeId>,
    position: Option<u32>,
) {
    let mut siblings: Vec<NodeId> = algorithms::sorted_children(nodes, parent_id)
        .into_iter()
        .filter(|id| *id != node_id)
        .collect();
    let slot = match position {
        Some(position) => (position.saturating_sub(1) as usize).min(siblings.len()),
        None => siblings.len(),
    };
    siblings.insert(slot, node_id);
    for (offset, sibling_id) in siblings.iter().enumerate() {
        if let Some(node) = nodes.iter_mut().find(|node| node.id == *sibling_id) {
            node.order = offset as u32 + 1;
        }
    }
}

fn swap_orders(nodes: &mut [OutlineNode], a: NodeId, b: NodeId) {
    let order_a = nodes
        .iter()
        .find(|node| node.id == a)
        .expect("first node should exist")
        .order;
    let order_b = nodes
        .iter()
        .find(|node| node.id == b)
        .expect("second node should exist")
        .order;
    for node in nodes.iter_mut() {
        if node.id == a {
            node.order = order_b;
        } else if node.id == b {
            node.order = order_a;
        }
    }
}
