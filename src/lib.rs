pub mod algorithms;
pub mod cascade;
pub mod error;
pub mod interchange;
pub mod invariants;
pub mod models;
pub mod operations;
pub mod rules;
pub mod store;

pub mod prelude {
    pub use crate::algorithms::{build_tree, children_map, descendant_ids, renumber_siblings};
    pub use crate::cascade::{apply_done, cascade_down, cascade_up};
    pub use crate::error::{ErrorKind, LibError, Result};
    pub use crate::interchange::{
        NestedNode, export_csv, flatten_nested, nested_view, parse_nested_json,
        parse_outline_text,
    };
    pub use crate::invariants::{ensure_outline_invariants, would_create_cycle};
    pub use crate::models::{
        CreateOutlinePayload, ListOutlinesQuery, NewOutlineNode, NodeId, Outline, OutlineId,
        OutlineNode, OutlineSummary, Paged, ReplaceOutlinePayload, TreeNode,
    };
    pub use crate::operations::{
        MoveNodePayload, OutlineOperation, OutlineOperationResult, OutlineOperations,
        UpsertNodePayload,
    };
    pub use crate::rules::{Comparator, Condition, ValueKind, evaluate, lookup_path};
    pub use crate::store::{JsonFileStore, MemoryStore, OutlineStore};
}
