use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use anyhow::anyhow;

use crate::error::{LibError, Result};
use crate::models::{Outline, OutlineId, OutlineSummary};

/// Repository for whole outline documents. Every mutation of an outline is a
/// wholesale read-modify-write of one document; the last writer wins.
pub trait OutlineStore: Send + Sync {
    /// Prepares the backing medium. Safe to call more than once.
    fn init(&self) -> Result<()>;
    fn load(&self, outline_id: OutlineId) -> Result<Outline>;
    fn save(&self, outline: &Outline) -> Result<()>;
    fn remove(&self, outline_id: OutlineId) -> Result<()>;
    fn list(&self) -> Result<Vec<OutlineSummary>>;
    /// Pushes buffered writes down to the medium. No-op for write-through stores.
    fn flush(&self) -> Result<()>;
}

fn not_found(outline_id: OutlineId) -> LibError {
    LibError::not_found(
        "Outline not found",
        anyhow!("outline {} not found", outline_id),
    )
}

fn sort_summaries(summaries: &mut [OutlineSummary]) {
    summaries.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| b.id.0.cmp(&a.id.0))
    });
}

#[derive(Default)]
pub struct MemoryStore {
    outlines: RwLock<HashMap<OutlineId, Outline>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutlineStore for MemoryStore {
    fn init(&self) -> Result<()> {
        Ok(())
    }

    fn load(&self, outline_id: OutlineId) -> Result<Outline> {
        self.outlines
            .read()
            .expect("outline store lock poisoned")
            .get(&outline_id)
            .cloned()
            .ok_or_else(|| not_found(outline_id))
    }

    fn save(&self, outline: &Outline) -> Result<()> {
        self.outlines
            .write()
            .expect("outline store lock poisoned")
            .insert(outline.id, outline.clone());
        Ok(())
    }

    fn remove(&self, outline_id: OutlineId) -> Result<()> {
        self.outlines
            .write()
            .expect("outline store lock poisoned")
            .remove(&outline_id)
            .map(|_| ())
            .ok_or_else(|| not_found(outline_id))
    }

    fn list(&self) -> Result<Vec<OutlineSummary>> {
        let mut summaries: Vec<OutlineSummary> = self
            .outlines
            .read()
            .expect("outline store lock poisoned")
            .values()
            .map(OutlineSummary::from)
            .collect();
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// One pretty-printed JSON document per outline id under `root`, rewritten
/// wholesale on every save through a temp file and rename.
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn document_path(&self, outline_id: OutlineId) -> PathBuf {
        self.root.join(format!("{outline_id}.json"))
    }
}

impl OutlineStore for JsonFileStore {
    fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        tracing::info!(root = %self.root.display(), "outline store initialized");
        Ok(())
    }

    fn load(&self, outline_id: OutlineId) -> Result<Outline> {
        let path = self.document_path(outline_id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(not_found(outline_id));
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, outline: &Outline) -> Result<()> {
        let path = self.document_path(outline.id);
        let tmp = path.with_extension("json.tmp");
        let raw = serde_json::to_string_pretty(outline)?;
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &path)?;
        tracing::debug!(
            outline_id = %outline.id,
            nodes = outline.nodes.len(),
            "saved outline document"
        );
        Ok(())
    }

    fn remove(&self, outline_id: OutlineId) -> Result<()> {
        let path = self.document_path(outline_id);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(outline_id = %outline_id, "removed outline document");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(not_found(outline_id)),
            Err(err) => Err(err.into()),
        }
    }

    fn list(&self) -> Result<Vec<OutlineSummary>> {
        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let raw = fs::read_to_string(&path)?;
            let outline: Outline = serde_json::from_str(&raw)?;
            summaries.push(OutlineSummary::from(&outline));
        }
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
