//! Process-wide metadata registry.

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::document::parse_entity_document;
use crate::entity::{EntityRecord, EntityRole};

/// Errors raised while loading or parsing metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Filesystem failure while reading documents.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not a well-formed metadata record.
    #[error("malformed metadata: {0}")]
    Malformed(String),
}

/// External source of entity records.
///
/// The engine itself only loads file-based metadata; a database-backed
/// loader or a periodic refresh job lives outside the engine and hands the
/// result over through this trait.
#[async_trait]
pub trait MetadataLoader: Send + Sync {
    /// Loads every record the source knows about.
    async fn load_all(&self) -> Result<Vec<EntityRecord>, MetadataError>;
}

/// Keyed store of every entity known to the engine.
///
/// Records are immutable (`Arc`-shared) and live for the process lifetime
/// unless replaced wholesale by a reload.
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    entries: DashMap<String, Arc<EntityRecord>>,
}

impl MetadataRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record, replacing any record with the same entity ID.
    pub fn register(&self, record: EntityRecord) -> Arc<EntityRecord> {
        let record = Arc::new(record);
        self.entries
            .insert(record.entity_id.clone(), Arc::clone(&record));
        record
    }

    /// Looks up a record by entity ID.
    #[must_use]
    pub fn lookup(&self, entity_id: &str) -> Option<Arc<EntityRecord>> {
        self.entries.get(entity_id).map(|e| Arc::clone(&e))
    }

    /// Removes a record by entity ID.
    pub fn remove(&self, entity_id: &str) {
        self.entries.remove(entity_id);
    }

    /// Replaces the whole registry content with the given records.
    pub fn replace_all(&self, records: Vec<EntityRecord>) {
        self.entries.clear();
        for record in records {
            self.register(record);
        }
    }

    /// Number of registered entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every registered IdP record.
    #[must_use]
    pub fn idp_records(&self) -> Vec<Arc<EntityRecord>> {
        self.entries
            .iter()
            .filter(|e| matches!(e.role, EntityRole::IdP(_)))
            .map(|e| Arc::clone(&e))
            .collect()
    }

    /// Loads every `*.xml` document directly inside `dir`.
    ///
    /// Used for the IdP metadata directory. Unparseable documents are
    /// skipped with a warning so one broken file cannot take the whole
    /// directory down.
    pub fn load_dir(&self, dir: &Path) -> Result<usize, MetadataError> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("xml") {
                continue;
            }
            match self.load_file(&path) {
                Ok(record) => {
                    info!(entity_id = %record.entity_id, path = %path.display(), "loaded metadata");
                    loaded += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping metadata document"),
            }
        }
        Ok(loaded)
    }

    /// Loads guard documents from the per-guard subdirectories of `dir`.
    pub fn load_guards_dir(&self, dir: &Path) -> Result<usize, MetadataError> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                loaded += self.load_dir(&path)?;
            }
        }
        Ok(loaded)
    }

    /// Loads a single metadata document and registers it.
    pub fn load_file(&self, path: &Path) -> Result<Arc<EntityRecord>, MetadataError> {
        let xml = std::fs::read_to_string(path)?;
        let record = parse_entity_document(&xml)?;
        Ok(self.register(record))
    }
}
