//! The remote persistence service, as the import engine sees it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use orgimport_core::batching::{BatchImportItem, BatchOutcome, ItemFailure};
use orgimport_core::types::{EntityKind, ExistingKeys};
use tokio::sync::RwLock;

use crate::controller::BatchProcessor;
use crate::error::PipelineError;

/// Query and mutation calls the engine makes against the remote service.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Codes already persisted for `entity`.
    async fn existing_keys(&self, entity: EntityKind) -> Result<HashSet<String>, PipelineError>;

    /// Apply one batch of create/update items, reporting each item.
    async fn apply(&self, items: &[BatchImportItem]) -> Result<BatchOutcome, PipelineError>;
}

/// Fetch the key sets for both entity types.
pub async fn fetch_existing_keys(store: &dyn RecordStore) -> Result<ExistingKeys, PipelineError> {
    let departments = store.existing_keys(EntityKind::Department).await?;
    let positions = store.existing_keys(EntityKind::Position).await?;
    Ok(ExistingKeys::new(departments, positions))
}

/// Adapts a [`RecordStore`] to the batch controller.
pub struct StoreProcessor {
    store: Arc<dyn RecordStore>,
}

impl StoreProcessor {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BatchProcessor for StoreProcessor {
    async fn process(&self, items: &[BatchImportItem]) -> Result<BatchOutcome, PipelineError> {
        self.store.apply(items).await
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Item types understood by [`InMemoryStore`]: `"<entity>.<operation>"`.
fn parse_item_type(item_type: &str) -> Option<(EntityKind, bool)> {
    let (entity, operation) = item_type.split_once('.')?;
    let entity = match entity {
        "department" => EntityKind::Department,
        "position" => EntityKind::Position,
        _ => return None,
    };
    let is_create = match operation {
        "create" => true,
        "update" => false,
        _ => return None,
    };
    Some((entity, is_create))
}

/// Keeps records in process memory, keyed by entity and code.
///
/// Creates fail when the code exists and updates fail when it does not,
/// the way a remote service with unique codes would answer. Used for dry
/// runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<EntityKind, HashMap<String, serde_json::Value>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with codes that already exist.
    pub fn with_existing(existing: &ExistingKeys) -> Self {
        let mut records: HashMap<EntityKind, HashMap<String, serde_json::Value>> = HashMap::new();
        for entity in [EntityKind::Department, EntityKind::Position] {
            let slot = records.entry(entity).or_default();
            for code in existing.for_entity(entity) {
                slot.insert(code.clone(), serde_json::Value::Null);
            }
        }
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn count(&self, entity: EntityKind) -> usize {
        self.records
            .read()
            .await
            .get(&entity)
            .map_or(0, HashMap::len)
    }

    pub async fn get(&self, entity: EntityKind, code: &str) -> Option<serde_json::Value> {
        self.records
            .read()
            .await
            .get(&entity)
            .and_then(|records| records.get(code).cloned())
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn existing_keys(&self, entity: EntityKind) -> Result<HashSet<String>, PipelineError> {
        Ok(self
            .records
            .read()
            .await
            .get(&entity)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn apply(&self, items: &[BatchImportItem]) -> Result<BatchOutcome, PipelineError> {
        let mut records = self.records.write().await;
        let mut outcome = BatchOutcome::default();

        for item in items {
            let verdict = match parse_item_type(&item.item_type) {
                None => Err(format!("Unsupported item type '{}'", item.item_type)),
                Some((entity, is_create)) => {
                    match item.payload.get("code").and_then(|c| c.as_str()) {
                        None => Err("Payload has no code".to_string()),
                        Some(code) => {
                            let slot = records.entry(entity).or_default();
                            match (is_create, slot.contains_key(code)) {
                                (true, true) => Err(format!("{entity} '{code}' already exists")),
                                (false, false) => Err(format!("{entity} '{code}' does not exist")),
                                _ => {
                                    slot.insert(code.to_string(), item.payload.clone());
                                    Ok(())
                                }
                            }
                        }
                    }
                }
            };

            match verdict {
                Ok(()) => outcome.succeeded.push(item.clone()),
                Err(error) => outcome.failed.push(ItemFailure {
                    item: item.clone(),
                    error,
                }),
            }
        }

        Ok(outcome)
    }
}
