//! In-memory remote store.
//!
//! Implements [`MutationExecutor`] over a concurrent map so sessions can run
//! without a network, in the demo binary and in tests. Failures can be
//! injected per item name, per item id, or for the whole store.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tally_engine::{
    Item, ItemFields, ItemId, MutationRequest, MutationResponse, ParentId, TransportError, Variant,
};
use tokio::sync::Mutex;

use crate::executor::MutationExecutor;

/// An item as held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredItem {
    parent_id: ParentId,
    fields: ItemFields,
}

impl StoredItem {
    fn to_item(&self, id: ItemId) -> Item {
        Item {
            id: Some(id),
            parent_id: self.parent_id,
            name: self.fields.name.clone(),
            description: self.fields.description.clone(),
            amount: self.fields.amount,
            image: self.fields.image.clone(),
            stock: self.fields.stock,
        }
    }
}

/// Remote store kept in process memory.
///
/// Thread-safe and can be shared between sessions via `Arc`.
#[derive(Debug)]
pub struct InMemoryStore {
    items: DashMap<(Variant, ItemId), StoredItem>,
    next_id: AtomicU64,
    /// Every request received, in arrival order
    log: Mutex<Vec<MutationRequest>>,
    offline: AtomicBool,
    /// Creates/updates for these names fail
    failing_names: DashMap<String, TransportError>,
    /// Updates/deletes addressed to these ids fail
    failing_ids: DashMap<ItemId, TransportError>,
    /// Creates for these names succeed but return no id
    anonymous_names: DashSet<String>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
            next_id: AtomicU64::new(1),
            log: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
            failing_names: DashMap::new(),
            failing_ids: DashMap::new(),
            anonymous_names: DashSet::new(),
        }
    }

    /// Create a new store wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Insert items directly, bypassing the request log.
    ///
    /// Returns the items with their assigned ids.
    pub fn seed(&self, variant: Variant, parent_id: ParentId, items: Vec<Item>) -> Vec<Item> {
        items
            .into_iter()
            .map(|item| {
                let id = self.allocate_id();
                let stored = StoredItem {
                    parent_id,
                    fields: ItemFields::from_item(variant, &item),
                };
                let seeded = stored.to_item(id);
                self.items.insert((variant, id), stored);
                seeded
            })
            .collect()
    }

    /// Look up an item.
    pub fn get(&self, variant: Variant, id: ItemId) -> Option<Item> {
        self.items
            .get(&(variant, id))
            .map(|entry| entry.value().to_item(id))
    }

    /// All items of a parent, ordered by id.
    pub fn items(&self, variant: Variant, parent_id: ParentId) -> Vec<Item> {
        let mut items: Vec<Item> = self
            .items
            .iter()
            .filter(|entry| entry.key().0 == variant && entry.value().parent_id == parent_id)
            .map(|entry| entry.value().to_item(entry.key().1))
            .collect();
        items.sort_by_key(|item| item.id);
        items
    }

    /// Number of stored items across all parents.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Requests received so far.
    pub async fn requests(&self) -> Vec<MutationRequest> {
        self.log.lock().await.clone()
    }

    /// Number of requests received so far.
    pub async fn call_count(&self) -> usize {
        self.log.lock().await.len()
    }

    /// Make every request fail as unavailable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail creates and updates of items named `name`.
    pub fn fail_name(&self, name: impl Into<String>, error: TransportError) {
        self.failing_names.insert(name.into(), error);
    }

    /// Fail updates and deletes addressed to `id`.
    pub fn fail_id(&self, id: ItemId, error: TransportError) {
        self.failing_ids.insert(id, error);
    }

    /// Accept creates of items named `name` but return no identity.
    pub fn withhold_identity(&self, name: impl Into<String>) {
        self.anonymous_names.insert(name.into());
    }

    /// Remove all injected failures.
    pub fn heal(&self) {
        self.set_offline(false);
        self.failing_names.clear();
        self.failing_ids.clear();
        self.anonymous_names.clear();
    }

    fn allocate_id(&self) -> ItemId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn injected_failure(&self, request: &MutationRequest) -> Option<TransportError> {
        if self.offline.load(Ordering::SeqCst) {
            return Some(TransportError::Unavailable {
                message: "store is offline".into(),
            });
        }

        let by_name = match request {
            MutationRequest::Create(req) => self.failing_names.get(&req.fields.name),
            MutationRequest::Update(req) => self.failing_names.get(&req.fields.name),
            MutationRequest::Delete(_) => None,
        };
        if let Some(error) = by_name {
            return Some(error.value().clone());
        }

        request
            .target_id()
            .and_then(|id| self.failing_ids.get(&id))
            .map(|error| error.value().clone())
    }
}

#[async_trait]
impl MutationExecutor for InMemoryStore {
    async fn execute(&self, request: MutationRequest) -> Result<MutationResponse, TransportError> {
        self.log.lock().await.push(request.clone());

        if let Some(error) = self.injected_failure(&request) {
            tracing::debug!(operation = %request.operation_name(), %error, "Injected failure");
            return Err(error);
        }

        match request {
            MutationRequest::Create(req) => {
                let id = self.allocate_id();
                let withhold = self.anonymous_names.contains(&req.fields.name);
                self.items.insert(
                    (req.variant, id),
                    StoredItem {
                        parent_id: req.parent_id,
                        fields: req.fields,
                    },
                );
                tracing::debug!(variant = %req.variant, id, "Created item");

                Ok(if withhold {
                    MutationResponse::empty()
                } else {
                    MutationResponse::with_id(id)
                })
            }
            MutationRequest::Update(req) => {
                let mut entry = self
                    .items
                    .get_mut(&(req.variant, req.id))
                    .ok_or(TransportError::NotFound { id: req.id })?;
                entry.fields = req.fields;
                tracing::debug!(variant = %req.variant, id = req.id, "Updated item");
                Ok(MutationResponse::with_id(req.id))
            }
            MutationRequest::Delete(req) => {
                self.items
                    .remove(&(req.variant, req.id))
                    .ok_or(TransportError::NotFound { id: req.id })?;
                tracing::debug!(variant = %req.variant, id = req.id, "Deleted item");
                Ok(MutationResponse::with_id(req.id))
            }
        }
    }
}
