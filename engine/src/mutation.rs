//! Mutation descriptors and commit planning.
//!
//! A commit is expressed as a list of discrete requests, one per item:
//! items without a server identity become a [`CreateRequest`], persisted
//! items become an [`UpdateRequest`] addressed by their id. Deletes are
//! issued one at a time when a persisted item is removed from the draft.
//! Executing the requests is left to the caller.

use crate::{Amount, Item, ItemId, ParentId, Variant};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Currency of a reward's cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostCurrency {
    UsdCent,
}

/// Editable fields sent with a create or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFields {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
    /// Present for rewards only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_currency: Option<CostCurrency>,
}

impl ItemFields {
    pub fn from_item(variant: Variant, item: &Item) -> Self {
        Self {
            name: item.name.clone(),
            description: item.description.clone(),
            amount: item.amount,
            // Empty image and zero stock mean "not set" on the wire.
            image: item.image.clone().filter(|url| !url.is_empty()),
            stock: item.stock.filter(|stock| *stock > 0),
            cost_currency: matches!(variant, Variant::Reward).then_some(CostCurrency::UsdCent),
        }
    }
}

/// Create a new item under a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub variant: Variant,
    pub parent_id: ParentId,
    #[serde(flatten)]
    pub fields: ItemFields,
}

/// Overwrite an existing item's fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub variant: Variant,
    pub id: ItemId,
    #[serde(flatten)]
    pub fields: ItemFields,
}

/// Delete an existing item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub variant: Variant,
    pub id: ItemId,
}

/// A request for the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MutationRequest {
    Create(CreateRequest),
    Update(UpdateRequest),
    Delete(DeleteRequest),
}

impl MutationRequest {
    /// Build a create request for an unsaved item.
    ///
    /// Any client-side id on the item is not sent.
    pub fn create(variant: Variant, parent_id: ParentId, item: &Item) -> Self {
        MutationRequest::Create(CreateRequest {
            variant,
            parent_id,
            fields: ItemFields::from_item(variant, item),
        })
    }

    /// Build an update request addressed by `id`.
    pub fn update(variant: Variant, id: ItemId, item: &Item) -> Self {
        MutationRequest::Update(UpdateRequest {
            variant,
            id,
            fields: ItemFields::from_item(variant, item),
        })
    }

    pub fn delete(variant: Variant, id: ItemId) -> Self {
        MutationRequest::Delete(DeleteRequest { variant, id })
    }

    pub fn variant(&self) -> Variant {
        match self {
            MutationRequest::Create(req) => req.variant,
            MutationRequest::Update(req) => req.variant,
            MutationRequest::Delete(req) => req.variant,
        }
    }

    /// Remote operation name, e.g. `createProjectMilestone`.
    pub fn operation_name(&self) -> String {
        let resource = self.variant().resource();
        let (head, tail) = resource.split_at(1);
        let verb = match self {
            MutationRequest::Create(_) => "create",
            MutationRequest::Update(_) => "update",
            MutationRequest::Delete(_) => "delete",
        };
        format!("{}{}{}", verb, head.to_uppercase(), tail)
    }

    /// The addressed item, `None` for creates.
    pub fn target_id(&self) -> Option<ItemId> {
        match self {
            MutationRequest::Create(_) => None,
            MutationRequest::Update(req) => Some(req.id),
            MutationRequest::Delete(req) => Some(req.id),
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self, MutationRequest::Create(_))
    }
}

/// Payload returned by the remote store for a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResponse {
    /// Identity of the affected item; required for creates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
}

impl MutationResponse {
    pub fn with_id(id: ItemId) -> Self {
        Self { id: Some(id) }
    }

    pub fn empty() -> Self {
        Self { id: None }
    }

    /// The returned id, treating zero as absent.
    pub fn usable_id(&self) -> Option<ItemId> {
        self.id.filter(|id| *id != 0)
    }
}

/// Failure of a single request between the executor and the remote store.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TransportError {
    #[error("remote store unavailable: {message}")]
    Unavailable { message: String },

    #[error("request rejected: {message}")]
    Rejected { message: String },

    #[error("item not found: {id}")]
    NotFound { id: ItemId },
}

/// Whether persisted items are updated unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdatePolicy {
    /// Update every persisted item, changed or not (default)
    #[default]
    Always,
    /// Skip persisted items whose fields match the seeded baseline
    ChangedOnly,
}

/// One submittable item and what to send for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedItem {
    pub item: Item,
    /// `None` when the update policy skipped an unchanged item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<MutationRequest>,
}

/// Requests for one commit, in collection order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitPlan {
    pub items: Vec<PlannedItem>,
}

impl CommitPlan {
    /// Plan a commit of `items`.
    ///
    /// Items failing the submission filter are dropped silently. `baseline`
    /// returns the seeded version of a persisted item and is only consulted
    /// under [`UpdatePolicy::ChangedOnly`].
    pub fn build<'a>(
        variant: Variant,
        parent_id: ParentId,
        items: &[Item],
        policy: UpdatePolicy,
        baseline: impl Fn(ItemId) -> Option<&'a Item>,
    ) -> Self {
        let items = items
            .iter()
            .filter(|item| item.is_submittable())
            .map(|item| {
                let request = match item.persisted_id() {
                    None => Some(MutationRequest::create(variant, parent_id, item)),
                    Some(id) => {
                        let unchanged = policy == UpdatePolicy::ChangedOnly
                            && baseline(id).is_some_and(|seeded| seeded.same_content(item));
                        (!unchanged).then(|| MutationRequest::update(variant, id, item))
                    }
                };
                PlannedItem {
                    item: item.clone(),
                    request,
                }
            })
            .collect();

        Self { items }
    }

    /// Requests to dispatch, with their position in the plan.
    pub fn requests(&self) -> impl Iterator<Item = (usize, &MutationRequest)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(position, planned)| planned.request.as_ref().map(|req| (position, req)))
    }

    pub fn request_count(&self) -> usize {
        self.requests().count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
