//! Item types for milestones and rewards.

use crate::{Amount, ItemId, ParentId};
use serde::{Deserialize, Serialize};

/// Which kind of sub-resource a collection holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Funding milestones, amounts in satoshis, ordered by amount
    Milestone,
    /// Purchasable rewards, costs in USD cents
    Reward,
}

impl Variant {
    /// Resource name used in mutation descriptors.
    pub fn resource(&self) -> &'static str {
        match self {
            Variant::Milestone => "projectMilestone",
            Variant::Reward => "projectReward",
        }
    }

    /// Whether amounts must be non-decreasing along the collection.
    pub fn enforces_ordering(&self) -> bool {
        matches!(self, Variant::Milestone)
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Milestone => write!(f, "milestone"),
            Variant::Reward => write!(f, "reward"),
        }
    }
}

/// A single milestone or reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Server identity; `None` until the item has been created remotely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
    /// Owning project
    #[serde(default)]
    pub parent_id: ParentId,
    /// Short label
    #[serde(default)]
    pub name: String,
    /// Optional longer text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Amount in the canonical unit
    #[serde(default)]
    pub amount: Amount,
    /// Reward image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Reward stock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
}

impl Item {
    /// Create an unsaved item.
    pub fn new(parent_id: ParentId, name: impl Into<String>, amount: Amount) -> Self {
        Self {
            id: None,
            parent_id,
            name: name.into(),
            description: None,
            amount,
            image: None,
            stock: None,
        }
    }

    /// Create an item that already exists on the server.
    pub fn persisted(
        id: ItemId,
        parent_id: ParentId,
        name: impl Into<String>,
        amount: Amount,
    ) -> Self {
        Self {
            id: Some(id),
            ..Self::new(parent_id, name, amount)
        }
    }

    /// An empty row, as appended by "add".
    pub fn blank(parent_id: ParentId) -> Self {
        Self::new(parent_id, "", 0)
    }

    /// Builder: set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder: set the image URL.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Builder: set the stock.
    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = Some(stock);
        self
    }

    /// The server identity, treating a zero id as absent.
    pub fn persisted_id(&self) -> Option<ItemId> {
        self.id.filter(|id| *id != 0)
    }

    /// Whether the item exists on the server.
    pub fn is_persisted(&self) -> bool {
        self.persisted_id().is_some()
    }

    /// Whether the item survives the pre-commit filter.
    ///
    /// Rows without a name or without an amount are abandoned drafts and are
    /// dropped from a commit without an error.
    pub fn is_submittable(&self) -> bool {
        !self.name.is_empty() && self.amount > 0
    }

    /// Whether nothing has been entered into this item.
    ///
    /// Blank rows are left out of validation; they are abandoned drafts.
    pub fn is_blank(&self) -> bool {
        self.name.is_empty()
            && self.amount == 0
            && self.description.as_deref().unwrap_or_default().is_empty()
            && self.image.as_deref().unwrap_or_default().is_empty()
            && self.stock.is_none()
    }

    /// Whether the user-editable fields match `other`, ignoring identity.
    pub fn same_content(&self, other: &Item) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.amount == other.amount
            && self.image == other.image
            && self.stock == other.stock
    }

    /// Copy of this item with a zero id folded into `None`.
    pub(crate) fn normalized(mut self) -> Self {
        self.id = self.persisted_id();
        self
    }

    /// Apply a shallow patch in place.
    pub fn apply(&mut self, patch: ItemPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(image) = patch.image {
            self.image = image;
        }
        if let Some(stock) = patch.stock {
            self.stock = stock;
        }
    }
}

/// A shallow, field-level edit of an [`Item`].
///
/// `None` leaves a field untouched. For optional fields the inner `None`
/// clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<Option<u32>>,
}

impl ItemPatch {
    /// Patch that only sets the name.
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Patch that only sets the amount.
    pub fn amount(amount: Amount) -> Self {
        Self {
            amount: Some(amount),
            ..Self::default()
        }
    }

    /// Patch that only sets the description; an empty string clears it.
    pub fn description(description: impl Into<String>) -> Self {
        let description = description.into();
        Self {
            description: Some((!description.is_empty()).then_some(description)),
            ..Self::default()
        }
    }

    /// Patch that only sets the image URL.
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            image: Some(Some(url.into())),
            ..Self::default()
        }
    }

    /// Patch that only sets the stock.
    pub fn stock(stock: Option<u32>) -> Self {
        Self {
            stock: Some(stock),
            ..Self::default()
        }
    }

    /// Whether applying this patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
