//! Draft collection - the working copy edited during a session.
//!
//! The draft owns an ordered list of items seeded from the caller's persisted
//! collection. Edits are applied in the order they are issued and never touch
//! the network. Removing a persisted item is the one exception: it is split
//! into [`DraftCollection::plan_removal`], which leaves the list untouched,
//! and [`DraftCollection::apply_remote_removal`], which the caller invokes
//! only after the remote delete succeeded.

use crate::{
    error::Result, CommitPlan, Error, Item, ItemId, ItemPatch, ParentId, UpdatePolicy,
    ValidationErrorSet, ValidationReport, Validator, Variant,
};
use std::collections::HashMap;

/// Callback invoked with the new version after every change.
pub type ChangeListener = Box<dyn FnMut(u64) + Send>;

/// How a removal has to be carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// The item had no server identity and is already gone
    Local { index: usize, item: Item },
    /// The item exists remotely; delete `id` first, then apply
    Remote { index: usize, id: ItemId },
}

impl Removal {
    pub fn index(&self) -> usize {
        match self {
            Removal::Local { index, .. } | Removal::Remote { index, .. } => *index,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Removal::Remote { .. })
    }
}

/// The session's working copy of a milestone or reward collection.
pub struct DraftCollection {
    variant: Variant,
    parent_id: ParentId,
    items: Vec<Item>,
    /// Persisted items as they were when the draft was seeded
    baseline: HashMap<ItemId, Item>,
    validator: Validator,
    errors: ValidationErrorSet,
    version: u64,
    listener: Option<ChangeListener>,
}

impl std::fmt::Debug for DraftCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftCollection")
            .field("variant", &self.variant)
            .field("parent_id", &self.parent_id)
            .field("items", &self.items)
            .field("errors", &self.errors)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl DraftCollection {
    /// Seed a draft from the caller's collection.
    ///
    /// An empty collection is replaced by a single blank item so there is
    /// always a row to edit. Zero ids are treated as "not persisted".
    pub fn seed(variant: Variant, parent_id: ParentId, items: Vec<Item>) -> Result<Self> {
        let items: Vec<Item> = items.into_iter().map(Item::normalized).collect();

        let mut baseline = HashMap::new();
        for item in &items {
            if let Some(id) = item.id {
                if baseline.insert(id, item.clone()).is_some() {
                    return Err(Error::DuplicateId(id));
                }
            }
        }

        let items = if items.is_empty() {
            vec![Item::blank(parent_id)]
        } else {
            items
        };

        Ok(Self {
            variant,
            parent_id,
            items,
            baseline,
            validator: Validator::new(variant),
            errors: ValidationErrorSet::new(),
            version: 0,
            listener: None,
        })
    }

    /// Builder: validate with a custom validator.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    /// Register a change listener, replacing any previous one.
    pub fn set_listener(&mut self, listener: ChangeListener) {
        self.listener = Some(listener);
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn parent_id(&self) -> ParentId {
        self.parent_id
    }

    /// Incremented on every change to items or errors.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    /// Current ordered items, read-only.
    pub fn snapshot(&self) -> &[Item] {
        &self.items
    }

    /// Errors from the latest validation pass, minus cleared positions.
    pub fn errors(&self) -> &ValidationErrorSet {
        &self.errors
    }

    /// Seeded state of a persisted item.
    pub fn baseline(&self, id: ItemId) -> Option<&Item> {
        self.baseline.get(&id)
    }

    /// Items that pass the pre-commit filter, in order.
    pub fn submittable(&self) -> Vec<Item> {
        self.items
            .iter()
            .filter(|item| item.is_submittable())
            .cloned()
            .collect()
    }

    /// Append a blank item and return its index.
    pub fn add(&mut self) -> usize {
        self.items.push(Item::blank(self.parent_id));
        self.touch();
        self.items.len() - 1
    }

    /// Shallow-merge `patch` into the item at `index`.
    pub fn edit(&mut self, index: usize, patch: ItemPatch) -> Result<()> {
        let len = self.items.len();
        let item = self
            .items
            .get_mut(index)
            .ok_or(Error::IndexOutOfBounds { index, len })?;
        item.apply(patch);
        self.errors.clear_index(index);
        self.touch();
        Ok(())
    }

    /// Run the validator and replace the error set with its result.
    pub fn validate(&mut self) -> ValidationReport {
        let report = self.validator.validate(&self.items);
        if report.errors != self.errors {
            self.errors = report.errors.clone();
            self.touch();
        }
        report
    }

    /// Decide how to remove the item at `index`.
    ///
    /// Unpersisted items are removed immediately. Persisted items are left
    /// in place and a [`Removal::Remote`] is returned.
    pub fn plan_removal(&mut self, index: usize) -> Result<Removal> {
        let len = self.items.len();
        let item = self
            .items
            .get(index)
            .ok_or(Error::IndexOutOfBounds { index, len })?;

        match item.persisted_id() {
            Some(id) => Ok(Removal::Remote { index, id }),
            None => {
                let item = self.items.remove(index);
                self.after_removal();
                Ok(Removal::Local { index, item })
            }
        }
    }

    /// Remove a persisted item after its remote delete succeeded.
    ///
    /// A [`Removal::Local`] has already been applied and is a no-op.
    pub fn apply_remote_removal(&mut self, removal: &Removal) -> Result<Option<Item>> {
        let (index, id) = match removal {
            Removal::Local { .. } => return Ok(None),
            Removal::Remote { index, id } => (*index, *id),
        };

        match self.items.get(index) {
            Some(item) if item.persisted_id() == Some(id) => {}
            _ => return Err(Error::StaleRemoval { index, id }),
        }

        let item = self.items.remove(index);
        self.baseline.remove(&id);
        self.after_removal();
        Ok(Some(item))
    }

    /// Plan the requests that commit the current items.
    pub fn plan_commit(&self, policy: UpdatePolicy) -> CommitPlan {
        CommitPlan::build(
            self.variant,
            self.parent_id,
            &self.items,
            policy,
            |id| self.baseline.get(&id),
        )
    }

    /// Consume the draft, returning its items.
    pub fn into_items(self) -> Vec<Item> {
        self.items
    }

    fn after_removal(&mut self) {
        // Positions shifted; recompute so no error points at the wrong row.
        if !self.errors.is_empty() {
            self.errors = self.validator.validate(&self.items).errors;
        }
        self.touch();
    }

    fn touch(&mut self) {
        self.version += 1;
        if let Some(listener) = self.listener.as_mut() {
            listener(self.version);
        }
    }
}
