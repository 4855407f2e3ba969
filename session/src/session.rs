//! Editing sessions.
//!
//! An [`EditSession`] wraps one [`DraftCollection`] for the lifetime of an
//! editor: it is opened from the parent's persisted items, receives edits,
//! and ends either by cancelling (no network) or by confirming (validate,
//! then commit through the [`SyncCoordinator`]).
//!
//! ```text
//! open ──► Open ──confirm──► Committing ──ok──► Closed
//!           ▲                    │
//!           └───────failed───────┘
//!          Open ──cancel──► Closed
//! ```
//!
//! Network calls take `&mut self`, so nothing can edit the draft while a
//! delete or commit is in flight.

use serde::{Deserialize, Serialize};
use tally_engine::{
    DraftCollection, Item, ItemPatch, Limits, MutationRequest, ParentId, Removal,
    UnitConverter, UnitMode, UpdatePolicy, ValidationErrorSet, ValidationReport, Validator,
    Variant,
};
use uuid::Uuid;

use crate::coordinator::SyncCoordinator;
use crate::error::{Result, SessionError};
use crate::executor::MutationExecutor;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Open,
    /// A commit is in flight
    Committing,
    Closed,
}

/// Per-session settings.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub update_policy: UpdatePolicy,
    pub converter: UnitConverter,
    /// Cap on concurrent commit requests, unbounded if `None`
    pub max_in_flight: Option<usize>,
    /// Overrides the variant's default limits
    pub limits: Option<Limits>,
}

/// The persisted collection a session is opened on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentResource {
    pub variant: Variant,
    pub parent_id: ParentId,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl ParentResource {
    pub fn new(variant: Variant, parent_id: ParentId, items: Vec<Item>) -> Self {
        Self {
            variant,
            parent_id,
            items,
        }
    }
}

/// A local edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum EditOp {
    /// Append a blank item
    Add,
    /// Merge a patch into one item
    Edit { index: usize, patch: ItemPatch },
    /// Set an amount given in the current display unit
    SetDisplayAmount { index: usize, value: f64 },
    SetUnitMode { mode: UnitMode },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A dismissible message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            description: description.into(),
        }
    }
}

/// One editor session over a milestone or reward collection.
#[derive(Debug)]
pub struct EditSession<E> {
    id: Uuid,
    state: SessionState,
    draft: DraftCollection,
    /// Items exactly as passed to `open`
    original: Vec<Item>,
    coordinator: SyncCoordinator<E>,
    converter: UnitConverter,
    update_policy: UpdatePolicy,
    notices: Vec<Notice>,
    busy: bool,
}

impl<E: MutationExecutor> EditSession<E> {
    /// Open a session on `parent`.
    pub fn open(parent: ParentResource, executor: E, options: SessionOptions) -> Result<Self> {
        let validator = match options.limits {
            Some(limits) => Validator::with_limits(parent.variant, limits),
            None => Validator::new(parent.variant),
        };
        let draft = DraftCollection::seed(parent.variant, parent.parent_id, parent.items.clone())?
            .with_validator(validator);

        let session = Self {
            id: Uuid::new_v4(),
            state: SessionState::Open,
            draft,
            original: parent.items,
            coordinator: SyncCoordinator::new(executor).with_max_in_flight(options.max_in_flight),
            converter: options.converter,
            update_policy: options.update_policy,
            notices: Vec::new(),
            busy: false,
        };

        tracing::info!(
            session = %session.id,
            variant = %parent.variant,
            parent_id = parent.parent_id,
            items = session.draft.len(),
            "Opened session"
        );
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn variant(&self) -> Variant {
        self.draft.variant()
    }

    pub fn parent_id(&self) -> ParentId {
        self.draft.parent_id()
    }

    /// Current working copy.
    pub fn items(&self) -> &[Item] {
        self.draft.snapshot()
    }

    /// Errors currently shown against the working copy.
    pub fn errors(&self) -> &ValidationErrorSet {
        self.draft.errors()
    }

    pub fn version(&self) -> u64 {
        self.draft.version()
    }

    pub fn converter(&self) -> UnitConverter {
        self.converter
    }

    /// Whether a remote call is outstanding.
    ///
    /// Stays true if a delete or commit future was dropped before it
    /// finished; the session then refuses further operations.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Call `listener` with the new version after every change.
    pub fn on_change(&mut self, listener: impl FnMut(u64) + Send + 'static) {
        self.draft.set_listener(Box::new(listener));
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn dismiss_notice(&mut self, index: usize) -> Option<Notice> {
        (index < self.notices.len()).then(|| self.notices.remove(index))
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Append a blank item and return its index.
    pub fn add(&mut self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.draft.add())
    }

    /// Apply one local edit.
    pub fn edit(&mut self, op: EditOp) -> Result<()> {
        self.ensure_open()?;
        match op {
            EditOp::Add => {
                self.draft.add();
            }
            EditOp::Edit { index, patch } => self.draft.edit(index, patch)?,
            EditOp::SetDisplayAmount { index, value } => self.set_display_amount(index, value)?,
            EditOp::SetUnitMode { mode } => self.set_unit_mode(mode),
        }
        Ok(())
    }

    /// Amount of the item at `index` in the current display unit.
    pub fn display_amount(&self, index: usize) -> Option<f64> {
        self.draft
            .get(index)
            .map(|item| self.converter.to_display(item.amount))
    }

    /// Set the amount of the item at `index` from a display value.
    pub fn set_display_amount(&mut self, index: usize, value: f64) -> Result<()> {
        self.ensure_open()?;
        let amount = self.converter.to_canonical(value)?;
        self.draft.edit(index, ItemPatch::amount(amount))?;
        Ok(())
    }

    /// Switch the unit amounts are shown in. Stored amounts are unchanged.
    pub fn set_unit_mode(&mut self, mode: UnitMode) {
        self.converter = self.converter.with_mode(mode);
    }

    /// Run validation now and show its result.
    pub fn validate(&mut self) -> Result<ValidationReport> {
        self.ensure_open()?;
        Ok(self.draft.validate())
    }

    /// Remove the item at `index`.
    ///
    /// A persisted item is deleted remotely first. If the delete fails the
    /// item stays where it was, an error notice is queued and the transport
    /// error is returned; retrying is safe.
    #[tracing::instrument(skip(self), fields(session = %self.id))]
    pub async fn remove(&mut self, index: usize) -> Result<()> {
        self.ensure_open()?;
        let removal = self.draft.plan_removal(index)?;
        let id = match &removal {
            Removal::Remote { id, .. } => *id,
            Removal::Local { .. } => {
                tracing::debug!("Removed unsaved item");
                return Ok(());
            }
        };

        self.busy = true;
        let deleted = self.coordinator.delete(self.draft.variant(), id).await;
        self.busy = false;

        match deleted {
            Ok(()) => {
                self.draft.apply_remote_removal(&removal)?;
                tracing::info!(id, "Removed persisted item");
                Ok(())
            }
            Err(error) => {
                tracing::warn!(id, %error, "Delete failed");
                self.notices
                    .push(Notice::error("Something went wrong", error.to_string()));
                Err(SessionError::Delete(error))
            }
        }
    }

    /// Close without committing.
    ///
    /// Returns the input unchanged if nothing was edited. Otherwise the
    /// draft is validated once: an invalid draft is returned as is, a valid
    /// one without its abandoned rows.
    pub fn cancel(&mut self) -> Result<Vec<Item>> {
        self.ensure_open()?;

        let items = if self.draft.version() == 0 {
            self.original.clone()
        } else if self.draft.validate().is_valid {
            self.draft.submittable()
        } else {
            self.draft.snapshot().to_vec()
        };

        self.state = SessionState::Closed;
        tracing::info!(session = %self.id, items = items.len(), "Cancelled session");
        Ok(items)
    }

    /// Validate and commit the draft.
    ///
    /// On success the session closes and the committed collection is
    /// returned. Validation failures keep the session open without sending
    /// anything. A failed commit reopens the session with the same working
    /// copy; creates that went through are listed in the error.
    #[tracing::instrument(skip(self), fields(session = %self.id))]
    pub async fn confirm(&mut self) -> Result<Vec<Item>> {
        self.ensure_open()?;

        let report = self.draft.validate();
        if !report.is_valid {
            tracing::debug!(invalid = report.errors.len(), "Commit blocked by validation");
            return Err(SessionError::Invalid(report.errors));
        }

        let plan = self.draft.plan_commit(self.update_policy);
        let updated: Vec<String> = plan
            .requests()
            .filter(|(_, request)| matches!(request, MutationRequest::Update(_)))
            .map(|(position, _)| plan.items[position].item.name.clone())
            .collect();

        self.state = SessionState::Committing;
        self.busy = true;
        let result = self.coordinator.commit(plan).await;
        self.busy = false;

        match result {
            Ok(items) => {
                self.state = SessionState::Closed;
                if self.draft.variant() == Variant::Reward {
                    for name in updated {
                        self.notices.push(Notice::success(
                            "Successfully updated!",
                            format!("Reward {} was successfully updated", name),
                        ));
                    }
                }
                Ok(items)
            }
            Err(err) => {
                self.state = SessionState::Open;
                self.notices
                    .push(Notice::error("Something went wrong", "Please try again."));
                Err(SessionError::Commit(err))
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.busy {
            return Err(SessionError::Busy);
        }
        match self.state {
            SessionState::Open => Ok(()),
            SessionState::Committing => Err(SessionError::Busy),
            SessionState::Closed => Err(SessionError::Closed),
        }
    }
}
