//! # Tally Engine
//!
//! Draft collection logic for editing a project's milestones or rewards.
//!
//! A project owner edits an ordered list of items in a transient session and
//! commits it to a remote store as discrete create/update/delete requests.
//! This crate holds everything about that flow that does not need a network:
//! the working copy, validation, unit conversion, request planning and
//! folding request outcomes back into the final collection.
//!
//! ## Design Principles
//!
//! - **No IO**: Engine has no knowledge of transports or runtimes
//! - **Deterministic**: Same inputs always produce same outputs
//! - **Testable**: Pure logic, no mocks needed
//! - **Portable**: Runs anywhere Rust runs (native, WASM, embedded)
//!
//! ## Core Concepts
//!
//! ### Items
//!
//! An [`Item`] is a milestone or a reward. Items without an id exist only in
//! the draft; items with an id exist on the server. Amounts are integers in
//! the canonical unit (satoshis or USD cents).
//!
//! ### Draft Collection
//!
//! [`DraftCollection`] is the session's working copy. Edits never touch the
//! network; removing a persisted item is planned first and applied only
//! after the remote delete succeeded.
//!
//! ### Validation
//!
//! [`Validator`] turns the item list into a [`ValidationErrorSet`] keyed by
//! position. Milestone amounts must not decrease along the list.
//!
//! ### Commit
//!
//! [`CommitPlan`] maps each submittable item to a [`MutationRequest`].
//! After execution, [`Reconciler`] attaches server identities to created
//! items or reports a [`CommitError`]. Partial failures are not rolled back.
//!
//! ## Quick Start
//!
//! ```rust
//! use tally_engine::{
//!     DraftCollection, Item, ItemPatch, MutationResponse, Reconciler, RequestOutcome,
//!     UpdatePolicy, Variant,
//! };
//!
//! // 1. Seed a draft from the project's milestones
//! let mut draft = DraftCollection::seed(
//!     Variant::Milestone,
//!     42,
//!     vec![Item::persisted(7, 42, "Prototype", 1_000)],
//! )
//! .unwrap();
//!
//! // 2. Edit
//! let index = draft.add();
//! draft.edit(index, ItemPatch::name("Launch")).unwrap();
//! draft.edit(index, ItemPatch::amount(5_000)).unwrap();
//! assert!(draft.validate().is_valid);
//!
//! // 3. Plan the requests and reconcile their outcomes
//! let plan = draft.plan_commit(UpdatePolicy::Always);
//! assert_eq!(plan.request_count(), 2);
//!
//! let outcomes: Vec<(usize, RequestOutcome)> = vec![
//!     (0, Ok(MutationResponse::empty())),
//!     (1, Ok(MutationResponse::with_id(8))),
//! ];
//! let items = Reconciler::new(plan).reconcile(outcomes).unwrap();
//! assert_eq!(items[1].id, Some(8));
//! ```
//!
//! ## FFI
//!
//! The [`ffi`] module provides C-compatible functions for use from other
//! languages. All data is exchanged as JSON strings.

pub mod convert;
pub mod draft;
pub mod error;
pub mod ffi;
pub mod item;
pub mod mutation;
pub mod reconcile;
pub mod validate;

// Re-export main types at crate root
pub use convert::{ExchangeRate, UnitConverter, UnitMode};
pub use draft::{ChangeListener, DraftCollection, Removal};
pub use error::Error;
pub use item::{Item, ItemPatch, Variant};
pub use mutation::{
    CommitPlan, CostCurrency, CreateRequest, DeleteRequest, ItemFields, MutationRequest,
    MutationResponse, PlannedItem, TransportError, UpdatePolicy, UpdateRequest,
};
pub use reconcile::{
    CommitError, CreatedItem, FailedItem, ItemFailure, Reconciler, RequestOutcome,
};
pub use validate::{
    Field, FieldError, FieldErrorKind, FieldErrors, Limits, ValidationErrorSet, ValidationReport,
    Validator,
};

/// Type aliases for clarity
pub type ItemId = u64;
pub type ParentId = u64;
/// Amount in the canonical unit (satoshis or USD cents)
pub type Amount = u64;
