//! # Tally Session
//!
//! Async editing sessions over a project's milestones or rewards.
//!
//! A session is opened on a parent's persisted items, takes local edits and
//! commits the result to a remote store through a [`MutationExecutor`].
//! All draft logic lives in `tally-engine`; this crate adds the remote
//! calls, the session lifecycle, configuration and an in-memory store.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod memory;
pub mod rate;
pub mod session;

pub use config::{Config, ConfigError};
pub use coordinator::SyncCoordinator;
pub use error::{Result, SessionError};
pub use executor::MutationExecutor;
pub use memory::InMemoryStore;
pub use rate::{ExchangeRateProvider, FixedRate, RateQuote};
pub use session::{
    EditOp, EditSession, Notice, NoticeLevel, ParentResource, SessionOptions, SessionState,
};
