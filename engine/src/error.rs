//! Error types for the Tally engine.

use crate::ItemId;
use thiserror::Error;

/// All possible errors from the Tally engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    // Draft errors
    #[error("index {index} out of bounds for collection of {len} items")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("duplicate item id in collection: {0}")]
    DuplicateId(ItemId),

    #[error("item at index {index} no longer carries id {id}")]
    StaleRemoval { index: usize, id: ItemId },

    // Conversion errors
    #[error("invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("invalid exchange rate: {0}")]
    InvalidRate(f64),

    // Boundary errors
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
