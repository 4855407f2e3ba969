//! Field-level validation of draft collections.
//!
//! Validation is a pure function of the ordered item list. Every pass
//! produces a complete [`ValidationErrorSet`] that replaces the previous one,
//! so errors never linger at a position after items move or disappear.

use crate::{Amount, Item, Variant};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Editable fields that can carry an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Amount,
    Description,
}

/// What went wrong with a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldErrorKind {
    /// Required field is empty
    MissingField,
    /// Text exceeds its maximum length in characters
    TooLong { max: usize },
    /// Amount is below one canonical unit
    BelowMinimum,
    /// Amount exceeds the variant's cap
    AboveMaximum { max: Amount },
    /// Amount is lower than the previous item's
    OutOfOrder,
}

/// A single field error with its user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    #[serde(flatten)]
    pub kind: FieldErrorKind,
    pub message: String,
}

impl FieldError {
    fn new(kind: FieldErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Errors for one position, at most one per field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldErrors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<FieldError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<FieldError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<FieldError>,
}

impl FieldErrors {
    pub fn get(&self, field: Field) -> Option<&FieldError> {
        match field {
            Field::Name => self.name.as_ref(),
            Field::Amount => self.amount.as_ref(),
            Field::Description => self.description.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.amount.is_none() && self.description.is_none()
    }
}

/// Errors keyed by ordinal position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorSet(BTreeMap<usize, FieldErrors>);

impl ValidationErrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors at `index`, if any.
    pub fn at(&self, index: usize) -> Option<&FieldErrors> {
        self.0.get(&index)
    }

    /// Error for one field at `index`, if any.
    pub fn field(&self, index: usize, field: Field) -> Option<&FieldError> {
        self.at(index).and_then(|errors| errors.get(field))
    }

    /// Drop the errors recorded for `index`.
    pub fn clear_index(&mut self, index: usize) {
        self.0.remove(&index);
    }

    /// Positions that carry at least one error, ascending.
    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &FieldErrors)> {
        self.0.iter().map(|(index, errors)| (*index, errors))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outcome of one validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: ValidationErrorSet,
}

/// Length and amount bounds for a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    pub name_max: usize,
    pub description_max: usize,
    /// Upper bound on the canonical amount, if the variant has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_max: Option<Amount>,
}

impl Limits {
    pub const MILESTONE: Limits = Limits {
        name_max: 50,
        description_max: 280,
        amount_max: None,
    };

    pub const REWARD: Limits = Limits {
        name_max: 50,
        description_max: 280,
        // $50,000 in cents
        amount_max: Some(5_000_000),
    };

    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::Milestone => Self::MILESTONE,
            Variant::Reward => Self::REWARD,
        }
    }
}

/// Validates an ordered list of items for one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validator {
    variant: Variant,
    limits: Limits,
}

impl Validator {
    /// Validator with the variant's default limits.
    pub fn new(variant: Variant) -> Self {
        Self::with_limits(variant, Limits::for_variant(variant))
    }

    pub fn with_limits(variant: Variant, limits: Limits) -> Self {
        Self { variant, limits }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Validate every item and collect all violations.
    ///
    /// Blank rows are skipped. Ordering compares each item with the nearest
    /// non-blank item before it.
    pub fn validate(&self, items: &[Item]) -> ValidationReport {
        let mut errors = BTreeMap::new();
        let mut previous = None;

        for (index, item) in items.iter().enumerate() {
            if item.is_blank() {
                continue;
            }
            let item_errors = self.validate_item(item, previous);
            if !item_errors.is_empty() {
                errors.insert(index, item_errors);
            }
            previous = Some(item);
        }

        ValidationReport {
            is_valid: errors.is_empty(),
            errors: ValidationErrorSet(errors),
        }
    }

    fn validate_item(&self, item: &Item, previous: Option<&Item>) -> FieldErrors {
        let mut errors = FieldErrors::default();
        let limits = &self.limits;

        if item.name.is_empty() {
            errors.name = Some(FieldError::new(
                FieldErrorKind::MissingField,
                "Name is a required field.",
            ));
        } else if item.name.chars().count() > limits.name_max {
            errors.name = Some(FieldError::new(
                FieldErrorKind::TooLong {
                    max: limits.name_max,
                },
                match self.variant {
                    Variant::Milestone => format!(
                        "Name cannot be longer than {} characters.",
                        limits.name_max
                    ),
                    Variant::Reward => {
                        format!("Name should be less than {} characters", limits.name_max)
                    }
                },
            ));
        }

        if item.amount < 1 {
            errors.amount = Some(FieldError::new(
                FieldErrorKind::BelowMinimum,
                match self.variant {
                    Variant::Milestone => "Amount needs to be at least 1 satoshi.",
                    Variant::Reward => "Cost must be greater than 0.",
                },
            ));
        }

        if let Some(max) = limits.amount_max {
            if item.amount > max {
                errors.amount = Some(FieldError::new(
                    FieldErrorKind::AboveMaximum { max },
                    format!("Cost must be less than ${}.", comma_formatted(max / 100)),
                ));
            }
        }

        // The ordering check runs last so it takes precedence on the field.
        if self.variant.enforces_ordering() {
            if let Some(previous) = previous {
                if item.amount < previous.amount {
                    errors.amount = Some(FieldError::new(
                        FieldErrorKind::OutOfOrder,
                        "Amount must be greater than the previous milestone.",
                    ));
                }
            }
        }

        if let Some(description) = &item.description {
            if description.chars().count() > limits.description_max {
                errors.description = Some(FieldError::new(
                    FieldErrorKind::TooLong {
                        max: limits.description_max,
                    },
                    match self.variant {
                        Variant::Milestone => format!(
                            "Description cannot be longer than {} characters.",
                            limits.description_max
                        ),
                        Variant::Reward => format!(
                            "Description should be less than {} characters",
                            limits.description_max
                        ),
                    },
                ));
            }
        }

        errors
    }
}

/// `1234567` -> `"1,234,567"`
fn comma_formatted(value: Amount) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
