//! Folding request outcomes back into the collection.
//!
//! After a commit plan has been executed, each planned item is paired with
//! the outcome of its request. Created items take the identity returned by
//! the remote store; updated and skipped items are returned as they were.
//!
//! # Partial failure
//!
//! A batch is not atomic. If any request failed, or a create came back
//! without a usable identity, the whole commit is reported as failed, but
//! requests that succeeded are not undone. [`CommitError`] lists both the
//! failures and the items that were created anyway so callers can see what
//! the remote store now holds.

use crate::{CommitPlan, Item, ItemId, MutationResponse, TransportError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of executing one request.
pub type RequestOutcome = std::result::Result<MutationResponse, TransportError>;

/// Why a single item could not be committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ItemFailure {
    /// The request failed in transit or was rejected by the store
    Transport { error: TransportError },
    /// A create succeeded but returned no usable identity
    MissingServerIdentity,
    /// The request was planned but no outcome was reported for it
    NotExecuted,
}

impl std::fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemFailure::Transport { error } => write!(f, "{}", error),
            ItemFailure::MissingServerIdentity => {
                write!(f, "created item is missing its server identity")
            }
            ItemFailure::NotExecuted => write!(f, "request was not executed"),
        }
    }
}

/// A failed item, by position in the commit plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedItem {
    pub position: usize,
    pub name: String,
    pub failure: ItemFailure,
}

/// An item that was created remotely during a failed commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedItem {
    pub position: usize,
    pub id: ItemId,
}

/// Aggregate failure of a commit batch.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("commit failed: {} of {attempted} requests did not succeed", .failures.len())]
#[serde(rename_all = "camelCase")]
pub struct CommitError {
    /// Number of requests in the batch
    pub attempted: usize,
    pub failures: Vec<FailedItem>,
    /// Creates that went through despite the failure
    pub created: Vec<CreatedItem>,
}

impl CommitError {
    /// Whether any create succeeded without returning an identity.
    pub fn has_missing_identity(&self) -> bool {
        self.failures
            .iter()
            .any(|failed| failed.failure == ItemFailure::MissingServerIdentity)
    }
}

/// Merges request outcomes into the final collection.
#[derive(Debug, Clone)]
pub struct Reconciler {
    plan: CommitPlan,
}

impl Reconciler {
    pub fn new(plan: CommitPlan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &CommitPlan {
        &self.plan
    }

    /// Pair each planned request with its outcome.
    ///
    /// `outcomes` yields `(position, outcome)` for positions from
    /// [`CommitPlan::requests`], in any order. Returns the final items in
    /// plan order, or the aggregate failure.
    pub fn reconcile(
        self,
        outcomes: impl IntoIterator<Item = (usize, RequestOutcome)>,
    ) -> std::result::Result<Vec<Item>, CommitError> {
        let mut slots: Vec<Option<RequestOutcome>> = vec![None; self.plan.len()];
        for (position, outcome) in outcomes {
            if let Some(slot) = slots.get_mut(position) {
                *slot = Some(outcome);
            }
        }

        let attempted = self.plan.request_count();
        let mut finished = Vec::with_capacity(self.plan.len());
        let mut failures = Vec::new();
        let mut created = Vec::new();

        for (position, (planned, outcome)) in self.plan.items.into_iter().zip(slots).enumerate() {
            let Some(request) = planned.request else {
                finished.push(planned.item);
                continue;
            };

            let failure = match outcome {
                None => Some(ItemFailure::NotExecuted),
                Some(Err(error)) => Some(ItemFailure::Transport { error }),
                Some(Ok(response)) if request.is_create() => match response.usable_id() {
                    Some(id) => {
                        created.push(CreatedItem { position, id });
                        finished.push(Item {
                            id: Some(id),
                            ..planned.item.clone()
                        });
                        None
                    }
                    None => Some(ItemFailure::MissingServerIdentity),
                },
                Some(Ok(_)) => {
                    finished.push(planned.item.clone());
                    None
                }
            };

            if let Some(failure) = failure {
                failures.push(FailedItem {
                    position,
                    name: planned.item.name,
                    failure,
                });
            }
        }

        if failures.is_empty() {
            Ok(finished)
        } else {
            Err(CommitError {
                attempted,
                failures,
                created,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{UpdatePolicy, Variant};

    fn plan(items: &[Item]) -> CommitPlan {
        CommitPlan::build(Variant::Milestone, 1, items, UpdatePolicy::Always, |_| None)
    }

    #[test]
    fn created_items_take_server_identity() {
        let items = vec![Item::persisted(7, 1, "A", 100), Item::new(1, "B", 200)];
        let result = Reconciler::new(plan(&items)).reconcile(vec![
            (1, Ok(MutationResponse::with_id(99))),
            (0, Ok(MutationResponse::empty())),
        ]);

        let finished = result.unwrap();
        assert_eq!(finished.len(), 2);
        assert_eq!(finished[0], items[0]);
        assert_eq!(finished[1].id, Some(99));
        assert_eq!(finished[1].name, "B");
    }

    #[test]
    fn missing_identity_fails_the_batch() {
        let items = vec![Item::new(1, "A", 100), Item::new(1, "B", 200)];
        let err = Reconciler::new(plan(&items))
            .reconcile(vec![
                (0, Ok(MutationResponse::with_id(5))),
                (1, Ok(MutationResponse::with_id(0))),
            ])
            .unwrap_err();

        assert!(err.has_missing_identity());
        assert_eq!(err.attempted, 2);
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].position, 1);
        assert_eq!(err.created, vec![CreatedItem { position: 0, id: 5 }]);
    }

    #[test]
    fn transport_failure_keeps_partial_creates() {
        let items = vec![Item::new(1, "A", 100), Item::new(1, "B", 200)];
        let err = Reconciler::new(plan(&items))
            .reconcile(vec![
                (0, Ok(MutationResponse::with_id(5))),
                (
                    1,
                    Err(TransportError::Unavailable {
                        message: "timeout".into(),
                    }),
                ),
            ])
            .unwrap_err();

        assert_eq!(err.to_string(), "commit failed: 1 of 2 requests did not succeed");
        assert_eq!(err.created.len(), 1);
        assert!(!err.has_missing_identity());
        assert_eq!(
            err.failures[0].failure.to_string(),
            "remote store unavailable: timeout"
        );
    }

    #[test]
    fn unreported_requests_are_failures() {
        let items = vec![Item::new(1, "A", 100)];
        let err = Reconciler::new(plan(&items)).reconcile(vec![]).unwrap_err();
        assert_eq!(err.failures[0].failure, ItemFailure::NotExecuted);
    }

    #[test]
    fn skipped_items_pass_through() {
        let seeded = Item::persisted(7, 1, "A", 100);
        let items = vec![seeded.clone()];
        let plan = CommitPlan::build(
            Variant::Milestone,
            1,
            &items,
            UpdatePolicy::ChangedOnly,
            |_| Some(&seeded),
        );

        let finished = Reconciler::new(plan).reconcile(vec![]).unwrap();
        assert_eq!(finished, items);
    }

    #[test]
    fn empty_plan_succeeds() {
        let finished = Reconciler::new(CommitPlan::default())
            .reconcile(vec![])
            .unwrap();
        assert!(finished.is_empty());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_success_preserves_filter_order(
                amounts in proptest::collection::vec(0u64..50, 0..10),
            ) {
                let items: Vec<Item> = amounts
                    .iter()
                    .enumerate()
                    .map(|(i, amount)| Item::new(1, format!("item-{}", i), *amount))
                    .collect();
                let plan = plan(&items);
                let outcomes: Vec<_> = plan
                    .requests()
                    .map(|(position, _)| {
                        let response = MutationResponse::with_id(position as u64 + 1);
                        (position, Ok::<_, TransportError>(response))
                    })
                    .collect();

                let finished = Reconciler::new(plan).reconcile(outcomes).unwrap();
                let expected: Vec<&str> = items
                    .iter()
                    .filter(|item| item.is_submittable())
                    .map(|item| item.name.as_str())
                    .collect();
                let names: Vec<&str> = finished.iter().map(|item| item.name.as_str()).collect();
                prop_assert_eq!(names, expected);
                prop_assert!(finished.iter().all(|item| item.amount > 0 && item.id.is_some()));
            }
        }
    }
}
