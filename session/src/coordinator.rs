//! Dispatches commit plans and deletes to the remote store.
//!
//! A commit sends every planned request concurrently, waits for all of them
//! and hands the outcomes to the engine's [`Reconciler`]. Nothing is retried
//! and nothing is rolled back: if one create fails, the others that went
//! through stay created.

use futures::stream::{self, StreamExt};
use tally_engine::{
    CommitError, CommitPlan, Item, ItemId, MutationRequest, ParentId, Reconciler, RequestOutcome,
    TransportError, UpdatePolicy, Variant,
};

use crate::executor::MutationExecutor;

/// Turns plans into remote calls.
#[derive(Debug, Clone)]
pub struct SyncCoordinator<E> {
    executor: E,
    /// Upper bound on concurrent requests, unbounded if `None`
    max_in_flight: Option<usize>,
}

impl<E: MutationExecutor> SyncCoordinator<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            max_in_flight: None,
        }
    }

    /// Builder: cap the number of requests in flight at once.
    pub fn with_max_in_flight(mut self, limit: Option<usize>) -> Self {
        self.max_in_flight = limit;
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Commit `items` as they stand, updating every persisted item.
    pub async fn commit_items(
        &self,
        variant: Variant,
        parent_id: ParentId,
        items: &[Item],
    ) -> Result<Vec<Item>, CommitError> {
        let plan = CommitPlan::build(variant, parent_id, items, UpdatePolicy::Always, |_| None);
        self.commit(plan).await
    }

    /// Execute every request in `plan` and reconcile the outcomes.
    ///
    /// The returned items keep plan order regardless of completion order.
    pub async fn commit(&self, plan: CommitPlan) -> Result<Vec<Item>, CommitError> {
        let requests: Vec<(usize, MutationRequest)> = plan
            .requests()
            .map(|(position, request)| (position, request.clone()))
            .collect();

        tracing::info!(
            items = plan.len(),
            requests = requests.len(),
            "Starting commit"
        );

        let executor = &self.executor;
        let limit = self.max_in_flight.unwrap_or(requests.len()).max(1);
        let outcomes: Vec<(usize, RequestOutcome)> = stream::iter(requests)
            .map(move |(position, request)| async move {
                let operation = request.operation_name();
                tracing::debug!(position, %operation, "Dispatching request");

                let outcome = executor.execute(request).await;
                if let Err(error) = &outcome {
                    tracing::warn!(position, %operation, %error, "Request failed");
                }
                (position, outcome)
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        let result = Reconciler::new(plan).reconcile(outcomes);
        match &result {
            Ok(items) => tracing::info!(items = items.len(), "Commit finished"),
            Err(err) => {
                if err.has_missing_identity() {
                    tracing::error!(
                        created = err.created.len(),
                        "Remote store created items without returning their ids"
                    );
                }
                tracing::warn!(
                    failed = err.failures.len(),
                    attempted = err.attempted,
                    "Commit failed"
                );
            }
        }
        result
    }

    /// Delete one persisted item.
    pub async fn delete(&self, variant: Variant, id: ItemId) -> Result<(), TransportError> {
        tracing::debug!(%variant, id, "Deleting item");
        self.executor
            .execute(MutationRequest::delete(variant, id))
            .await
            .map(|_| ())
    }
}
