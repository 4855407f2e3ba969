//! The seam between sessions and the remote store.

use async_trait::async_trait;
use std::sync::Arc;
use tally_engine::{MutationRequest, MutationResponse, TransportError};

/// Executes one create/update/delete request against the remote store.
///
/// Implementations own the transport. Sessions issue exactly one call per
/// request and never retry, batch or cache.
#[async_trait]
pub trait MutationExecutor: Send + Sync {
    async fn execute(&self, request: MutationRequest) -> Result<MutationResponse, TransportError>;
}

#[async_trait]
impl<E: MutationExecutor + ?Sized> MutationExecutor for Arc<E> {
    async fn execute(&self, request: MutationRequest) -> Result<MutationResponse, TransportError> {
        (**self).execute(request).await
    }
}
