use std::sync::Arc;

use async_trait::async_trait;

use cardbridge_core_types::{RawCardRequest, RequestId, RequestStatus};

use crate::error::DispatchError;

/// Where card requests come from.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn poll(&self) -> Result<Vec<RawCardRequest>, DispatchError>;
}

/// Where terminal statuses go. Best effort; failures are not retried.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn report(&self, id: &RequestId, status: RequestStatus) -> Result<(), DispatchError>;
}

#[async_trait]
impl<S> UpdateSource for Arc<S>
where
    S: UpdateSource + ?Sized,
{
    async fn poll(&self) -> Result<Vec<RawCardRequest>, DispatchError> {
        (**self).poll().await
    }
}

#[async_trait]
impl<S> StatusSink for Arc<S>
where
    S: StatusSink + ?Sized,
{
    async fn report(&self, id: &RequestId, status: RequestStatus) -> Result<(), DispatchError> {
        (**self).report(id, status).await
    }
}
