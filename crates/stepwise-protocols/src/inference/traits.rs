//! Inference provider trait definition.

use async_trait::async_trait;

use super::{InferenceRequest, InferenceResponse};
use crate::error::InferenceError;

/// Opaque request/response inference component.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Returns the provider ID.
    fn id(&self) -> &str;

    /// Run one inference call.
    async fn invoke(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError>;
}
