//! Inference component contract.

mod request;
mod response;
mod traits;

pub use request::InferenceRequest;
pub use response::{Artifact, InferenceResponse};
pub use traits::InferenceProvider;
