//! HTTP inference provider for Stepwise.
//!
//! Posts each [`InferenceRequest`](stepwise_protocols::InferenceRequest) as
//! JSON to a single endpoint and reads back an
//! [`InferenceResponse`](stepwise_protocols::InferenceResponse).

mod api;
mod provider;

pub use provider::HttpInferenceProvider;
