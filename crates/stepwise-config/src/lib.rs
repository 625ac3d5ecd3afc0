//! # Stepwise Config
//!
//! TOML configuration for the step runner, its resilience layer, the
//! context compactor and the storage locations.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
