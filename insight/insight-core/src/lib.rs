//! Core types and abstractions for the index insight engine.
//!
//! This crate provides the data model, document identity scheme, collaborator
//! traits, configuration and error handling shared by every insight crate.

pub mod config;
pub mod error;
pub mod id;
pub mod mapping;
pub mod response;
pub mod traits;
pub mod types;

pub use config::{InsightConfig, RunnerSettings};
pub use error::{ErrorStatus, InsightError, Result};
pub use id::{doc_id, pattern_cache_doc_id};
pub use traits::*;
pub use types::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{InsightConfig, RunnerSettings};
    pub use crate::error::{ErrorStatus, InsightError, Result};
    pub use crate::id::{doc_id, pattern_cache_doc_id};
    pub use crate::traits::*;
    pub use crate::types::*;
}
