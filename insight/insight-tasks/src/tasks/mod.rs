//! Per-index task bodies.

pub mod field_description;
pub mod log_check;
pub mod statistical;

pub use field_description::FieldDescriptionTask;
pub use log_check::{LogCheckResult, LogRelatedIndexCheckTask};
pub use statistical::StatisticalDataTask;
