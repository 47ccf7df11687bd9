//! Deterministic document identifiers for stored insights.
//!
//! Every insight lives under `sha256(index + "_" + TASK_TYPE)` rendered as
//! 64 lowercase hex characters. Pattern cache entries use the same scheme with
//! the `PATTERN_TYPE_CACHE` suffix.

use crate::types::{PATTERN_TYPE_CACHE, TaskType};
use sha2::{Digest, Sha256};

/// Length of every generated id.
pub const DOC_ID_LEN: usize = 64;

fn hash_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// Id of the record for `(index, task_type)`
pub fn doc_id(index: &str, task_type: TaskType) -> String {
    hash_hex(&format!("{}_{}", index, task_type.as_str()))
}

/// Id of the cached classification of `pattern`
pub fn pattern_cache_doc_id(pattern: &str) -> String {
    hash_hex(&format!("{}_{}", pattern, PATTERN_TYPE_CACHE))
}
