//! Error types for the index insight system.

use crate::types::TaskType;

/// Message carried by every rate-limited request.
pub const GENERATING_MESSAGE: &str = "Index insight is being generated, please wait...";

/// Result type alias for insight operations.
pub type Result<T> = std::result::Result<T, InsightError>;

/// Coarse classification of an error, used by hosts to pick a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    /// Another request is already generating the insight
    TooManyRequests,
    /// The request or the task graph is malformed
    BadRequest,
    /// The requested data does not exist
    NotFound,
    /// Anything else
    Internal,
}

/// Main error type for the index insight system.
#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    /// Missing record or missing prerequisite content
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Generation already in flight and not yet timed out
    #[error("{0}")]
    TooManyRequests(String),

    /// The task graph asks a task for a prerequisite it does not declare
    #[error("Unsupported prerequisite type {prerequisite} for {task_type} task")]
    UnsupportedPrerequisite {
        task_type: TaskType,
        prerequisite: TaskType,
    },

    /// The index mapping has no usable fields
    #[error("No mapping properties found for index: {0}")]
    NoMappingProperties(String),

    /// Artifact store errors
    #[error("Storage error: {0}")]
    Store(String),

    /// Model invocation errors
    #[error("Model call failed: {0}")]
    ModelCall(String),

    /// Malformed upstream data, usually model output
    #[error("Parse error: {0}")]
    Parse(String),

    /// A prerequisite task failed; the dependent never ran
    #[error("Failed to run prerequisite: {prerequisite}: {source}")]
    Prerequisite {
        prerequisite: TaskType,
        #[source]
        source: Box<InsightError>,
    },

    /// The task body failed
    #[error("{task_type} task failed: {source}")]
    TaskBody {
        task_type: TaskType,
        #[source]
        source: Box<InsightError>,
    },

    /// One or more field description batches failed
    #[error("{0}")]
    BatchProcessing(String),

    /// Every step of an aggregate request failed
    #[error("All index insight tasks failed")]
    AllTasksFailed {
        #[source]
        last: Box<InsightError>,
    },

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The prerequisite graph contains a cycle
    #[error("Invalid task graph: {0}")]
    InvalidTaskGraph(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InsightError {
    /// Create the rate-limit error returned while an insight is generating
    pub fn too_many_requests() -> Self {
        Self::TooManyRequests(GENERATING_MESSAGE.to_string())
    }

    /// Create a new not found error
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create a new storage error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a new model call error
    pub fn model_call(msg: impl Into<String>) -> Self {
        Self::ModelCall(msg.into())
    }

    /// Create a new parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap a prerequisite failure
    pub fn prerequisite(prerequisite: TaskType, source: InsightError) -> Self {
        Self::Prerequisite {
            prerequisite,
            source: Box::new(source),
        }
    }

    /// Wrap a task body failure
    pub fn task_body(task_type: TaskType, source: InsightError) -> Self {
        Self::TaskBody {
            task_type,
            source: Box::new(source),
        }
    }

    /// Check if this is the "being generated" rate-limit signal
    pub fn is_too_many_requests(&self) -> bool {
        matches!(self, Self::TooManyRequests(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a storage error
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Check if this is a prerequisite failure
    pub fn is_prerequisite(&self) -> bool {
        matches!(self, Self::Prerequisite { .. })
    }

    /// Innermost error, following prerequisite and task body wrappers
    pub fn root_cause(&self) -> &InsightError {
        match self {
            Self::Prerequisite { source, .. } | Self::TaskBody { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Response class for hosts. Wrapped errors report the class of their root cause.
    pub fn status(&self) -> ErrorStatus {
        match self.root_cause() {
            Self::TooManyRequests(_) => ErrorStatus::TooManyRequests,
            Self::NotFound { .. } => ErrorStatus::NotFound,
            Self::UnsupportedPrerequisite { .. }
            | Self::InvalidInput(_)
            | Self::InvalidTaskGraph(_)
            | Self::NoMappingProperties(_) => ErrorStatus::BadRequest,
            _ => ErrorStatus::Internal,
        }
    }
}
