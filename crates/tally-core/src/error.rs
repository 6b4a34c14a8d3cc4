//! Shared error type across tally crates.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Stable error codes (used by callers that branch on the failure class).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Descriptor failed validation at construction.
    DescriptorInvalid,
    /// Descriptor identity already owned by another collector.
    DuplicateDescriptor,
    /// Same identity or name declared with different help/label names.
    InconsistentDescriptor,
    /// A collector failed (error, panic, or rejected output) during gather.
    CollectionFailed,
    /// A collector exceeded the gather deadline.
    CollectionTimeout,
    /// Wrong number of variable label values.
    LabelCardinality,
    /// Invalid configuration.
    BadConfig,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorKind {
    /// String representation used in logs and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::DescriptorInvalid => "DESCRIPTOR_INVALID",
            ErrorKind::DuplicateDescriptor => "DUPLICATE_DESCRIPTOR",
            ErrorKind::InconsistentDescriptor => "INCONSISTENT_DESCRIPTOR",
            ErrorKind::CollectionFailed => "COLLECTION_FAILED",
            ErrorKind::CollectionTimeout => "COLLECTION_TIMEOUT",
            ErrorKind::LabelCardinality => "LABEL_CARDINALITY",
            ErrorKind::BadConfig => "BAD_CONFIG",
            ErrorKind::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, TallyError>;

/// Unified error type used by core and registry.
#[derive(Debug, Clone, Error)]
pub enum TallyError {
    #[error("descriptor {desc} is invalid: {cause}")]
    DescriptorInvalid { desc: String, cause: String },
    #[error("duplicate descriptor: {0}")]
    DuplicateDescriptor(String),
    #[error("inconsistent descriptor: {0}")]
    InconsistentDescriptor(String),
    #[error("collection failed: {0}")]
    CollectionFailed(String),
    #[error("collection timed out after {timeout_ms}ms: {collector}")]
    CollectionTimeout { collector: String, timeout_ms: u64 },
    #[error("collection still running from previous pass: {collector}")]
    CollectionStillRunning { collector: String },
    #[error("label cardinality mismatch for {name}: expected {expected} values, got {got}")]
    LabelCardinality {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl TallyError {
    /// Map to a stable error code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TallyError::DescriptorInvalid { .. } => ErrorKind::DescriptorInvalid,
            TallyError::DuplicateDescriptor(_) => ErrorKind::DuplicateDescriptor,
            TallyError::InconsistentDescriptor(_) => ErrorKind::InconsistentDescriptor,
            TallyError::CollectionFailed(_) => ErrorKind::CollectionFailed,
            TallyError::CollectionTimeout { .. } | TallyError::CollectionStillRunning { .. } => {
                ErrorKind::CollectionTimeout
            }
            TallyError::LabelCardinality { .. } => ErrorKind::LabelCardinality,
            TallyError::BadConfig(_) => ErrorKind::BadConfig,
            TallyError::UnsupportedVersion => ErrorKind::UnsupportedVersion,
            TallyError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Registration conflicts (the failures strict mode escalates).
    pub fn is_conflict(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::DuplicateDescriptor | ErrorKind::InconsistentDescriptor
        )
    }
}

/// Serialized as `{"code": ..., "message": ...}` so snapshots keep their errors.
impl Serialize for TallyError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("TallyError", 2)?;
        s.serialize_field("code", self.kind().as_str())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}
