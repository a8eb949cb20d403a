//! Error types for reconciliation and apply operations.

use thiserror::Error;

/// Boxed error produced by a domain adapter (package manager, filesystem, ...).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while reconciling or applying items.
#[derive(Debug, Error)]
pub enum Error {
    /// The operation was cancelled through its [`Context`](crate::Context)
    #[error("operation cancelled")]
    Cancelled,

    /// The context deadline passed before the operation finished
    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    /// Deliberate refusal to perform an unsafe action
    #[error("{domain} '{name}': not supported: {reason}")]
    NotSupported {
        /// Domain of the refused item
        domain: String,
        /// Name of the refused item
        name: String,
        /// Why the action is refused
        reason: String,
    },

    /// An item reached `apply` without metadata its resource requires
    #[error("item '{name}' is missing required metadata key '{key}'")]
    MissingMetadata {
        /// Item name
        name: String,
        /// Missing metadata key
        key: String,
    },

    /// A resource could not enumerate actual state
    #[error("failed to scan {resource}")]
    Scan {
        /// Resource id
        resource: String,
        /// Underlying failure
        #[source]
        source: BoxError,
    },

    /// Applying a single item failed
    #[error("failed to apply {domain} '{name}'")]
    Apply {
        /// Domain of the item
        domain: String,
        /// Item name
        name: String,
        /// Underlying failure
        #[source]
        source: BoxError,
    },

    /// Every result of a batch operation failed
    #[error("{operation} operation failed: all {count} item(s) failed to process")]
    AllFailed {
        /// Operation label (e.g. "install")
        operation: String,
        /// Number of failed items
        count: usize,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a domain failure for a specific item.
    pub fn apply(
        domain: impl Into<String>,
        name: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Apply {
            domain: domain.into(),
            name: name.into(),
            source: source.into(),
        }
    }

    /// Wrap a scan failure for a resource.
    pub fn scan(resource: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Scan {
            resource: resource.into(),
            source: source.into(),
        }
    }

    /// Build a safety refusal.
    pub fn not_supported(
        domain: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::NotSupported {
            domain: domain.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// The message followed by every underlying cause, joined by `: `.
    pub fn chain(&self) -> String {
        let mut message = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            message.push_str(": ");
            message.push_str(&err.to_string());
            cause = err.source();
        }
        message
    }

    /// Whether this error means the operation was aborted rather than failed.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;
