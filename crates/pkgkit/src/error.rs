//! Error types for package manager operations.
//!
//! Errors are categorized from the manager's stderr so callers can decide
//! whether a failure is ignorable (already installed) or worth retrying
//! (network), and can show actionable advice.

use thiserror::Error;

/// Categories of package manager errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Package not found in the manager's registry
    NotFound,
    /// Permission denied (may need sudo or a user install)
    Permission,
    /// Package is already installed
    AlreadyInstalled,
    /// Package is not installed (uninstall of an absent package)
    NotInstalled,
    /// Another process holds the manager's lock
    Locked,
    /// Network-related errors (transient, retryable)
    Network,
    /// Manager binary not found
    ManagerNotFound,
    /// The manager does not support the operation
    Unsupported,
    /// Operation cancelled or timed out
    Cancelled,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Locked)
    }

    /// Whether this error can be safely ignored (operation already done).
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::AlreadyInstalled | Self::NotInstalled)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotFound => "Package not found",
            Self::Permission => "Permission denied",
            Self::AlreadyInstalled => "Already installed",
            Self::NotInstalled => "Not installed",
            Self::Locked => "Package manager locked",
            Self::Network => "Network connectivity issue",
            Self::ManagerNotFound => "Package manager not installed",
            Self::Unsupported => "Operation not supported",
            Self::Cancelled => "Operation cancelled",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::NotFound => "Verify the package name with the manager's search command",
            Self::Permission => "Check directory permissions or use a user-level install",
            Self::AlreadyInstalled => "No action needed - package is already installed",
            Self::NotInstalled => "No action needed - package is not installed",
            Self::Locked => "Wait for the other package manager process to finish and retry",
            Self::Network => "Check your internet connection and try again",
            Self::ManagerNotFound => "Install the package manager or pick another one",
            Self::Unsupported => "Use the manager's own tooling for this operation",
            Self::Cancelled => "Re-run the command, or raise the configured timeout",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur during package manager operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Package not found
    #[error("{manager}: package not found: {name}")]
    NotFound { manager: String, name: String },

    /// Permission denied
    #[error("{manager}: permission denied: {message}")]
    Permission { manager: String, message: String },

    /// Package is already installed
    #[error("{manager}: already installed: {name}")]
    AlreadyInstalled { manager: String, name: String },

    /// Package is not installed
    #[error("{manager}: not installed: {name}")]
    NotInstalled { manager: String, name: String },

    /// Manager lock held by another process
    #[error("{manager}: locked: {message}")]
    Locked { manager: String, message: String },

    /// Network-related error
    #[error("{manager}: network error: {message}")]
    Network { manager: String, message: String },

    /// Manager binary is not installed or not in PATH
    #[error("package manager '{manager}' not found in PATH")]
    ManagerNotFound { manager: String },

    /// Manager name not known to the registry
    #[error("unknown package manager '{name}' (known: {known})")]
    UnknownManager { name: String, known: String },

    /// Operation not offered by this manager
    #[error("{manager}: {operation} is not supported")]
    Unsupported { manager: String, operation: String },

    /// Command execution failed
    #[error("{manager}: {message}")]
    CommandFailed {
        manager: String,
        message: String,
        stderr: String,
    },

    /// Manager output could not be parsed
    #[error("{manager}: could not parse output: {message}")]
    Parse { manager: String, message: String },

    /// Cancelled through the context
    #[error("operation cancelled")]
    Cancelled,

    /// Context deadline passed
    #[error("operation timed out")]
    DeadlineExceeded,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Permission { .. } => ErrorCategory::Permission,
            Error::AlreadyInstalled { .. } => ErrorCategory::AlreadyInstalled,
            Error::NotInstalled { .. } => ErrorCategory::NotInstalled,
            Error::Locked { .. } => ErrorCategory::Locked,
            Error::Network { .. } => ErrorCategory::Network,
            Error::ManagerNotFound { .. } | Error::UnknownManager { .. } => {
                ErrorCategory::ManagerNotFound
            }
            Error::Unsupported { .. } => ErrorCategory::Unsupported,
            Error::Cancelled | Error::DeadlineExceeded => ErrorCategory::Cancelled,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this error can be safely ignored.
    pub fn is_ignorable(&self) -> bool {
        self.category().is_ignorable()
    }

    /// Whether this error aborts the surrounding operation
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }

    /// Create an error from a failed command's output.
    ///
    /// Analyzes stderr (and stdout, which some managers use for errors) to
    /// categorize the failure.
    pub fn from_output(manager: &str, output: &str, package_name: Option<&str>) -> Self {
        let lower = output.to_lowercase();
        let manager_owned = manager.to_string();
        let name = package_name.unwrap_or("unknown").to_string();
        let message = output.trim().to_string();

        let matches_any = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

        // Checked before "not found" so "no such package installed" is not a miss
        if matches_any(&[
            "is not installed",
            "not installed",
            "cannot uninstall",
            "no such package installed",
            "no such keg",
        ]) {
            return Error::NotInstalled {
                manager: manager_owned,
                name,
            };
        }

        if matches_any(&[
            "not found",
            "unable to locate",
            "no such package",
            "could not find",
            "has no installation candidate",
            "no matching distribution",
            "unable to find",
            "no packages found",
            "no available formula",
            "no cask with this name",
            "cannot find module",
            "no matching versions",
            "malformed module path",
            "404",
        ]) {
            return Error::NotFound {
                manager: manager_owned,
                name,
            };
        }

        if matches_any(&[
            "permission denied",
            "are you root",
            "access is denied",
            "access denied",
            "requires sudo",
            "operation not permitted",
            "eacces",
        ]) {
            return Error::Permission {
                manager: manager_owned,
                message,
            };
        }

        if matches_any(&[
            "already installed",
            "is already the newest version",
            "already satisfied",
            "already up-to-date",
            "nothing to install",
        ]) {
            return Error::AlreadyInstalled {
                manager: manager_owned,
                name,
            };
        }

        if matches_any(&[
            "could not get lock",
            "unable to lock",
            "database is locked",
            "lock file exists",
            "waiting for cache lock",
            "blocking waiting for file lock",
        ]) {
            return Error::Locked {
                manager: manager_owned,
                message,
            };
        }

        if matches_any(&[
            "could not resolve",
            "connection refused",
            "timed out",
            "network",
            "ssl",
            "certificate",
            "failed to download",
            "etimedout",
            "enotfound",
        ]) {
            return Error::Network {
                manager: manager_owned,
                message,
            };
        }

        Error::CommandFailed {
            message: format!(
                "command failed{}",
                package_name.map(|n| format!(" for {n}")).unwrap_or_default()
            ),
            manager: manager_owned,
            stderr: message,
        }
    }
}

impl From<reconcile::Error> for Error {
    fn from(err: reconcile::Error) -> Self {
        match err {
            reconcile::Error::Cancelled => Error::Cancelled,
            reconcile::Error::DeadlineExceeded => Error::DeadlineExceeded,
            reconcile::Error::Io(e) => Error::Io(e),
            other => Error::Io(std::io::Error::other(other.chain())),
        }
    }
}

impl From<Error> for reconcile::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Cancelled => reconcile::Error::Cancelled,
            Error::DeadlineExceeded => reconcile::Error::DeadlineExceeded,
            other => reconcile::Error::Scan {
                resource: "package manager".to_string(),
                source: Box::new(other),
            },
        }
    }
}

/// Result type for package manager operations.
pub type Result<T> = std::result::Result<T, Error>;
