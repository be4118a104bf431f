//! Error types for resource teardown management.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Result type for manager operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error for caller-supplied acquire/release failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared caller failure. `Arc` rather than `Box` so that aggregated
/// failures stay `Clone` — every `close()` caller receives the same
/// terminal outcome.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// The kind of a manager failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ErrorKind {
    /// Configuration is invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// The error message.
        message: String,
    },

    /// `add` was invoked after the manager reached its terminal state.
    #[error("manager is closed")]
    Closed,

    /// `add` was invoked while a `close` was waiting out in-flight
    /// acquisitions or draining the release stack.
    #[error("manager is closing")]
    Closing,

    /// A deadline expired before the wrapped action settled.
    #[error("timeout of {}ms expired", .limit.as_millis())]
    Timeout {
        /// The configured deadline.
        limit: Duration,
    },

    /// An acquire action failed.
    #[error("acquire failed: {source}")]
    Acquire {
        /// The caller-supplied failure.
        #[source]
        source: SharedError,
    },

    /// A release action failed.
    #[error("release failed: {source}")]
    Release {
        /// The caller-supplied failure.
        #[source]
        source: SharedError,
    },
}

/// Failure produced by manager operations.
///
/// Carries a primary [`ErrorKind`] plus the chains that teardown
/// aggregation needs: [`secondary`](Error::secondary) failures caught
/// while a drain kept going best-effort, and an optional distinct
/// [`teardown_failure`](Error::teardown_failure) attached when an
/// acquisition failure triggered a cascading close that failed too.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    other: Vec<Error>,
    teardown: Option<Box<Error>>,
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            other: Vec::new(),
            teardown: None,
        }
    }

    /// Create a configuration error.
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration {
            message: message.into(),
        })
    }

    pub(crate) fn closed() -> Self {
        Self::new(ErrorKind::Closed)
    }

    pub(crate) fn closing() -> Self {
        Self::new(ErrorKind::Closing)
    }

    pub(crate) fn timeout(limit: Duration) -> Self {
        Self::new(ErrorKind::Timeout { limit })
    }

    pub(crate) fn acquire(source: BoxError) -> Self {
        Self::new(ErrorKind::Acquire {
            source: source.into(),
        })
    }

    pub(crate) fn release(source: BoxError) -> Self {
        Self::new(ErrorKind::Release {
            source: source.into(),
        })
    }

    /// Attach failures caught after this one during the same drain.
    pub(crate) fn with_other(mut self, other: Vec<Error>) -> Self {
        self.other = other;
        self
    }

    /// Attach the aggregated outcome of a cascading close that failed.
    pub(crate) fn with_teardown(mut self, failure: Error) -> Self {
        self.teardown = Some(Box::new(failure));
        self
    }

    /// The primary failure kind.
    #[must_use]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Failures caught while the drain kept going after this one, in
    /// the order they occurred.
    #[must_use]
    pub fn secondary(&self) -> &[Error] {
        &self.other
    }

    /// The aggregated failure of the teardown cascade triggered by this
    /// failure, when that cascade failed as well. The acquisition
    /// failure itself stays primary.
    #[must_use]
    pub fn teardown_failure(&self) -> Option<&Error> {
        self.teardown.as_deref()
    }

    /// Whether this failure came from an expired deadline.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout { .. })
    }

    /// Whether `add` was rejected because the manager is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self.kind, ErrorKind::Closed)
    }

    /// Whether `add` was rejected because a close is in progress.
    #[must_use]
    pub fn is_closing(&self) -> bool {
        matches!(self.kind, ErrorKind::Closing)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.other.is_empty() {
            write!(f, " ({} more release failure(s) followed)", self.other.len())?;
        }
        if self.teardown.is_some() {
            write!(f, " (teardown failed as well)")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}
