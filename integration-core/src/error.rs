//! Crate-wide error taxonomy.
//!
//! Every fallible public operation returns [`Error`] (or [`Result`]) rather
//! than a bare `String`, so callers can match on [`ErrorKind`] no matter how
//! many layers wrapped the original cause.

use std::fmt;
use std::sync::Arc;

/// A closed set of error kinds plus an `Internal` catch-all for conditions
/// that are not part of the documented taxonomy (poisoned locks, invariant
/// violations) but must still be representable without panicking across an
/// API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Repository absent, path absent, branch absent.
    NotFound,
    /// A validator rejected a protocol / host / path / key.
    InvalidInput,
    /// A mutating operation left the work tree in a conflict state.
    Conflict,
    /// A remote refused credentials.
    Authentication,
    /// Operation attempted after the manager was closed.
    ManagerClosed,
    /// The version-control binary exited non-zero with an unclassified stderr.
    ExternalFailure,
    /// The circuit breaker denied the call.
    CircuitOpen,
    /// Programmer-error / invariant-violation condition.
    Internal,
}

impl ErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Authentication => "authentication",
            ErrorKind::ManagerClosed => "manager_closed",
            ErrorKind::ExternalFailure => "external_failure",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crate error: a kind, an optional cause, and a chain of short context
/// frames attached by each layer that re-raises it. `kind()` always returns
/// the kind the error was originally constructed with.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    context: Vec<&'static str>,
    message: Arc<str>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            context: Vec::new(),
            message: Arc::from(message.into()),
            source: None,
        }
    }

    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            context: Vec::new(),
            message: Arc::from(message.into()),
            source: Some(Arc::new(source)),
        }
    }

    /// Attach a short static context frame without losing the original kind.
    pub fn context(mut self, frame: &'static str) -> Self {
        self.context.push(frame);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    pub fn manager_closed() -> Self {
        Self::new(ErrorKind::ManagerClosed, "manager is closed")
    }

    pub fn external_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExternalFailure, message)
    }

    pub fn circuit_open() -> Self {
        Self::new(ErrorKind::CircuitOpen, "circuit breaker is open")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        for frame in self.context.iter().rev() {
            write!(f, " (while {frame})")?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|s| s.as_ref() as _)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            _ => ErrorKind::ExternalFailure,
        };
        Error::with_source(kind, "i/o error", err)
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
