// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy for the data-hub service.
//!
//! Every error carries an [`ErrorKind`] (a closed, machine-readable tag with
//! a fixed HTTP status mapping), a human-readable message, an optional cause
//! chain, and arbitrary key-value context. Use the builder returned by
//! [`HubError::new`] to construct errors fluently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Closed set of error kinds surfaced by the storage core and the
/// authorization engine.
///
/// Each kind serialises to its stable wire name (e.g. `"NotFoundError"`) and
/// maps to exactly one HTTP status. The set is deliberately closed: handlers
/// match on it exhaustively and new kinds are a breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The requested record does not exist (404).
    NotFoundError,
    /// A unique key or unique blinded attribute collided (409).
    DuplicateError,
    /// A conditional update matched zero rows — sequence mismatch (409).
    InvalidStateError,
    /// The request body or a value in it is malformed (400).
    DataError,
    /// An identifier has an invalid shape (400).
    SyntaxError,
    /// Any authorization failure, deliberately uniform (400).
    NotAllowedError,
    /// The requested query shape is not implemented (400).
    NotSupportedError,
    /// The legacy session-auth path denied the operation (403).
    PermissionDenied,
    /// Unclassified internal failure, surfaced without detail (500).
    InternalError,
}

/// Every kind, in definition order. Used by the catalog helpers and by
/// exhaustiveness tests.
pub const ALL_KINDS: &[ErrorKind] = &[
    ErrorKind::NotFoundError,
    ErrorKind::DuplicateError,
    ErrorKind::InvalidStateError,
    ErrorKind::DataError,
    ErrorKind::SyntaxError,
    ErrorKind::NotAllowedError,
    ErrorKind::NotSupportedError,
    ErrorKind::PermissionDenied,
    ErrorKind::InternalError,
];

impl ErrorKind {
    /// Stable wire name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFoundError => "NotFoundError",
            Self::DuplicateError => "DuplicateError",
            Self::InvalidStateError => "InvalidStateError",
            Self::DataError => "DataError",
            Self::SyntaxError => "SyntaxError",
            Self::NotAllowedError => "NotAllowedError",
            Self::NotSupportedError => "NotSupportedError",
            Self::PermissionDenied => "PermissionDenied",
            Self::InternalError => "InternalError",
        }
    }

    /// HTTP status this kind maps to on the wire.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFoundError => 404,
            Self::DuplicateError | Self::InvalidStateError => 409,
            Self::DataError
            | Self::SyntaxError
            | Self::NotAllowedError
            | Self::NotSupportedError => 400,
            Self::PermissionDenied => 403,
            Self::InternalError => 500,
        }
    }

    /// Look up a kind by its stable wire name.
    #[must_use]
    pub fn lookup(name: &str) -> Option<ErrorKind> {
        ALL_KINDS.iter().find(|k| k.as_str() == name).copied()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// HubError
// ---------------------------------------------------------------------------

/// Unified error value for the data-hub core.
///
/// Carries a stable [`ErrorKind`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use hub_error::{ErrorKind, HubError};
///
/// let err = HubError::new(ErrorKind::InvalidStateError, "sequence mismatch")
///     .with_context("docId", "z19pjdSMQNkDStqo4NcZ8XQKbo")
///     .with_context("expected", 4);
/// assert_eq!(err.kind.http_status(), 409);
/// ```
pub struct HubError {
    /// Machine-readable kind.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics. Deterministic ordering.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl HubError {
    /// Create a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; entries that fail
    /// to serialise are skipped.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // -- Convenience constructors for the common kinds -----------------------

    /// A record was not found.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFoundError, message)
    }

    /// A unique key or unique blinded attribute collided.
    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateError, message)
    }

    /// A conditional update matched zero rows.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidStateError, message)
    }

    /// The request body or a value in it is malformed.
    pub fn data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DataError, message)
    }

    /// An identifier has an invalid shape.
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SyntaxError, message)
    }

    /// Uniform authorization failure.
    ///
    /// Deliberately carries a fixed message: callers must not be able to
    /// distinguish "no capability" from "bad signature" from "wrong target".
    pub fn not_allowed() -> Self {
        Self::new(ErrorKind::NotAllowedError, "authorization failed")
    }

    /// The requested query shape is not implemented.
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotSupportedError, message)
    }

    /// The legacy session-auth path denied the operation.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    /// Unclassified internal failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    /// HTTP status for this error's kind.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }
}

impl fmt::Debug for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("HubError");
        d.field("kind", &self.kind);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.as_str(), self.message)?;
        if !self.context.is_empty() {
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for HubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Convenience result alias used across the workspace.
pub type HubResult<T> = Result<T, HubError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
