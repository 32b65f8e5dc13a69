//! Cursor error types
//!
//! Provides structured errors for the two failure phases of a series cursor:
//! construction (opening the index scan, building the field table) and
//! iteration (the series scan failing mid-stream).

use std::fmt;

/// Cursor error with context
#[derive(Debug)]
pub struct CursorError {
    /// Error kind for programmatic handling
    pub kind: CursorErrorKind,
    /// Human-readable message
    pub message: String,
    /// Optional source error
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CursorError {
    /// Create a new cursor error
    pub fn new(kind: CursorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Add source error for error chaining
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create a construction error
    pub fn construction(message: impl Into<String>) -> Self {
        Self::new(CursorErrorKind::Construction, message)
    }

    /// Create an error for a scan that produced the wrong projection
    pub fn incompatible_projection(expected: &str, actual: &str) -> Self {
        Self::new(
            CursorErrorKind::IncompatibleProjection,
            format!("expected {} projection, scan produced {}", expected, actual),
        )
    }

    /// Create a scan error
    pub fn scan(message: impl Into<String>) -> Self {
        Self::new(CursorErrorKind::Scan, message)
    }

    /// Create a cancellation error
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(CursorErrorKind::Cancelled, message)
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CursorErrorKind::Internal, message)
    }

    /// Whether this error is fatal to cursor creation
    pub fn is_construction(&self) -> bool {
        matches!(
            self.kind,
            CursorErrorKind::Construction | CursorErrorKind::IncompatibleProjection
        )
    }
}

impl fmt::Display for CursorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CursorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Categories of cursor errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorErrorKind {
    /// Opening the series scan or building the field table failed
    Construction,
    /// The scan engine returned a projection other than the one requested
    IncompatibleProjection,
    /// The series scan failed mid-stream
    Scan,
    /// The read context was cancelled
    Cancelled,
    /// Internal error (bug, unexpected state)
    Internal,
}

impl fmt::Display for CursorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorErrorKind::Construction => write!(f, "ConstructionError"),
            CursorErrorKind::IncompatibleProjection => write!(f, "IncompatibleProjection"),
            CursorErrorKind::Scan => write!(f, "ScanError"),
            CursorErrorKind::Cancelled => write!(f, "Cancelled"),
            CursorErrorKind::Internal => write!(f, "Internal"),
        }
    }
}

/// Result type alias for cursor operations
pub type CursorResult<T> = std::result::Result<T, CursorError>;
