//! Error types for wiretrace

use std::fmt;

/// Boxed error used as the service error type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while setting up a [`TraceLayer`](crate::TraceLayer).
///
/// These surface once, at configuration time. Nothing in the request path
/// produces a `ConfigError`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A skip or sensitive header name is not a valid HTTP header name.
    #[error("invalid header name {0:?}")]
    InvalidHeaderName(String),

    /// A body size ceiling was set to zero.
    #[error("{0} body limit must be greater than zero")]
    ZeroBodyLimit(BodyLimitSide),

    /// The output sink could not be opened.
    #[error("cannot open trace output: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be read from the environment.
    #[cfg(feature = "config")]
    #[error("configuration error: {0}")]
    Env(#[from] envy::Error),
}

/// Which body limit a [`ConfigError::ZeroBodyLimit`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLimitSide {
    Request,
    Response,
}

impl fmt::Display for BodyLimitSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BodyLimitSide::Request => "request",
            BodyLimitSide::Response => "response",
        })
    }
}

/// Error returned by a user-supplied request or body filter.
///
/// A filter can fail and still ask for the content to be skipped, which
/// mirrors a `(skip = true, err)` pair:
///
/// ```
/// use wiretrace_core::FilterError;
///
/// let err = FilterError::new("incomplete implementation").skipping();
/// assert!(err.skips());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterError {
    message: String,
    skip: bool,
}

impl FilterError {
    /// Create a filter error that does not suppress the content.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            skip: false,
        }
    }

    /// Mark the error as also requesting the content to be skipped.
    pub fn skipping(mut self) -> Self {
        self.skip = true;
        self
    }

    /// Whether the filter asked to skip despite failing.
    pub fn skips(&self) -> bool {
        self.skip
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FilterError {}

/// Error returned by a [`Formatter`](crate::Formatter) that could not
/// rewrite a body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct FormatError(String);

impl FormatError {
    /// Create a format error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<serde_json::Error> for FormatError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}
