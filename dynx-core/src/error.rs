use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transport error: {message}")]
    Transport { message: String, retryable: bool },

    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Terminal transport failure; aborts the fetch it occurs in.
    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Transient transport failure; the same request may be issued again.
    pub fn retryable_transport(message: impl Into<String>) -> Self {
        Error::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Returns a stable error code for this error variant.
    /// These codes are stable and can be used by clients for error classification.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidExpression(_) => "INVALID_EXPRESSION",
            Error::UnsupportedOperator(_) => "UNSUPPORTED_OPERATOR",
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Transport { .. } => "TRANSPORT_ERROR",
            Error::Throttled(_) => "THROTTLED",
            Error::RetriesExhausted { .. } => "RETRIES_EXHAUSTED",
            Error::Json(_) => "JSON_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if the request that produced this error can be re-issued unchanged.
    ///
    /// Only transport-level failures flagged as transient and throttling are
    /// retryable. Everything produced while building a request is terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { retryable, .. } => *retryable,
            Error::Throttled(_) => true,

            Error::InvalidExpression(_) => false,
            Error::UnsupportedOperator(_) => false,
            Error::InvalidArgument(_) => false,
            Error::Serialization(_) => false,
            Error::RetriesExhausted { .. } => false,
            Error::Json(_) => false,
            Error::Internal(_) => false,
        }
    }

    /// Adds context to an error by wrapping it in an Internal error.
    ///
    /// # Examples
    ///
    /// ```
    /// use dynx_core::Error;
    ///
    /// let err = Error::transport("connection reset").with_context("batch get on users");
    /// assert_eq!(err.code(), "INTERNAL_ERROR");
    /// assert!(err.to_string().contains("connection reset"));
    /// ```
    pub fn with_context(self, context: &str) -> Error {
        Error::Internal(format!("{}: {}", context, self))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
