use backtrace::Backtrace;
use basu::error::BasuError;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for memdocs operations.
///
/// Each kind describes one category of failure so callers can branch on
/// [`DocsError::kind`] instead of matching on messages.
///
/// # Examples
///
/// ```rust
/// use memdocs::errors::{DocsError, DocsResult, ErrorKind};
///
/// fn lookup() -> DocsResult<()> {
///     Err(DocsError::new("Collection /items not found", ErrorKind::NotFound))
/// }
///
/// assert_eq!(lookup().unwrap_err().kind(), &ErrorKind::NotFound);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// A collection path does not resolve to a known collection
    NotFound,
    /// A where-clause operator is not implemented
    UnsupportedOperator,
    /// A where-clause operand has the wrong shape for its operator
    InvalidOperand,
    /// A pagination driver was connected before its sources were attached
    ConfigurationError,
    /// A document path does not carry a collection and an id
    InvalidPath,
    /// The operation is not valid in the current context
    InvalidOperation,
    /// Fixture or JSON data could not be decoded
    EncodingError,
    /// Error in event processing
    EventError,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::UnsupportedOperator => write!(f, "Unsupported operator"),
            ErrorKind::InvalidOperand => write!(f, "Invalid operand"),
            ErrorKind::ConfigurationError => write!(f, "Configuration error"),
            ErrorKind::InvalidPath => write!(f, "Invalid path"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::EventError => write!(f, "Event error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// The error type of every fallible memdocs operation.
///
/// `DocsError` carries a message, an [`ErrorKind`], an optional cause and the
/// backtrace captured where it was created.
///
/// # Examples
///
/// ```rust
/// use memdocs::errors::{DocsError, ErrorKind};
///
/// let cause = DocsError::new("unexpected token", ErrorKind::EncodingError);
/// let err = DocsError::new_with_cause("Fixture could not be loaded", ErrorKind::EncodingError, cause);
/// assert!(err.cause().is_some());
/// ```
#[derive(Clone)]
pub struct DocsError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<DocsError>>,
    backtrace: Arc<Backtrace>,
}

impl DocsError {
    /// Creates a new `DocsError` with the specified message and error kind.
    ///
    /// # Arguments
    ///
    /// * `message` - A description of the error
    /// * `error_kind` - The category of error
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        DocsError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    /// Creates a new `DocsError` that wraps an underlying cause.
    ///
    /// # Arguments
    ///
    /// * `message` - A description of the error
    /// * `error_kind` - The category of error
    /// * `cause` - The error that caused this one
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: DocsError) -> Self {
        DocsError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&DocsError> {
        self.cause.as_deref()
    }
}

impl Display for DocsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for DocsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}\nCaused by: {:?}", self.error_kind, self.message, cause),
            None => write!(f, "{}: {}\n{:?}", self.error_kind, self.message, self.backtrace),
        }
    }
}

impl Error for DocsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// Shorthand for `Result<T, DocsError>`.
pub type DocsResult<T> = Result<T, DocsError>;

impl From<serde_json::Error> for DocsError {
    fn from(err: serde_json::Error) -> Self {
        DocsError::new(&format!("JSON decoding error: {}", err), ErrorKind::EncodingError)
    }
}

impl From<BasuError> for DocsError {
    fn from(err: BasuError) -> Self {
        match err {
            BasuError::EventTypeNotFOUND => DocsError::new(
                "Event bus error: the requested event type is not registered",
                ErrorKind::EventError,
            ),
            BasuError::MutexPoisoned => DocsError::new(
                "Event bus error: internal mutex poisoned",
                ErrorKind::EventError,
            ),
            BasuError::HandlerError(e) => {
                let message = e
                    .source()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| e.to_string());
                DocsError::new(&format!("Event handler error: {}", message), ErrorKind::EventError)
            }
        }
    }
}
