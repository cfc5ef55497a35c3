use backtrace::Backtrace;
use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for docscan operations.
///
/// Every failure raised by the scanner, the paginator, the client layer or a
/// store backend carries one of these kinds so callers can branch on the
/// category without parsing messages.
///
/// # Examples
///
/// ```rust
/// use docscan::errors::{DocScanError, ErrorKind, DocScanResult};
///
/// fn example() -> DocScanResult<()> {
///     Err(DocScanError::new("no documents matched", ErrorKind::EmptyResult))
/// }
///
/// assert!(example().unwrap_err().is_empty_result());
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// Nothing matched the query. Not a hard failure.
    EmptyResult,
    /// A count, find or cursor call against the store failed
    FetchFailure,
    /// A document could not be mapped into the caller's type
    DecodeFailure,
    /// A caller value could not be turned into a document
    EncodeFailure,
    /// An insert, update or delete was rejected by the store
    WriteFailure,
    /// A write violated the `_id` or a unique index
    DuplicateKey,
    /// Index creation failed
    IndexingError,
    /// An argument is outside of its accepted range
    InvalidArgument,
    /// The operation is not valid in the current context
    InvalidOperation,
    /// Connecting to the store failed
    ConnectionFailure,
    /// The store has already been closed
    StoreClosed,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::EmptyResult => write!(f, "Empty result"),
            ErrorKind::FetchFailure => write!(f, "Fetch failure"),
            ErrorKind::DecodeFailure => write!(f, "Decode failure"),
            ErrorKind::EncodeFailure => write!(f, "Encode failure"),
            ErrorKind::WriteFailure => write!(f, "Write failure"),
            ErrorKind::DuplicateKey => write!(f, "Duplicate key"),
            ErrorKind::IndexingError => write!(f, "Indexing error"),
            ErrorKind::InvalidArgument => write!(f, "Invalid argument"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::ConnectionFailure => write!(f, "Connection failure"),
            ErrorKind::StoreClosed => write!(f, "Store closed"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Error type of every fallible docscan operation.
///
/// `DocScanError` carries a message, an [`ErrorKind`], an optional cause and the
/// backtrace captured where it was raised.
///
/// # Examples
///
/// ```rust
/// use docscan::errors::{DocScanError, ErrorKind};
///
/// let cause = DocScanError::new("socket reset", ErrorKind::FetchFailure);
/// let err = DocScanError::new_with_cause("window fetch failed", ErrorKind::FetchFailure, cause);
/// assert!(err.cause().is_some());
/// ```
#[derive(Clone)]
pub struct DocScanError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<DocScanError>>,
    backtrace: Arc<Mutex<Backtrace>>,
}

impl DocScanError {
    /// Creates a new `DocScanError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        DocScanError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Mutex::new(Backtrace::new_unresolved())),
        }
    }

    /// Creates a new `DocScanError` wrapping the error that caused it.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: DocScanError) -> Self {
        DocScanError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Mutex::new(Backtrace::new_unresolved())),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&DocScanError> {
        self.cause.as_deref()
    }

    /// Returns `true` when the error only reports that nothing matched.
    pub fn is_empty_result(&self) -> bool {
        self.error_kind == ErrorKind::EmptyResult
    }
}

impl Display for DocScanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for DocScanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(
                f,
                "{}: {}\nCaused by: {:?}",
                self.error_kind, self.message, cause
            ),
            None => {
                let mut backtrace = self.backtrace.lock();
                backtrace.resolve();
                write!(f, "{}: {}\n{:?}", self.error_kind, self.message, *backtrace)
            }
        }
    }
}

impl Error for DocScanError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// Shorthand for `Result<T, DocScanError>`.
pub type DocScanResult<T> = Result<T, DocScanError>;

impl From<bson::de::Error> for DocScanError {
    fn from(err: bson::de::Error) -> Self {
        DocScanError::new(
            &format!("Failed to decode document: {}", err),
            ErrorKind::DecodeFailure,
        )
    }
}

impl From<bson::ser::Error> for DocScanError {
    fn from(err: bson::ser::Error) -> Self {
        DocScanError::new(
            &format!("Failed to encode document: {}", err),
            ErrorKind::EncodeFailure,
        )
    }
}

impl From<String> for DocScanError {
    fn from(msg: String) -> Self {
        DocScanError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for DocScanError {
    fn from(msg: &str) -> Self {
        DocScanError::new(msg, ErrorKind::InternalError)
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for DocScanError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind as DriverErrorKind, WriteFailure};

        let error_kind = match err.kind.as_ref() {
            DriverErrorKind::Authentication { .. }
            | DriverErrorKind::DnsResolve { .. }
            | DriverErrorKind::ServerSelection { .. }
            | DriverErrorKind::Io(_) => ErrorKind::ConnectionFailure,
            DriverErrorKind::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            DriverErrorKind::BsonDeserialization(_) => ErrorKind::DecodeFailure,
            DriverErrorKind::BsonSerialization(_) => ErrorKind::EncodeFailure,
            DriverErrorKind::Write(WriteFailure::WriteError(write_error))
                if write_error.code == 11000 =>
            {
                ErrorKind::DuplicateKey
            }
            DriverErrorKind::Write(_) => ErrorKind::WriteFailure,
            _ => ErrorKind::FetchFailure,
        };
        DocScanError::new(&format!("MongoDB error: {}", err), error_kind)
    }
}
