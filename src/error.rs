/// Error types for the ip2mmdb library
use std::fmt;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Failure to turn a decimal literal into an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The literal is not a base-10 non-negative integer
    Parse(String),

    /// The value is negative or does not fit in 128 bits
    Range(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Parse(msg) => write!(f, "Invalid IP number: {}", msg),
            DecodeError::Range(msg) => write!(f, "IP number out of range: {}", msg),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Errors reported by a [`Sink`](crate::sink::Sink) when inserting a range
///
/// The first two variants are recoverable; the splitter reacts to them
/// instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The endpoints do not form one contiguous range in the sink's
    /// address representation (one is IPv4, the other IPv6)
    Boundary(String),

    /// The range lies in a network that aliases the IPv4 space
    Aliased(String),

    /// Anything else; fatal
    Other(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Boundary(msg) => write!(f, "Range crosses address family boundary: {}", msg),
            SinkError::Aliased(msg) => write!(f, "Range is in an aliased network: {}", msg),
            SinkError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SinkError {}

/// Main error type for an ingestion run
///
/// Every variant is fatal: the first one raised stops the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// Malformed decimal literal or non-numeric coordinate
    Parse(String),

    /// Decimal value negative or larger than the IPv6 maximum
    Range(String),

    /// Row has the wrong number of columns for the dataset
    Schema(String),

    /// Unrecoverable sink failure
    Sink(String),

    /// I/O errors
    Io(String),

    /// CSV reader errors
    Csv(String),

    /// Input contained no rows
    Empty,
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Parse(msg) => write!(f, "Parse error: {}", msg),
            IngestError::Range(msg) => write!(f, "Range error: {}", msg),
            IngestError::Schema(msg) => write!(f, "Schema error: {}", msg),
            IngestError::Sink(msg) => write!(f, "Sink error: {}", msg),
            IngestError::Io(msg) => write!(f, "I/O error: {}", msg),
            IngestError::Csv(msg) => write!(f, "Unable to read input file: {}", msg),
            IngestError::Empty => write!(f, "Nothing to import"),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<DecodeError> for IngestError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Parse(msg) => IngestError::Parse(msg),
            DecodeError::Range(msg) => IngestError::Range(msg),
        }
    }
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Io(err.to_string())
    }
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        IngestError::Csv(err.to_string())
    }
}
