use crate::{Name, ReaderState};
use std::fmt;

/// An error that can occur when reading, writing, or merging content files
#[derive(Debug)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Error {
        Error(Box::new(kind))
    }

    /// Return the specific type of error
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Consume self and return the specific type of error
    #[must_use]
    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// Returns the byte offset that the error occurs (if available)
    pub fn position(&self) -> Option<u64> {
        match *self.0 {
            ErrorKind::Format(ref err) => Some(err.position()),
            _ => None,
        }
    }

    /// The data is structurally invalid
    pub fn is_format(&self) -> bool {
        matches!(*self.0, ErrorKind::Format(_))
    }

    /// The caller misused the API
    pub fn is_usage(&self) -> bool {
        matches!(*self.0, ErrorKind::Usage(_))
    }

    /// A content file requires a master that is not loaded before it
    pub fn is_dependency(&self) -> bool {
        matches!(*self.0, ErrorKind::Dependency(_))
    }
}

/// Specific type of error
#[derive(Debug)]
pub enum ErrorKind {
    /// An underlying error from a reader or writer
    Io(std::io::Error),

    /// The data is corrupted: fatal for the file being read
    Format(FormatError),

    /// A programming defect in the caller
    Usage(UsageError),

    /// Load order is missing a master file
    Dependency(DependencyError),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self.0 {
            ErrorKind::Io(ref err) => Some(err),
            ErrorKind::Format(ref err) => Some(err),
            ErrorKind::Usage(ref err) => Some(err),
            ErrorKind::Dependency(ref err) => Some(err),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self.0 {
            ErrorKind::Io(ref err) => write!(f, "io error: {}", err),
            ErrorKind::Format(ref err) => write!(f, "format error: {}", err),
            ErrorKind::Usage(ref err) => write!(f, "usage error: {}", err),
            ErrorKind::Dependency(ref err) => write!(f, "dependency error: {}", err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::new(ErrorKind::Io(error))
    }
}

impl From<FormatError> for Error {
    fn from(error: FormatError) -> Self {
        Error::new(ErrorKind::Format(error))
    }
}

impl From<UsageError> for Error {
    fn from(error: UsageError) -> Self {
        Error::new(ErrorKind::Usage(error))
    }
}

impl From<DependencyError> for Error {
    fn from(error: DependencyError) -> Self {
        Error::new(ErrorKind::Dependency(error))
    }
}

/// A structural violation of the record format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatError {
    position: u64,
    kind: FormatErrorKind,
}

impl FormatError {
    pub(crate) fn new(kind: FormatErrorKind, position: u64) -> Self {
        FormatError { position, kind }
    }

    /// Return the byte position where the error occurred
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Return a reference the error kind
    pub fn kind(&self) -> &FormatErrorKind {
        &self.kind
    }
}

/// The specific structural violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatErrorKind {
    /// The data ended before a declared length was satisfied
    Eof,

    /// Bytes remain in the file but are too few for a record header
    TruncatedRecordHeader { remaining: u64 },

    /// Bytes remain in the record but are too few for a subrecord header
    TruncatedSubrecordHeader { remaining: u32 },

    /// A record declares more bytes than the file has left
    RecordOverrun { declared: u32, remaining: u64 },

    /// A subrecord declares more bytes than its record has left
    SubrecordOverrun {
        tag: Name,
        declared: u32,
        remaining: u32,
    },

    /// A field read asks for more bytes than its subrecord has left
    FieldOverrun {
        tag: Name,
        requested: usize,
        remaining: u32,
    },

    /// A required subrecord had a different tag
    UnexpectedSubrecord { expected: Name, found: Name },

    /// A required subrecord was absent at the end of its record
    MissingSubrecord { expected: Name },

    /// A fixed-size subrecord had the wrong length
    SubrecordSizeMismatch {
        tag: Name,
        expected: usize,
        found: u32,
    },

    /// The first record is not a well formed file header
    MissingFileHeader { found: Name },

    /// A written subrecord disagrees with its declared length
    LengthMismatch {
        tag: Name,
        declared: u32,
        written: usize,
    },

    /// A written record or subrecord does not fit in a 32 bit length
    RecordTooLarge { tag: Name, len: usize },
}

impl std::error::Error for FormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            FormatErrorKind::Eof => write!(f, "unexpected end of file"),
            FormatErrorKind::TruncatedRecordHeader { remaining } => write!(
                f,
                "truncated record header ({} bytes remaining)",
                remaining
            ),
            FormatErrorKind::TruncatedSubrecordHeader { remaining } => write!(
                f,
                "truncated subrecord header ({} bytes remaining in record)",
                remaining
            ),
            FormatErrorKind::RecordOverrun {
                declared,
                remaining,
            } => write!(
                f,
                "record declares {} bytes but only {} remain in file",
                declared, remaining
            ),
            FormatErrorKind::SubrecordOverrun {
                tag,
                declared,
                remaining,
            } => write!(
                f,
                "subrecord {} declares {} bytes but only {} remain in record",
                tag, declared, remaining
            ),
            FormatErrorKind::FieldOverrun {
                tag,
                requested,
                remaining,
            } => write!(
                f,
                "field of {} bytes overruns subrecord {} ({} bytes remaining)",
                requested, tag, remaining
            ),
            FormatErrorKind::UnexpectedSubrecord { expected, found } => {
                write!(f, "expected subrecord {} but found {}", expected, found)
            }
            FormatErrorKind::MissingSubrecord { expected } => {
                write!(f, "record ended before subrecord {}", expected)
            }
            FormatErrorKind::SubrecordSizeMismatch {
                tag,
                expected,
                found,
            } => write!(
                f,
                "subrecord {} has size {} but {} was expected",
                tag, found, expected
            ),
            FormatErrorKind::MissingFileHeader { found } => {
                write!(f, "expected file header record but found {}", found)
            }
            FormatErrorKind::LengthMismatch {
                tag,
                declared,
                written,
            } => write!(
                f,
                "subrecord {} declared {} bytes but {} were written",
                tag, declared, written
            ),
            FormatErrorKind::RecordTooLarge { tag, len } => {
                write!(f, "{} is too large to encode ({} bytes)", tag, len)
            }
        }?;

        write!(f, " at position: {}", self.position)
    }
}

/// Misuse of the reader or writer API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// The operation is not valid in the reader's current state
    InvalidState {
        operation: &'static str,
        state: ReaderState,
    },

    /// The next subrecord was requested while payload bytes remain unread
    UnconsumedSubrecord { tag: Name, remaining: u32 },

    /// A record was closed or written to without being opened
    NoOpenRecord,

    /// A record was opened while another is still open
    RecordAlreadyOpen { tag: Name },

    /// A field was written outside of a subrecord
    NoOpenSubrecord,

    /// A subrecord was opened or a record was closed while a subrecord is open
    SubrecordAlreadyOpen { tag: Name },

    /// A context was restored onto a reader for a different file
    ForeignContext { expected: String, found: String },

    /// The file header must be the first record written
    HeaderAfterRecords,
}

impl std::error::Error for UsageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UsageError::InvalidState { operation, state } => {
                write!(f, "{} is not valid while {}", operation, state)
            }
            UsageError::UnconsumedSubrecord { tag, remaining } => write!(
                f,
                "subrecord {} still has {} unread bytes",
                tag, remaining
            ),
            UsageError::NoOpenRecord => write!(f, "no record is open"),
            UsageError::RecordAlreadyOpen { tag } => write!(f, "record {} is already open", tag),
            UsageError::NoOpenSubrecord => write!(f, "no subrecord is open"),
            UsageError::SubrecordAlreadyOpen { tag } => {
                write!(f, "subrecord {} is still open", tag)
            }
            UsageError::ForeignContext { expected, found } => write!(
                f,
                "context belongs to {} but reader is reading {}",
                found, expected
            ),
            UsageError::HeaderAfterRecords => {
                write!(f, "file header must be written before any record")
            }
        }
    }
}

/// A content file declares a master that does not precede it in load order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyError {
    file: String,
    master: String,
}

impl DependencyError {
    pub(crate) fn new(file: String, master: String) -> Self {
        DependencyError { file, master }
    }

    /// The content file that declared the dependency
    pub fn file(&self) -> &str {
        &self.file
    }

    /// The missing master
    pub fn master(&self) -> &str {
        &self.master
    }
}

impl std::error::Error for DependencyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl fmt::Display for DependencyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} requires {} which is not loaded before it",
            self.file, self.master
        )
    }
}
