//! Reading and writing a single content file.
//!
//! A content file is a flat sequence of records. Every record is a twelve
//! byte header followed by a payload made entirely of subrecords:
//!
//! | Part              | Layout                                         |
//! |-------------------|------------------------------------------------|
//! | record header     | tag (4 bytes), length (u32), flags (u32)       |
//! | subrecord header  | tag (4 bytes), length (u32)                    |
//! | subrecord payload | `length` bytes of fields                       |
//!
//! All integers are little endian. A record's length counts the subrecord
//! headers and payloads that follow it, so a reader can skip any record or
//! subrecord it does not understand. The first record of every file is the
//! [FileHeader].

mod context;
mod file_header;
mod header;
mod reader;
mod writer;

pub use self::context::{ReadContext, ReaderState, RecordPosition};
pub use self::file_header::{FileHeader, FileType, MasterFile, Version};
pub use self::header::{RecordFlags, RecordHeader, SubrecordHeader};
pub use self::reader::{RecordReader, RecordReaderBuilder};
pub use self::writer::{RecordWriter, RecordWriterBuilder};
