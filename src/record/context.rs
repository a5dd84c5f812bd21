use crate::{Name, RecordFlags};
use std::fmt;

/// Where a [RecordReader](crate::RecordReader) is within the record stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "derive", derive(serde::Serialize, serde::Deserialize))]
pub enum ReaderState {
    /// The next read is a record header (or end of file)
    BetweenRecords,

    /// A record header has been read and subrecords are pending
    InRecord,

    /// A subrecord header has been read and its payload is pending
    InSubrecord,
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderState::BetweenRecords => write!(f, "between records"),
            ReaderState::InRecord => write!(f, "in a record"),
            ReaderState::InSubrecord => write!(f, "in a subrecord"),
        }
    }
}

/// A snapshot of a reader's position and accounting state.
///
/// A context is plain data: it carries no file handle. Save one with
/// [save_context](crate::RecordReader::save_context) before jumping elsewhere
/// in a file (eg: to resolve a reference) and hand it back to
/// [restore_context](crate::RecordReader::restore_context) on the same reader
/// to continue as if nothing happened.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "derive", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadContext {
    pub(crate) file_name: String,

    // When working with multiple content files the overlay records which
    // files contribute to a piece of content, so the context keeps the index
    // of its file and of every earlier file it may reference.
    pub(crate) index: usize,
    pub(crate) parent_file_indices: Vec<usize>,

    pub(crate) rec_len: u32,
    pub(crate) left_rec: u32,
    pub(crate) left_sub: u32,
    pub(crate) left_file: u64,
    pub(crate) rec_name: Name,
    pub(crate) rec_flags: RecordFlags,
    pub(crate) sub_name: Name,

    // True if sub_name has been read but not used
    pub(crate) sub_cached: bool,
    pub(crate) state: ReaderState,

    // Only meaningful for saved contexts, not updated by the live reader
    pub(crate) file_pos: u64,
}

impl ReadContext {
    pub(crate) fn new(file_name: String, index: usize, left_file: u64) -> Self {
        ReadContext {
            file_name,
            index,
            parent_file_indices: Vec::new(),
            rec_len: 0,
            left_rec: 0,
            left_sub: 0,
            left_file,
            rec_name: Name::empty(),
            rec_flags: RecordFlags::NONE,
            sub_name: Name::empty(),
            sub_cached: false,
            state: ReaderState::BetweenRecords,
            file_pos: 0,
        }
    }

    /// Name of the file the context was taken from
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Load order index of the file
    pub fn index(&self) -> usize {
        self.index
    }

    /// Load order indices of the earlier files this file may reference
    pub fn parent_file_indices(&self) -> &[usize] {
        &self.parent_file_indices
    }

    /// Bytes left in the current record
    pub fn left_rec(&self) -> u32 {
        self.left_rec
    }

    /// Bytes left in the current subrecord
    pub fn left_sub(&self) -> u32 {
        self.left_sub
    }

    /// Bytes left in the file after the current record
    pub fn left_file(&self) -> u64 {
        self.left_file
    }

    /// Tag of the most recently read record
    pub fn rec_name(&self) -> Name {
        self.rec_name
    }

    /// Flags of the most recently read record
    pub fn rec_flags(&self) -> RecordFlags {
        self.rec_flags
    }

    /// Tag of the most recently read (or peeked) subrecord
    pub fn sub_name(&self) -> Name {
        self.sub_name
    }

    /// True if a subrecord tag has been peeked but not consumed
    pub fn sub_cached(&self) -> bool {
        self.sub_cached
    }

    /// State of the reader when the context was taken
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Byte offset of the next unread byte when the context was saved. Zero
    /// for the live context borrowed from a reader.
    pub fn file_pos(&self) -> u64 {
        self.file_pos
    }
}

/// A lightweight bookmark of a record boundary.
///
/// Unlike a [ReadContext], a position can only point at the start of a
/// record, which makes it cheap enough to keep one for every record of a
/// file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "derive", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordPosition {
    /// Byte offset of the record header
    pub offset: u64,

    /// Bytes left in the file from `offset`
    pub left_file: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_between_records() {
        let ctx = ReadContext::new(String::from("base.dat"), 2, 100);
        assert_eq!(ctx.state(), ReaderState::BetweenRecords);
        assert_eq!(ctx.index(), 2);
        assert_eq!(ctx.left_file(), 100);
        assert!(ctx.parent_file_indices().is_empty());
        assert!(!ctx.sub_cached());
    }
}
