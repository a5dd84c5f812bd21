use crate::{util::nul_terminated_len, Error, Name, RecordHeader, RecordReader};
use std::fmt;
use std::io::{Read, Seek};

/// Identity of a record across files: its type tag plus a record specific id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "derive", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordKey {
    /// The record type
    pub tag: Name,

    /// The id bytes, as the key extractor produced them
    pub id: Vec<u8>,
}

impl RecordKey {
    /// Creates a key
    ///
    /// ```
    /// use esmcodec::{Name, RecordKey};
    /// let key = RecordKey::new(Name::new(*b"NPC_"), "guard01");
    /// assert_eq!(key.to_string(), "NPC_:guard01");
    /// ```
    pub fn new(tag: Name, id: impl Into<Vec<u8>>) -> Self {
        RecordKey { tag, id: id.into() }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tag, String::from_utf8_lossy(&self.id))
    }
}

/// Derives the identity of a record so that records from different files can
/// be matched up.
///
/// The reader is positioned just after the record header. An extractor may
/// read as many subrecords as it needs; the overlay skips whatever is left.
/// Returning `None` marks a record without identity, which is never
/// overridden.
///
/// Functions and closures with the matching signature implement this trait:
///
/// ```rust
/// use esmcodec::{Error, KeyExtractor, RecordHeader, RecordKey, RecordReader, Windows1252Encoding};
/// use std::io::Cursor;
///
/// // every record of a type is a singleton
/// fn by_tag<R, E>(
///     header: &RecordHeader,
///     _reader: &mut RecordReader<R, E>,
/// ) -> Result<Option<RecordKey>, Error> {
///     Ok(Some(RecordKey::new(header.tag, Vec::new())))
/// }
///
/// fn assert_extractor<K>(_: &K)
/// where
///     K: KeyExtractor<Cursor<&'static [u8]>, Windows1252Encoding>,
/// {
/// }
///
/// assert_extractor(&by_tag::<Cursor<&'static [u8]>, Windows1252Encoding>);
/// ```
pub trait KeyExtractor<R, E> {
    /// Compute the key of the record that was just entered
    fn extract(
        &mut self,
        header: &RecordHeader,
        reader: &mut RecordReader<R, E>,
    ) -> Result<Option<RecordKey>, Error>;
}

impl<R, E, F> KeyExtractor<R, E> for F
where
    F: FnMut(&RecordHeader, &mut RecordReader<R, E>) -> Result<Option<RecordKey>, Error>,
{
    fn extract(
        &mut self,
        header: &RecordHeader,
        reader: &mut RecordReader<R, E>,
    ) -> Result<Option<RecordKey>, Error> {
        self(header, reader)
    }
}

/// Keys records by the payload of one of their subrecords
///
/// By default the `NAME` subrecord is used and ascii letters are folded to
/// lowercase, as record ids compare case insensitively. Records lacking the
/// subrecord have no key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdSubrecord {
    tag: Name,
    fold_case: bool,
}

impl Default for IdSubrecord {
    fn default() -> Self {
        IdSubrecord {
            tag: Self::NAME,
            fold_case: true,
        }
    }
}

impl IdSubrecord {
    /// The conventional id subrecord
    pub const NAME: Name = Name::new(*b"NAME");

    /// Key records by the `NAME` subrecord
    pub fn new() -> Self {
        Self::default()
    }

    /// Key records by a different subrecord
    pub fn tag(mut self, tag: Name) -> Self {
        self.tag = tag;
        self
    }

    /// Set whether ids are compared ignoring ascii case
    pub fn fold_case(mut self, fold_case: bool) -> Self {
        self.fold_case = fold_case;
        self
    }
}

impl<R, E> KeyExtractor<R, E> for IdSubrecord
where
    R: Read + Seek,
    E: crate::Encoding,
{
    fn extract(
        &mut self,
        header: &RecordHeader,
        reader: &mut RecordReader<R, E>,
    ) -> Result<Option<RecordKey>, Error> {
        while let Some(sub) = reader.next_subrecord_header()? {
            if sub.tag != self.tag {
                reader.skip_subrecord()?;
                continue;
            }

            let data = reader.read_field(sub.len as usize)?;
            let mut id = data[..nul_terminated_len(data)].to_vec();
            if self.fold_case {
                id.make_ascii_lowercase();
            }

            return Ok(Some(RecordKey::new(header.tag, id)));
        }

        Ok(None)
    }
}
