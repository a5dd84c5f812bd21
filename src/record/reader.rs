use super::{FileHeader, ReadContext, ReaderState, RecordHeader, RecordPosition, SubrecordHeader};
use crate::{
    buffer::{BufferWindow, BufferWindowBuilder},
    errors::{FormatError, FormatErrorKind, UsageError},
    util::le_u32,
    Encoding, Error, FixedString, Name, RecordFlags, Windows1252Encoding,
};
use std::{
    fs::File,
    io::{Cursor, Read, Seek, SeekFrom},
    path::Path,
};

/// Walks one content file as a sequence of records and nested subrecords.
///
/// The reader is a cursor with three states (see [ReaderState]):
///
/// - [next_record_header](Self::next_record_header) moves from between
///   records into a record
/// - [next_subrecord_header](Self::next_subrecord_header) moves into a
///   subrecord, or back between records once the record is exhausted
/// - [read_field](Self::read_field) and the typed `get_*` methods consume the
///   payload of the current subrecord
///
/// Every declared length is enforced: a subrecord can not claim more bytes
/// than its record has left and a field read can not cross the end of its
/// subrecord.
///
/// ```rust
/// use esmcodec::{FileHeader, Name, RecordFlags, RecordReader, RecordWriter};
///
/// let mut writer = RecordWriter::new(Vec::new());
/// writer.write_file_header(&FileHeader::default())?;
/// writer.start_record(Name::new(*b"NPC_"), RecordFlags::NONE)?;
/// writer.write_hn_cstring(Name::new(*b"NAME"), "guard01")?;
/// writer.write_subrecord(Name::new(*b"NPDT"), &12u32.to_le_bytes())?;
/// writer.end_record()?;
/// let data = writer.into_inner();
///
/// let mut reader = RecordReader::from_slice("base.esm", &data)?;
/// let record = reader.next_record_header()?.unwrap();
/// assert_eq!(record.tag, Name::new(*b"NPC_"));
/// assert_eq!(reader.get_hn_string(Name::new(*b"NAME"))?, "guard01");
/// assert_eq!(reader.get_hn_u32(Name::new(*b"NPDT"))?, 12);
/// assert!(reader.next_subrecord_header()?.is_none());
/// assert!(reader.next_record_header()?.is_none());
/// # Ok::<(), esmcodec::Error>(())
/// ```
///
/// A reader is an exclusive cursor over one open file and is not meant to be
/// shared between threads while reading. Saved [ReadContext] values are plain
/// data and can be sent anywhere.
#[derive(Debug)]
pub struct RecordReader<R, E = Windows1252Encoding> {
    reader: R,
    buf: BufferWindow,
    ctx: ReadContext,
    header: FileHeader,
    encoding: E,
    data_start: RecordPosition,
    file_size: u64,
}

impl RecordReader<()> {
    /// Initializes a default [RecordReaderBuilder]
    pub fn builder() -> RecordReaderBuilder {
        RecordReaderBuilder::default()
    }

    /// Open a content file from the file system with the default settings
    pub fn open<P: AsRef<Path>>(path: P) -> Result<RecordReader<File>, Error> {
        RecordReader::builder().open(path)
    }

    /// Read a content file that is already in memory
    pub fn from_slice(
        name: impl Into<String>,
        data: &[u8],
    ) -> Result<RecordReader<Cursor<&[u8]>>, Error> {
        RecordReader::builder().from_slice(name, data)
    }
}

impl<R, E> RecordReader<R, E>
where
    R: Read + Seek,
    E: Encoding,
{
    /// Read the header of the next record.
    ///
    /// Returns `None` once the end of the file is reached. Only valid between
    /// records.
    pub fn next_record_header(&mut self) -> Result<Option<RecordHeader>, Error> {
        if self.ctx.state != ReaderState::BetweenRecords {
            return Err(self.invalid_state("next_record_header"));
        }

        if self.ctx.left_file == 0 {
            return Ok(None);
        }

        if self.ctx.left_file < RecordHeader::SIZE as u64 {
            let remaining = self.ctx.left_file;
            return Err(self.format_error(FormatErrorKind::TruncatedRecordHeader { remaining }));
        }

        let data = self.take_array::<{ RecordHeader::SIZE }>()?;
        let header = RecordHeader::new(
            Name::new([data[0], data[1], data[2], data[3]]),
            le_u32(&data[4..]),
            RecordFlags::from_bits(le_u32(&data[8..])),
        );
        self.ctx.left_file -= RecordHeader::SIZE as u64;

        if u64::from(header.len) > self.ctx.left_file {
            let kind = FormatErrorKind::RecordOverrun {
                declared: header.len,
                remaining: self.ctx.left_file,
            };
            return Err(self.format_error(kind));
        }

        self.ctx.left_file -= u64::from(header.len);
        self.ctx.left_rec = header.len;
        self.ctx.rec_len = header.len;
        self.ctx.left_sub = 0;
        self.ctx.rec_name = header.tag;
        self.ctx.rec_flags = header.flags;
        self.ctx.sub_cached = false;
        self.ctx.state = ReaderState::InRecord;
        Ok(Some(header))
    }

    /// Read the header of the next subrecord.
    ///
    /// When the record has been fully consumed, the reader moves back between
    /// records and `None` is returned. A tag cached by
    /// [peek_subrecord_tag](Self::peek_subrecord_tag) is reused rather than
    /// read again.
    pub fn next_subrecord_header(&mut self) -> Result<Option<SubrecordHeader>, Error> {
        self.check_subrecord_boundary("next_subrecord_header")?;

        let tag = if self.ctx.sub_cached {
            self.ctx.sub_cached = false;
            self.ctx.sub_name
        } else if self.ctx.left_rec == 0 {
            self.ctx.left_sub = 0;
            self.ctx.state = ReaderState::BetweenRecords;
            return Ok(None);
        } else {
            self.read_subrecord_tag()?
        };

        if (self.ctx.left_rec as usize) < SubrecordHeader::SIZE - SubrecordHeader::TAG_SIZE {
            let remaining = self.ctx.left_rec;
            return Err(self.format_error(FormatErrorKind::TruncatedSubrecordHeader { remaining }));
        }

        let len = u32::from_le_bytes(self.take_array::<4>()?);
        self.ctx.left_rec -= 4;

        if len > self.ctx.left_rec {
            let kind = FormatErrorKind::SubrecordOverrun {
                tag,
                declared: len,
                remaining: self.ctx.left_rec,
            };
            return Err(self.format_error(kind));
        }

        self.ctx.sub_name = tag;
        self.ctx.left_sub = len;
        self.ctx.state = ReaderState::InSubrecord;
        Ok(Some(SubrecordHeader::new(tag, len)))
    }

    /// Read the tag of the next subrecord without consuming its header.
    ///
    /// The tag is cached so that a following
    /// [next_subrecord_header](Self::next_subrecord_header) does not advance
    /// the read head a second time. Peeking repeatedly returns the same tag.
    /// Returns `None` when the record has no more subrecords.
    pub fn peek_subrecord_tag(&mut self) -> Result<Option<Name>, Error> {
        self.check_subrecord_boundary("peek_subrecord_tag")?;
        if self.ctx.sub_cached {
            return Ok(Some(self.ctx.sub_name));
        }

        if self.ctx.left_rec == 0 {
            return Ok(None);
        }

        let tag = self.read_subrecord_tag()?;
        self.ctx.sub_name = tag;
        self.ctx.sub_cached = true;
        Ok(Some(tag))
    }

    /// Returns true if the next subrecord has the given tag. The tag remains
    /// cached when it does not match.
    pub fn is_next_subrecord(&mut self, tag: Name) -> Result<bool, Error> {
        Ok(self.peek_subrecord_tag()? == Some(tag))
    }

    /// Returns true if the current record has subrecords left to read
    pub fn has_more_subrecords(&self) -> bool {
        self.ctx.state != ReaderState::BetweenRecords
            && (self.ctx.sub_cached || self.ctx.left_rec > 0)
    }

    /// Read the next subrecord header and require it to have the given tag
    pub fn expect_subrecord(&mut self, tag: Name) -> Result<SubrecordHeader, Error> {
        match self.next_subrecord_header()? {
            Some(sub) if sub.tag == tag => Ok(sub),
            Some(sub) => Err(self.format_error(FormatErrorKind::UnexpectedSubrecord {
                expected: tag,
                found: sub.tag,
            })),
            None => Err(self.format_error(FormatErrorKind::MissingSubrecord { expected: tag })),
        }
    }

    /// Consume exactly `width` bytes of the current subrecord's payload
    pub fn read_field(&mut self, width: usize) -> Result<&[u8], Error> {
        self.prepare_field(width)?;
        Ok(self.buf.split(width))
    }

    /// Read a fixed size field
    pub fn get_array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let data = self.read_field(N)?;
        let mut result = [0u8; N];
        result.copy_from_slice(data);
        Ok(result)
    }

    pub fn get_u8(&mut self) -> Result<u8, Error> {
        let [x] = self.get_array::<1>()?;
        Ok(x)
    }

    pub fn get_u16(&mut self) -> Result<u16, Error> {
        self.get_array().map(u16::from_le_bytes)
    }

    pub fn get_u32(&mut self) -> Result<u32, Error> {
        self.get_array().map(u32::from_le_bytes)
    }

    pub fn get_i32(&mut self) -> Result<i32, Error> {
        self.get_array().map(i32::from_le_bytes)
    }

    pub fn get_u64(&mut self) -> Result<u64, Error> {
        self.get_array().map(u64::from_le_bytes)
    }

    pub fn get_f32(&mut self) -> Result<f32, Error> {
        self.get_array().map(f32::from_le_bytes)
    }

    /// Read a fixed width string field of `N` bytes
    pub fn get_fixed<const N: usize>(&mut self) -> Result<FixedString<N>, Error> {
        self.get_array::<N>().map(FixedString::new_raw)
    }

    /// Read `len` bytes of text, decoded up to the first NUL
    pub fn get_string(&mut self, len: usize) -> Result<String, Error> {
        self.prepare_field(len)?;
        let data = self.buf.split(len);
        Ok(self.encoding.decode(data).into_owned())
    }

    /// Read the rest of the current subrecord as text
    pub fn get_remaining_string(&mut self) -> Result<String, Error> {
        if self.ctx.state != ReaderState::InSubrecord {
            return Err(self.invalid_state("get_remaining_string"));
        }

        self.get_string(self.ctx.left_sub as usize)
    }

    /// Read a subrecord with the given tag and return its payload as text
    pub fn get_hn_string(&mut self, tag: Name) -> Result<String, Error> {
        self.expect_subrecord(tag)?;
        self.get_remaining_string()
    }

    /// Like [get_hn_string](Self::get_hn_string) but returns `None` if the
    /// next subrecord has a different tag (or there is none)
    pub fn get_hno_string(&mut self, tag: Name) -> Result<Option<String>, Error> {
        if self.is_next_subrecord(tag)? {
            self.get_hn_string(tag).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Read a subrecord with the given tag that must be exactly `N` bytes
    pub fn get_hn_exact<const N: usize>(&mut self, tag: Name) -> Result<[u8; N], Error> {
        let sub = self.expect_subrecord(tag)?;
        if sub.len as usize != N {
            return Err(self.format_error(FormatErrorKind::SubrecordSizeMismatch {
                tag,
                expected: N,
                found: sub.len,
            }));
        }

        self.get_array::<N>()
    }

    /// Read a four byte subrecord with the given tag as a u32
    pub fn get_hn_u32(&mut self, tag: Name) -> Result<u32, Error> {
        self.get_hn_exact::<4>(tag).map(u32::from_le_bytes)
    }

    /// Discard the rest of the current subrecord
    ///
    /// Used to step over subrecords the caller does not recognize.
    pub fn skip_subrecord(&mut self) -> Result<(), Error> {
        if self.ctx.state != ReaderState::InSubrecord {
            return Err(self.invalid_state("skip_subrecord"));
        }

        let left = self.ctx.left_sub;
        self.skip_bytes(u64::from(left))?;
        self.ctx.left_rec -= left;
        self.ctx.left_sub = 0;
        self.ctx.state = ReaderState::InRecord;
        Ok(())
    }

    /// Skip the next subrecord if it has the given tag. Returns if a
    /// subrecord was skipped.
    pub fn skip_optional(&mut self, tag: Name) -> Result<bool, Error> {
        if !self.is_next_subrecord(tag)? {
            return Ok(false);
        }

        self.next_subrecord_header()?;
        self.skip_subrecord()?;
        Ok(true)
    }

    /// Discard the rest of the current record
    pub fn skip_record(&mut self) -> Result<(), Error> {
        if self.ctx.state == ReaderState::BetweenRecords {
            return Err(self.invalid_state("skip_record"));
        }

        self.skip_bytes(u64::from(self.ctx.left_rec))?;
        self.ctx.left_rec = 0;
        self.ctx.left_sub = 0;
        self.ctx.sub_cached = false;
        self.ctx.state = ReaderState::BetweenRecords;
        Ok(())
    }

    /// Capture the reader's position and accounting state
    pub fn save_context(&self) -> ReadContext {
        let mut ctx = self.ctx.clone();
        ctx.file_pos = self.buf.position();
        ctx
    }

    /// Continue reading from a previously saved context.
    ///
    /// The underlying reader is repositioned to the saved offset, after which
    /// the reader is indistinguishable from when the context was saved. The
    /// context must come from this reader's file.
    pub fn restore_context(&mut self, ctx: &ReadContext) -> Result<(), Error> {
        if ctx.file_name != self.ctx.file_name || ctx.index != self.ctx.index {
            return Err(UsageError::ForeignContext {
                expected: self.ctx.file_name.clone(),
                found: ctx.file_name.clone(),
            }
            .into());
        }

        self.seek_to(ctx.file_pos)?;
        self.ctx.clone_from(ctx);
        self.ctx.file_pos = 0;
        Ok(())
    }

    /// A bookmark of the current record boundary. Only valid between records.
    pub fn record_position(&self) -> Result<RecordPosition, Error> {
        if self.ctx.state != ReaderState::BetweenRecords {
            return Err(self.invalid_state("record_position"));
        }

        Ok(RecordPosition {
            offset: self.buf.position(),
            left_file: self.ctx.left_file,
        })
    }

    /// Jump to a record boundary previously returned by
    /// [record_position](Self::record_position) on this reader
    pub fn seek_record(&mut self, position: RecordPosition) -> Result<(), Error> {
        self.seek_to(position.offset)?;
        self.ctx.left_file = position.left_file;
        self.ctx.left_rec = 0;
        self.ctx.rec_len = 0;
        self.ctx.left_sub = 0;
        self.ctx.sub_cached = false;
        self.ctx.state = ReaderState::BetweenRecords;
        Ok(())
    }

    /// Jump back to the first record after the file header
    pub fn rewind(&mut self) -> Result<(), Error> {
        self.seek_record(self.data_start)
    }

    fn seek_to(&mut self, position: u64) -> Result<(), Error> {
        self.reader.seek(SeekFrom::Start(position))?;
        self.buf.reset(position);
        Ok(())
    }

    fn check_subrecord_boundary(&self, operation: &'static str) -> Result<(), Error> {
        match self.ctx.state {
            ReaderState::InRecord => Ok(()),
            ReaderState::InSubrecord if self.ctx.left_sub == 0 => Ok(()),
            ReaderState::InSubrecord => Err(UsageError::UnconsumedSubrecord {
                tag: self.ctx.sub_name,
                remaining: self.ctx.left_sub,
            }
            .into()),
            ReaderState::BetweenRecords => Err(self.invalid_state(operation)),
        }
    }

    fn read_subrecord_tag(&mut self) -> Result<Name, Error> {
        if (self.ctx.left_rec as usize) < SubrecordHeader::SIZE {
            let remaining = self.ctx.left_rec;
            return Err(self.format_error(FormatErrorKind::TruncatedSubrecordHeader { remaining }));
        }

        let tag = Name::new(self.take_array::<4>()?);
        self.ctx.left_rec -= SubrecordHeader::TAG_SIZE as u32;
        Ok(tag)
    }

    fn prepare_field(&mut self, width: usize) -> Result<(), Error> {
        if self.ctx.state != ReaderState::InSubrecord {
            return Err(self.invalid_state("read_field"));
        }

        if width > self.ctx.left_sub as usize {
            let kind = FormatErrorKind::FieldOverrun {
                tag: self.ctx.sub_name,
                requested: width,
                remaining: self.ctx.left_sub,
            };
            return Err(self.format_error(kind));
        }

        self.fill_to(width)?;
        self.ctx.left_sub -= width as u32;
        self.ctx.left_rec -= width as u32;
        Ok(())
    }

    fn fill_to(&mut self, len: usize) -> Result<(), Error> {
        self.buf.reserve(len);
        while self.buf.window_len() < len {
            match self.buf.fill_buf(&mut self.reader) {
                Ok(0) => return Err(self.format_error(FormatErrorKind::Eof)),
                Ok(_) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        self.fill_to(N)?;
        let mut result = [0u8; N];
        result.copy_from_slice(self.buf.split(N));
        Ok(result)
    }

    fn skip_bytes(&mut self, len: u64) -> Result<(), Error> {
        let window = self.buf.window_len() as u64;
        if len <= window {
            self.buf.advance(len as usize);
            return Ok(());
        }

        let target = self.buf.position() + len;
        self.seek_to(target)
    }
}

impl<R, E> RecordReader<R, E> {
    /// The name the reader was opened with (usually a file path)
    pub fn name(&self) -> &str {
        &self.ctx.file_name
    }

    /// The parsed file header
    pub fn file_header(&self) -> &FileHeader {
        &self.header
    }

    /// Total size of the underlying file in bytes
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Returns the byte position of the next unread byte
    pub fn position(&self) -> u64 {
        self.buf.position()
    }

    /// Current state of the reader
    pub fn state(&self) -> ReaderState {
        self.ctx.state
    }

    /// The live context of the reader.
    ///
    /// The byte offset is only captured by [save_context](Self::save_context),
    /// so [ReadContext::file_pos] of the live context is always zero. Use
    /// [position](Self::position) for the current offset.
    pub fn context(&self) -> &ReadContext {
        &self.ctx
    }

    /// The header of the record being read, if any
    pub fn record_header(&self) -> Option<RecordHeader> {
        match self.ctx.state {
            ReaderState::BetweenRecords => None,
            _ => Some(RecordHeader::new(
                self.ctx.rec_name,
                self.ctx.rec_len,
                self.ctx.rec_flags,
            )),
        }
    }

    /// The load order index assigned to this file
    pub fn current_file_index(&self) -> usize {
        self.ctx.index
    }

    /// Load order indices of the earlier files this file may reference
    pub fn parent_file_indices(&self) -> &[usize] {
        &self.ctx.parent_file_indices
    }

    /// The text encoding used for string fields
    pub fn encoding(&self) -> &E {
        &self.encoding
    }

    /// Consume the reader and return the internal buffer and reader. This
    /// allows the buffer to be reused.
    pub fn into_parts(self) -> (Box<[u8]>, R) {
        (self.buf.buf, self.reader)
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.ctx.index = index;
    }

    pub(crate) fn set_parent_file_indices(&mut self, indices: Vec<usize>) {
        self.ctx.parent_file_indices = indices;
    }

    #[cold]
    #[inline(never)]
    fn format_error(&self, kind: FormatErrorKind) -> Error {
        FormatError::new(kind, self.buf.position()).into()
    }

    #[cold]
    #[inline(never)]
    fn invalid_state(&self, operation: &'static str) -> Error {
        UsageError::InvalidState {
            operation,
            state: self.ctx.state,
        }
        .into()
    }
}

/// Creates a record reader
#[derive(Debug)]
pub struct RecordReaderBuilder<E = Windows1252Encoding> {
    buffer: BufferWindowBuilder,
    index: usize,
    encoding: E,
}

impl Default for RecordReaderBuilder {
    fn default() -> Self {
        RecordReaderBuilder {
            buffer: BufferWindowBuilder::default(),
            index: 0,
            encoding: Windows1252Encoding::new(),
        }
    }
}

impl<E> RecordReaderBuilder<E> {
    /// Set the initial buffer to the given buffer
    ///
    /// See [buffer_len](Self::buffer_len) for more information
    #[inline]
    pub fn buffer(mut self, val: Box<[u8]>) -> Self {
        self.buffer = self.buffer.buffer(val);
        self
    }

    /// Set the length of the buffer if no buffer is provided
    ///
    /// The buffer grows when a single field is larger than it, so this only
    /// tunes how much is read from the underlying reader at a time.
    #[inline]
    pub fn buffer_len(mut self, val: usize) -> Self {
        self.buffer = self.buffer.buffer_len(val);
        self
    }

    /// Set the load order index of the file
    #[inline]
    pub fn index(mut self, val: usize) -> Self {
        self.index = val;
        self
    }

    /// Set the text encoding used for string fields
    #[inline]
    pub fn encoding<E2>(self, encoding: E2) -> RecordReaderBuilder<E2> {
        RecordReaderBuilder {
            buffer: self.buffer,
            index: self.index,
            encoding,
        }
    }
}

impl<E: Encoding> RecordReaderBuilder<E> {
    /// Create a record reader around a given reader and parse the file
    /// header. The stream's current position is taken as the start of the
    /// file.
    pub fn build<R>(self, name: impl Into<String>, mut reader: R) -> Result<RecordReader<R, E>, Error>
    where
        R: Read + Seek,
    {
        let start = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(start))?;

        let mut buf = self.buffer.build();
        buf.reset(start);

        let left_file = end.saturating_sub(start);
        let mut result = RecordReader {
            reader,
            buf,
            ctx: ReadContext::new(name.into(), self.index, left_file),
            header: FileHeader::default(),
            encoding: self.encoding,
            data_start: RecordPosition {
                offset: start,
                left_file,
            },
            file_size: left_file,
        };

        result.header = FileHeader::read(&mut result)?;
        result.data_start = result.record_position()?;

        log::debug!(
            "opened {} (version: {}, masters: {}, records: {})",
            result.name(),
            result.header.version,
            result.header.masters.len(),
            result.header.record_count
        );

        Ok(result)
    }

    /// Open a content file from the file system
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<RecordReader<File, E>, Error> {
        let path = path.as_ref();
        let file = File::open(path)?;
        self.build(path.to_string_lossy(), file)
    }

    /// Read a content file that is already in memory
    pub fn from_slice(
        self,
        name: impl Into<String>,
        data: &[u8],
    ) -> Result<RecordReader<Cursor<&[u8]>, E>, Error> {
        self.build(name, Cursor::new(data))
    }
}
