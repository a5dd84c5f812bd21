use super::{FileHeader, RecordHeader, SubrecordHeader};
use crate::{
    errors::{FormatError, FormatErrorKind, UsageError},
    Encoding, Error, FixedString, Name, RecordFlags, Windows1252Encoding,
};
use std::io::Write;

#[derive(Debug, Clone, Copy)]
struct OpenRecord {
    tag: Name,
    flags: RecordFlags,
}

#[derive(Debug, Clone, Copy)]
struct OpenSubrecord {
    tag: Name,

    // offset of the subrecord header within the record body
    start: usize,
    declared: Option<u32>,
}

/// Encodes records and subrecords
///
/// A record is buffered in memory from [start_record](Self::start_record)
/// until [end_record](Self::end_record), when its length is known and the
/// header is backpatched. The complete record is then handed to the
/// underlying writer in one `write_all`, so a failure midway through a record
/// never leaves a truncated record behind.
///
/// ```rust
/// use esmcodec::{Name, RecordFlags, RecordWriter};
///
/// let mut writer = RecordWriter::new(Vec::new());
/// writer.start_record(Name::new(*b"GLOB"), RecordFlags::NONE)?;
/// writer.write_hn_cstring(Name::new(*b"NAME"), "Day")?;
/// writer.write_hn_u32(Name::new(*b"FLTV"), 7)?;
/// writer.end_record()?;
///
/// let data = writer.into_inner();
/// assert_eq!(&data[..4], b"GLOB");
/// assert_eq!(data.len(), 12 + (8 + 4) + (8 + 4));
/// # Ok::<(), esmcodec::Error>(())
/// ```
#[derive(Debug)]
pub struct RecordWriter<W, E = Windows1252Encoding> {
    writer: W,
    encoding: E,
    body: Vec<u8>,
    record: Option<OpenRecord>,
    subrecord: Option<OpenSubrecord>,
    records_written: usize,
    header_written: bool,
    bytes_written: u64,
}

impl<W> RecordWriter<W>
where
    W: Write,
{
    /// Create a writer with the default encoding
    pub fn new(writer: W) -> Self {
        RecordWriterBuilder::new().from_writer(writer)
    }
}

impl<W, E> RecordWriter<W, E>
where
    W: Write,
    E: Encoding,
{
    /// Write the file header record. It must be the first record written.
    pub fn write_file_header(&mut self, header: &FileHeader) -> Result<(), Error> {
        if self.header_written || self.records_written > 0 || self.record.is_some() {
            return Err(UsageError::HeaderAfterRecords.into());
        }

        if let Err(e) = header.write(self) {
            self.abort_record();
            return Err(e);
        }

        self.header_written = true;
        self.records_written = 0;
        Ok(())
    }

    /// Open a record. Its length is filled in when the record is closed.
    pub fn start_record(&mut self, tag: Name, flags: RecordFlags) -> Result<(), Error> {
        if let Some(open) = self.record {
            return Err(UsageError::RecordAlreadyOpen { tag: open.tag }.into());
        }

        self.body.clear();
        self.body.extend_from_slice(&[0u8; RecordHeader::SIZE]);
        self.record = Some(OpenRecord { tag, flags });
        Ok(())
    }

    /// Open a subrecord whose length is computed when it is closed
    pub fn start_subrecord(&mut self, tag: Name) -> Result<(), Error> {
        self.open_subrecord(tag, None)
    }

    /// Open a subrecord that must contain exactly `len` bytes when closed
    pub fn start_subrecord_sized(&mut self, tag: Name, len: u32) -> Result<(), Error> {
        self.open_subrecord(tag, Some(len))
    }

    fn open_subrecord(&mut self, tag: Name, declared: Option<u32>) -> Result<(), Error> {
        if self.record.is_none() {
            return Err(UsageError::NoOpenRecord.into());
        }

        if let Some(open) = self.subrecord {
            return Err(UsageError::SubrecordAlreadyOpen { tag: open.tag }.into());
        }

        let start = self.body.len();
        let header = SubrecordHeader::new(tag, declared.unwrap_or(0));
        self.body.extend_from_slice(&header.to_bytes());
        self.subrecord = Some(OpenSubrecord {
            tag,
            start,
            declared,
        });
        Ok(())
    }

    /// Append raw bytes to the open subrecord
    pub fn write_field(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.subrecord.is_none() {
            return Err(UsageError::NoOpenSubrecord.into());
        }

        self.body.extend_from_slice(data);
        Ok(())
    }

    pub fn write_u8(&mut self, data: u8) -> Result<(), Error> {
        self.write_field(&[data])
    }

    pub fn write_u16(&mut self, data: u16) -> Result<(), Error> {
        self.write_field(&data.to_le_bytes())
    }

    pub fn write_u32(&mut self, data: u32) -> Result<(), Error> {
        self.write_field(&data.to_le_bytes())
    }

    pub fn write_i32(&mut self, data: i32) -> Result<(), Error> {
        self.write_field(&data.to_le_bytes())
    }

    pub fn write_u64(&mut self, data: u64) -> Result<(), Error> {
        self.write_field(&data.to_le_bytes())
    }

    pub fn write_f32(&mut self, data: f32) -> Result<(), Error> {
        self.write_field(&data.to_le_bytes())
    }

    /// Write all `N` bytes of a fixed width string, padding included
    pub fn write_fixed<const N: usize>(&mut self, data: &FixedString<N>) -> Result<(), Error> {
        self.write_field(data.as_bytes())
    }

    /// Encode and write text without a terminator
    pub fn write_string(&mut self, data: &str) -> Result<(), Error> {
        if self.subrecord.is_none() {
            return Err(UsageError::NoOpenSubrecord.into());
        }

        let encoded = self.encoding.encode(data);
        self.body.extend_from_slice(&encoded);
        Ok(())
    }

    /// Close the open subrecord and fill in its length.
    ///
    /// On error the subrecord is dropped from the record body, so the record
    /// stays well formed and can still be ended or aborted.
    pub fn end_subrecord(&mut self) -> Result<(), Error> {
        let open = self.subrecord.take().ok_or(UsageError::NoOpenSubrecord)?;
        let payload = self.body.len() - open.start - SubrecordHeader::SIZE;
        let result = match (u32::try_from(payload), open.declared) {
            (Err(_), _) => Err(FormatErrorKind::RecordTooLarge {
                tag: open.tag,
                len: payload,
            }),
            (Ok(len), Some(declared)) if declared != len => Err(FormatErrorKind::LengthMismatch {
                tag: open.tag,
                declared,
                written: payload,
            }),
            (Ok(_), Some(_)) => Ok(()),
            (Ok(len), None) => {
                let at = open.start + SubrecordHeader::TAG_SIZE;
                self.body[at..at + 4].copy_from_slice(&len.to_le_bytes());
                Ok(())
            }
        };

        result.map_err(|kind| {
            let err = self.format_error(kind);
            self.body.truncate(open.start);
            err
        })
    }

    /// Write a complete subrecord
    pub fn write_subrecord(&mut self, tag: Name, data: &[u8]) -> Result<(), Error> {
        let len = u32::try_from(data.len()).map_err(|_| {
            self.format_error(FormatErrorKind::RecordTooLarge {
                tag,
                len: data.len(),
            })
        })?;
        self.start_subrecord_sized(tag, len)?;
        self.write_field(data)?;
        self.end_subrecord()
    }

    /// Write a subrecord holding text without a terminator
    pub fn write_hn_string(&mut self, tag: Name, data: &str) -> Result<(), Error> {
        self.start_subrecord(tag)?;
        self.write_string(data)?;
        self.end_subrecord()
    }

    /// Write a subrecord holding NUL terminated text
    pub fn write_hn_cstring(&mut self, tag: Name, data: &str) -> Result<(), Error> {
        self.start_subrecord(tag)?;
        self.write_string(data)?;
        self.write_u8(0)?;
        self.end_subrecord()
    }

    /// Like [write_hn_string](Self::write_hn_string) but nothing is written
    /// for empty text
    pub fn write_hno_string(&mut self, tag: Name, data: &str) -> Result<(), Error> {
        if data.is_empty() {
            return Ok(());
        }

        self.write_hn_string(tag, data)
    }

    /// Write a subrecord holding a fixed width string
    pub fn write_hn_fixed<const N: usize>(
        &mut self,
        tag: Name,
        data: &FixedString<N>,
    ) -> Result<(), Error> {
        self.write_subrecord(tag, data.as_bytes())
    }

    pub fn write_hn_u32(&mut self, tag: Name, data: u32) -> Result<(), Error> {
        self.write_subrecord(tag, &data.to_le_bytes())
    }

    /// Close the open record, fill in its length, and write it out
    pub fn end_record(&mut self) -> Result<(), Error> {
        if let Some(open) = self.subrecord {
            return Err(UsageError::SubrecordAlreadyOpen { tag: open.tag }.into());
        }

        let open = self.record.ok_or(UsageError::NoOpenRecord)?;
        let payload = self.body.len() - RecordHeader::SIZE;
        let len = u32::try_from(payload).map_err(|_| {
            self.format_error(FormatErrorKind::RecordTooLarge {
                tag: open.tag,
                len: payload,
            })
        })?;

        let header = RecordHeader::new(open.tag, len, open.flags);
        self.body[..RecordHeader::SIZE].copy_from_slice(&header.to_bytes());
        self.writer.write_all(&self.body)?;
        log::trace!("wrote record {}", header);

        self.bytes_written += self.body.len() as u64;
        self.records_written += 1;
        self.record = None;
        self.body.clear();
        Ok(())
    }
}

impl<W, E> RecordWriter<W, E> {
    /// Discard the open record (and subrecord) without writing anything
    pub fn abort_record(&mut self) {
        self.record = None;
        self.subrecord = None;
        self.body.clear();
    }

    /// Number of records written, not counting the file header
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Number of bytes handed to the underlying writer
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Returns true if a record is open
    pub fn in_record(&self) -> bool {
        self.record.is_some()
    }

    /// Get inner writer, keeping ownership
    pub fn inner(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Consumes this writer, returning the underlying writer. A record that
    /// is still open is discarded.
    pub fn into_inner(self) -> W {
        self.writer
    }

    #[cold]
    #[inline(never)]
    fn format_error(&self, kind: FormatErrorKind) -> Error {
        FormatError::new(kind, self.bytes_written + self.body.len() as u64).into()
    }
}

/// Creates a record writer
#[derive(Debug, Default)]
pub struct RecordWriterBuilder<E = Windows1252Encoding> {
    encoding: E,
}

impl RecordWriterBuilder {
    /// Construct a new RecordWriterBuilder with default values
    pub fn new() -> RecordWriterBuilder {
        RecordWriterBuilder::default()
    }
}

impl<E> RecordWriterBuilder<E> {
    /// The encoding used to convert text into file bytes
    ///
    /// The default is windows 1252
    pub fn encoding<E2>(self, encoding: E2) -> RecordWriterBuilder<E2> {
        RecordWriterBuilder { encoding }
    }

    /// Construct a record writer from a builder and a writer.
    pub fn from_writer<W>(self, writer: W) -> RecordWriter<W, E>
    where
        W: Write,
    {
        RecordWriter {
            writer,
            encoding: self.encoding,
            body: Vec::new(),
            record: None,
            subrecord: None,
            records_written: 0,
            header_written: false,
            bytes_written: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, Utf8Encoding};

    const NPC: Name = Name::new(*b"NPC_");
    const NAME: Name = Name::new(*b"NAME");

    #[test]
    fn test_record_layout() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.start_record(NPC, RecordFlags::BLOCKED).unwrap();
        writer.write_hn_cstring(NAME, "guard01").unwrap();
        writer.end_record().unwrap();
        assert_eq!(writer.records_written(), 1);

        let data = writer.into_inner();
        let mut expected = Vec::new();
        expected.extend_from_slice(b"NPC_");
        expected.extend_from_slice(&16u32.to_le_bytes());
        expected.extend_from_slice(&0x2000u32.to_le_bytes());
        expected.extend_from_slice(b"NAME");
        expected.extend_from_slice(&8u32.to_le_bytes());
        expected.extend_from_slice(b"guard01\0");
        assert_eq!(data, expected);
    }

    #[test]
    fn test_nothing_emitted_until_record_ends() {
        let mut out = Vec::new();
        let mut writer = RecordWriter::new(&mut out);
        writer.start_record(NPC, RecordFlags::NONE).unwrap();
        writer.write_hn_string(NAME, "guard01").unwrap();
        assert!(writer.inner().is_empty());
        writer.abort_record();
        assert!(!writer.in_record());
        assert_eq!(writer.records_written(), 0);
        drop(writer);
        assert!(out.is_empty());
    }

    #[test]
    fn test_end_record_without_start() {
        let mut writer = RecordWriter::new(Vec::new());
        let err = writer.end_record().unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::Usage(UsageError::NoOpenRecord)
        ));
    }

    #[test]
    fn test_sized_subrecord_mismatch() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.start_record(NPC, RecordFlags::NONE).unwrap();
        writer.start_subrecord_sized(NAME, 4).unwrap();
        writer.write_u8(1).unwrap();
        let err = writer.end_subrecord().unwrap_err();
        match err.kind() {
            ErrorKind::Format(e) => assert_eq!(
                e.kind(),
                &FormatErrorKind::LengthMismatch {
                    tag: NAME,
                    declared: 4,
                    written: 1,
                }
            ),
            _ => panic!("unexpected error: {}", err),
        }
    }

    #[test]
    fn test_mismatched_subrecord_dropped_from_record() {
        let npdt = Name::new(*b"NPDT");
        let mut writer = RecordWriter::new(Vec::new());
        writer.write_file_header(&FileHeader::default()).unwrap();
        writer.start_record(NPC, RecordFlags::NONE).unwrap();
        writer.write_hn_cstring(NAME, "guard01").unwrap();
        writer.start_subrecord_sized(npdt, 8).unwrap();
        writer.write_u32(1).unwrap();
        assert!(writer.end_subrecord().unwrap_err().is_format());
        writer.end_record().unwrap();

        let data = writer.into_inner();
        let mut reader = crate::RecordReader::from_slice("base.esm", &data).unwrap();
        let record = reader.next_record_header().unwrap().unwrap();
        assert_eq!(record.len, 16);
        assert_eq!(reader.get_hn_string(NAME).unwrap(), "guard01");
        assert_eq!(reader.next_subrecord_header().unwrap(), None);
        assert_eq!(reader.next_record_header().unwrap(), None);
    }

    #[test]
    fn test_abort_after_mismatch_writes_nothing() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.start_record(NPC, RecordFlags::NONE).unwrap();
        writer.start_subrecord_sized(NAME, 8).unwrap();
        writer.write_u32(1).unwrap();
        assert!(writer.end_subrecord().unwrap_err().is_format());
        writer.abort_record();
        assert_eq!(writer.records_written(), 0);
        assert!(writer.into_inner().is_empty());
    }

    #[test]
    fn test_state_errors() {
        let mut writer = RecordWriter::new(Vec::new());
        assert!(writer.start_subrecord(NAME).unwrap_err().is_usage());
        assert!(writer.write_u32(1).unwrap_err().is_usage());

        writer.start_record(NPC, RecordFlags::NONE).unwrap();
        assert!(writer.start_record(NPC, RecordFlags::NONE).unwrap_err().is_usage());
        assert!(writer.write_u32(1).unwrap_err().is_usage());

        writer.start_subrecord(NAME).unwrap();
        assert!(writer.start_subrecord(NAME).unwrap_err().is_usage());
        assert!(writer.end_record().unwrap_err().is_usage());
        writer.end_subrecord().unwrap();
        assert!(writer.end_subrecord().unwrap_err().is_usage());
        writer.end_record().unwrap();
    }

    #[test]
    fn test_header_must_come_first() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.start_record(NPC, RecordFlags::NONE).unwrap();
        writer.end_record().unwrap();
        let err = writer.write_file_header(&FileHeader::default()).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::Usage(UsageError::HeaderAfterRecords)
        ));

        let mut writer = RecordWriter::new(Vec::new());
        writer.write_file_header(&FileHeader::default()).unwrap();
        assert_eq!(writer.records_written(), 0);
        assert!(writer
            .write_file_header(&FileHeader::default())
            .unwrap_err()
            .is_usage());
    }

    #[test]
    fn test_optional_string_omitted() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.start_record(NPC, RecordFlags::NONE).unwrap();
        writer.write_hno_string(NAME, "").unwrap();
        writer.end_record().unwrap();
        assert_eq!(writer.into_inner().len(), RecordHeader::SIZE);
    }

    #[test]
    fn test_encoding_applied() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.start_record(NPC, RecordFlags::NONE).unwrap();
        writer.write_hn_string(NAME, "Š").unwrap();
        writer.end_record().unwrap();
        assert_eq!(&writer.into_inner()[20..], b"\x8a");

        let mut writer = RecordWriterBuilder::new()
            .encoding(Utf8Encoding::new())
            .from_writer(Vec::new());
        writer.start_record(NPC, RecordFlags::NONE).unwrap();
        writer.write_hn_string(NAME, "Š").unwrap();
        writer.end_record().unwrap();
        assert_eq!(&writer.into_inner()[20..], "Š".as_bytes());
    }
}
