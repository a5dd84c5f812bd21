use crate::{
    errors::{FormatError, FormatErrorKind},
    Encoding, Error, Name, Name256, Name32, RecordFlags, RecordReader, RecordWriter,
};
use std::fmt;
use std::io::{Read, Seek, Write};

/// Format version stored in the file header
///
/// The reader never changes how it parses records based on the version. It
/// is exposed so callers can decide which optional subrecords to expect.
///
/// ```
/// use esmcodec::Version;
/// assert_eq!(Version::from_u32(0x3fa66666), Version::Ver13);
/// assert_eq!(Version::Ver12.as_f32(), 1.2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "derive", derive(serde::Serialize, serde::Deserialize))]
pub enum Version {
    /// Version 1.2
    Ver12,

    /// Version 1.3
    Ver13,

    /// An unrecognized version
    Other(u32),
}

impl Version {
    /// Bit pattern of version 1.2
    pub const VER_12: u32 = 0x3f99_999a;

    /// Bit pattern of version 1.3
    pub const VER_13: u32 = 0x3fa6_6666;

    /// Creates a version from its bit pattern
    pub fn from_u32(value: u32) -> Version {
        match value {
            Self::VER_12 => Version::Ver12,
            Self::VER_13 => Version::Ver13,
            x => Version::Other(x),
        }
    }

    /// The bit pattern of this version
    pub fn value(&self) -> u32 {
        match self {
            Version::Ver12 => Self::VER_12,
            Version::Ver13 => Self::VER_13,
            Version::Other(x) => *x,
        }
    }

    /// The version as the floating point number it encodes
    pub fn as_f32(&self) -> f32 {
        f32::from_bits(self.value())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Ver12 => write!(f, "1.2"),
            Version::Ver13 => write!(f, "1.3"),
            Version::Other(x) => write!(f, "unknown (0x{:08x})", x),
        }
    }
}

/// The kind of content file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "derive", derive(serde::Serialize, serde::Deserialize))]
pub enum FileType {
    /// A plugin
    Esp,

    /// A master file
    Esm,

    /// A saved game
    Ess,

    /// An unknown type
    Other(u32),
}

impl FileType {
    /// Creates a FileType from a numeric value
    pub fn new(kind: u32) -> FileType {
        match kind {
            0 => FileType::Esp,
            1 => FileType::Esm,
            32 => FileType::Ess,
            x => FileType::Other(x),
        }
    }

    /// Returns the numeric value of this file type
    pub fn value(&self) -> u32 {
        match self {
            FileType::Esp => 0,
            FileType::Esm => 1,
            FileType::Ess => 32,
            FileType::Other(x) => *x,
        }
    }
}

const HEDR_SIZE: usize = 4 + 4 + 32 + 256 + 4;

/// A master file that a content file depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "derive", derive(serde::Serialize, serde::Deserialize))]
pub struct MasterFile {
    /// File name of the master
    pub name: String,

    /// Size of the master at the time the dependent file was authored
    pub size: u64,
}

impl MasterFile {
    /// Creates a master entry
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        MasterFile {
            name: name.into(),
            size,
        }
    }
}

/// The reserved first record of every content file
///
/// ```text
/// TES3
/// ├── HEDR (300 bytes)
/// │   ├── version       u32
/// │   ├── file type     u32
/// │   ├── author        32 byte fixed string
/// │   ├── description   256 byte fixed string
/// │   └── record count  u32
/// └── repeated
///     ├── MAST          master file name (NUL terminated)
///     └── DATA          master file size (u64)
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "derive", derive(serde::Serialize, serde::Deserialize))]
pub struct FileHeader {
    /// Format version
    pub version: Version,

    /// Plugin, master, or save
    pub file_type: FileType,

    /// Author of the file
    pub author: Name32,

    /// Description of the file
    pub description: Name256,

    /// Number of records following the header
    pub record_count: u32,

    /// Master files this file requires, in declaration order
    pub masters: Vec<MasterFile>,
}

impl Default for FileHeader {
    fn default() -> Self {
        FileHeader {
            version: Version::Ver13,
            file_type: FileType::Esp,
            author: Name32::empty(),
            description: Name256::empty(),
            record_count: 0,
            masters: Vec::new(),
        }
    }
}

impl FileHeader {
    /// Tag of the header record
    pub const TAG: Name = Name::new(*b"TES3");

    /// Tag of the subrecord holding the fixed header data
    pub const HEDR: Name = Name::new(*b"HEDR");

    /// Tag of a master file name subrecord
    pub const MAST: Name = Name::new(*b"MAST");

    /// Tag of a master file size subrecord
    pub const DATA: Name = Name::new(*b"DATA");

    /// Adds a master dependency
    pub fn with_master(mut self, name: impl Into<String>, size: u64) -> Self {
        self.masters.push(MasterFile::new(name, size));
        self
    }

    pub(crate) fn read<R, E>(reader: &mut RecordReader<R, E>) -> Result<FileHeader, Error>
    where
        R: Read + Seek,
        E: Encoding,
    {
        let position = reader.position();
        let missing = |found: Name| -> Error {
            FormatError::new(FormatErrorKind::MissingFileHeader { found }, position).into()
        };

        let record = reader
            .next_record_header()?
            .ok_or_else(|| missing(Name::empty()))?;
        if record.tag != Self::TAG {
            return Err(missing(record.tag));
        }

        match reader.peek_subrecord_tag()? {
            Some(tag) if tag == Self::HEDR => {}
            Some(tag) => return Err(missing(tag)),
            None => return Err(missing(Name::empty())),
        }

        let hedr = reader.expect_subrecord(Self::HEDR)?;
        if hedr.len as usize != HEDR_SIZE {
            let kind = FormatErrorKind::SubrecordSizeMismatch {
                tag: Self::HEDR,
                expected: HEDR_SIZE,
                found: hedr.len,
            };
            return Err(FormatError::new(kind, reader.position()).into());
        }

        let mut result = FileHeader {
            version: Version::from_u32(reader.get_u32()?),
            file_type: FileType::new(reader.get_u32()?),
            author: reader.get_fixed::<32>()?,
            description: reader.get_fixed::<256>()?,
            record_count: reader.get_u32()?,
            masters: Vec::new(),
        };

        while let Some(sub) = reader.next_subrecord_header()? {
            if sub.tag == Self::MAST {
                let name = reader.get_remaining_string()?;
                let size = if reader.is_next_subrecord(Self::DATA)? {
                    u64::from_le_bytes(reader.get_hn_exact::<8>(Self::DATA)?)
                } else {
                    0
                };
                result.masters.push(MasterFile { name, size });
            } else {
                reader.skip_subrecord()?;
            }
        }

        Ok(result)
    }

    pub(crate) fn write<W, E>(&self, writer: &mut RecordWriter<W, E>) -> Result<(), Error>
    where
        W: Write,
        E: Encoding,
    {
        writer.start_record(Self::TAG, RecordFlags::NONE)?;
        writer.start_subrecord_sized(Self::HEDR, HEDR_SIZE as u32)?;
        writer.write_u32(self.version.value())?;
        writer.write_u32(self.file_type.value())?;
        writer.write_fixed(&self.author)?;
        writer.write_fixed(&self.description)?;
        writer.write_u32(self.record_count)?;
        writer.end_subrecord()?;

        for master in &self.masters {
            writer.write_hn_cstring(Self::MAST, &master.name)?;
            writer.write_subrecord(Self::DATA, &master.size.to_le_bytes())?;
        }

        writer.end_record()
    }
}
