use crate::{util::get_split, Name};
use std::fmt;
use std::io::Write;

/// Bit flags carried by every record header
///
/// ```
/// use esmcodec::RecordFlags;
///
/// let flags = RecordFlags::PERSISTENT | RecordFlags::BLOCKED;
/// assert!(flags.is_persistent());
/// assert!(flags.is_blocked());
/// assert_eq!(flags.bits(), 0x2400);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "derive", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "derive", serde(transparent))]
pub struct RecordFlags(u32);

impl RecordFlags {
    /// No flags set
    pub const NONE: RecordFlags = RecordFlags(0);

    /// The record must be kept even when it is otherwise prunable
    pub const PERSISTENT: RecordFlags = RecordFlags(0x0000_0400);

    /// The record deletes the same record from an earlier file
    pub const BLOCKED: RecordFlags = RecordFlags(0x0000_2000);

    /// Create flags from the raw flag word. Unknown bits are preserved.
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        RecordFlags(bits)
    }

    /// The raw flag word
    #[inline]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns true if every bit of `other` is set
    #[inline]
    pub const fn contains(&self, other: RecordFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: RecordFlags) {
        self.0 |= other.0
    }

    #[inline]
    pub fn remove(&mut self, other: RecordFlags) {
        self.0 &= !other.0
    }

    #[inline]
    pub const fn is_persistent(&self) -> bool {
        self.contains(RecordFlags::PERSISTENT)
    }

    #[inline]
    pub const fn is_blocked(&self) -> bool {
        self.contains(RecordFlags::BLOCKED)
    }
}

impl std::ops::BitOr for RecordFlags {
    type Output = RecordFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        RecordFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for RecordFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs)
    }
}

/// The header that precedes every record:
/// `[4 byte tag][4 byte payload length][4 byte flags]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "derive", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordHeader {
    /// The record type
    pub tag: Name,

    /// Length of the payload that follows the header
    pub len: u32,

    /// Record flags
    pub flags: RecordFlags,
}

impl RecordHeader {
    /// Size of an encoded record header
    pub const SIZE: usize = 12;

    /// Creates a header
    pub fn new(tag: Name, len: u32, flags: RecordFlags) -> Self {
        RecordHeader { tag, len, flags }
    }

    /// Decode a header from the first twelve bytes of `data`
    ///
    /// ```
    /// use esmcodec::{Name, RecordHeader};
    /// let data = b"NPC_\x10\x00\x00\x00\x00\x20\x00\x00";
    /// let header = RecordHeader::from_slice(&data[..]).unwrap();
    /// assert_eq!(header.tag, Name::new(*b"NPC_"));
    /// assert_eq!(header.len, 16);
    /// assert!(header.flags.is_blocked());
    /// ```
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        let (tag, data) = get_split::<4>(data)?;
        let (len, data) = get_split::<4>(data)?;
        let (flags, _) = get_split::<4>(data)?;
        Some(RecordHeader {
            tag: Name::new(tag),
            len: u32::from_le_bytes(len),
            flags: RecordFlags::from_bits(u32::from_le_bytes(flags)),
        })
    }

    /// Encode the header into its twelve byte form
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut result = [0u8; Self::SIZE];
        result[..4].copy_from_slice(self.tag.as_bytes());
        result[4..8].copy_from_slice(&self.len.to_le_bytes());
        result[8..].copy_from_slice(&self.flags.bits().to_le_bytes());
        result
    }

    /// Writes the header
    pub fn write<W>(&self, mut writer: W) -> std::io::Result<()>
    where
        W: Write,
    {
        writer.write_all(&self.to_bytes())
    }

    /// Total size of the record on disk, header included
    pub fn record_size(&self) -> u64 {
        Self::SIZE as u64 + u64::from(self.len)
    }
}

impl fmt::Display for RecordHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (len: {}, flags: 0x{:08x})",
            self.tag,
            self.len,
            self.flags.bits()
        )
    }
}

/// The header that precedes every subrecord:
/// `[4 byte tag][4 byte payload length]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "derive", derive(serde::Serialize, serde::Deserialize))]
pub struct SubrecordHeader {
    /// The subrecord type
    pub tag: Name,

    /// Length of the payload that follows the header
    pub len: u32,
}

impl SubrecordHeader {
    /// Size of an encoded subrecord header
    pub const SIZE: usize = 8;

    /// Size of the tag portion of a subrecord header
    pub const TAG_SIZE: usize = 4;

    /// Creates a header
    pub fn new(tag: Name, len: u32) -> Self {
        SubrecordHeader { tag, len }
    }

    /// Encode the header into its eight byte form
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut result = [0u8; Self::SIZE];
        result[..4].copy_from_slice(self.tag.as_bytes());
        result[4..].copy_from_slice(&self.len.to_le_bytes());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_header_layout() {
        let header = RecordHeader::new(
            Name::new(*b"CELL"),
            0x0102_0304,
            RecordFlags::PERSISTENT,
        );
        let bytes = header.to_bytes();
        assert_eq!(&bytes[..4], b"CELL");
        assert_eq!(&bytes[4..8], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[8..], &[0x00, 0x04, 0x00, 0x00]);
        assert_eq!(RecordHeader::from_slice(&bytes), Some(header));
        assert_eq!(header.record_size(), 12 + 0x0102_0304);
    }

    #[test]
    fn test_record_header_too_short() {
        assert_eq!(RecordHeader::from_slice(b"CELL\x00\x00\x00\x00\x00"), None);
    }

    #[test]
    fn test_flags_preserve_unknown_bits() {
        let mut flags = RecordFlags::from_bits(0x8000_0001);
        flags |= RecordFlags::BLOCKED;
        assert!(flags.is_blocked());
        assert!(!flags.is_persistent());
        flags.remove(RecordFlags::BLOCKED);
        assert_eq!(flags.bits(), 0x8000_0001);
    }

    #[test]
    fn test_subrecord_header_layout() {
        let header = SubrecordHeader::new(Name::new(*b"NAME"), 8);
        assert_eq!(&header.to_bytes(), b"NAME\x08\x00\x00\x00");
    }
}
