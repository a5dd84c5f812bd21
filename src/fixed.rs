use crate::{util::nul_terminated_len, Encoding};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A capacity bounded, NUL padded byte string.
///
/// Content files store identifiers and short text in fixed width slots. Bytes
/// after the logical text are zero. A four byte instance ([Name]) doubles as a
/// record or subrecord type tag and is never NUL terminated, so a tag like
/// `NPC_` uses all four bytes. Two tags are equal only when all four bytes
/// (their [to_int](FixedString::to_int) values) match, while wider strings
/// compare their text up to the first NUL.
///
/// ```
/// use esmcodec::{FixedString, Name};
///
/// let mut author = FixedString::<32>::empty();
/// author.assign("Bethesda");
/// assert_eq!(author, "Bethesda");
/// assert_eq!(author.as_text(), b"Bethesda");
///
/// let tag = Name::new(*b"NPC_");
/// assert_eq!(tag.to_int(), u32::from_le_bytes(*b"NPC_"));
/// assert_eq!(tag, "NPC_");
/// ```
#[derive(Clone, Copy)]
pub struct FixedString<const N: usize> {
    data: [u8; N],
}

/// A four byte type tag
pub type Name = FixedString<4>;

/// A 32 byte fixed string (eg: the author of a content file)
pub type Name32 = FixedString<32>;

/// A 64 byte fixed string
pub type Name64 = FixedString<64>;

/// A 256 byte fixed string (eg: the description of a content file)
pub type Name256 = FixedString<256>;

impl<const N: usize> FixedString<N> {
    /// The number of bytes that an instance occupies on disk
    pub const CAPACITY: usize = N;

    const IS_TAG: bool = N == 4;

    /// Create a fixed string from raw bytes
    #[inline]
    pub const fn new_raw(data: [u8; N]) -> Self {
        FixedString { data }
    }

    /// Create an empty (all zero) fixed string
    #[inline]
    pub const fn empty() -> Self {
        FixedString { data: [0; N] }
    }

    /// Create a fixed string from text, truncating to fit
    pub fn from_text(value: impl AsRef<[u8]>) -> Self {
        let mut result = Self::empty();
        result.assign(value);
        result
    }

    /// Copy `value` into the buffer.
    ///
    /// Text that is too long is truncated. For anything but tags the final
    /// byte is reserved for the NUL terminator, so at most `N - 1` bytes of
    /// text are kept. Tags keep all four bytes. Remaining bytes are zeroed.
    pub fn assign(&mut self, value: impl AsRef<[u8]>) {
        let value = value.as_ref();
        self.clear();
        let keep = if Self::IS_TAG {
            value.len().min(N)
        } else {
            value.len().min(N.saturating_sub(1))
        };
        self.data[..keep].copy_from_slice(&value[..keep]);
    }

    /// Zero every byte
    #[inline]
    pub fn clear(&mut self) {
        self.data = [0; N];
    }

    /// The raw buffer, including padding
    #[inline]
    pub fn as_bytes(&self) -> &[u8; N] {
        &self.data
    }

    /// The text up to the first NUL byte
    #[inline]
    pub fn as_text(&self) -> &[u8] {
        &self.data[..nul_terminated_len(&self.data)]
    }

    /// Length of the text up to the first NUL byte
    #[inline]
    pub fn len(&self) -> usize {
        nul_terminated_len(&self.data)
    }

    /// Returns true if the text is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.first().map_or(true, |&x| x == 0)
    }

    /// Decode the text with the given encoding
    pub fn decode<E: Encoding>(&self, encoding: E) -> Cow<'_, str> {
        encoding.decode(self.as_text())
    }

    /// The text as utf-8, replacing invalid sequences
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_text())
    }
}

impl FixedString<4> {
    /// Create a tag from its four bytes
    #[inline]
    pub const fn new(data: [u8; 4]) -> Self {
        FixedString { data }
    }

    /// Interpret the tag as a little endian unsigned integer.
    ///
    /// Tags compare numerically on hot paths, and the explicit little endian
    /// unpacking keeps the value identical across architectures.
    #[inline]
    pub const fn to_int(&self) -> u32 {
        u32::from_le_bytes(self.data)
    }

    /// Create a tag from its little endian integer form
    #[inline]
    pub const fn from_int(value: u32) -> Self {
        FixedString {
            data: value.to_le_bytes(),
        }
    }
}

impl<const N: usize> Default for FixedString<N> {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<u32> for FixedString<4> {
    fn from(value: u32) -> Self {
        FixedString::from_int(value)
    }
}

impl From<FixedString<4>> for u32 {
    fn from(value: FixedString<4>) -> Self {
        value.to_int()
    }
}

impl<const N: usize> FixedString<N> {
    // Tags compare as their integer value, wider strings as text
    #[inline]
    fn cmp_bytes(&self) -> &[u8] {
        if Self::IS_TAG {
            &self.data
        } else {
            self.as_text()
        }
    }
}

impl<const N: usize> PartialEq for FixedString<N> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_bytes() == other.cmp_bytes()
    }
}

impl<const N: usize> Eq for FixedString<N> {}

impl<const N: usize> Hash for FixedString<N> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cmp_bytes().hash(state)
    }
}

impl<const N: usize> PartialOrd for FixedString<N> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<const N: usize> Ord for FixedString<N> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.cmp_bytes().cmp(other.cmp_bytes())
    }
}

/// Compare against text. The comparison stops at the first NUL on either
/// side, so `"abc\0junk"` equals `"abc"`.
impl<const N: usize> PartialEq<[u8]> for FixedString<N> {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_text() == &other[..nul_terminated_len(other)]
    }
}

impl<const N: usize> PartialEq<&[u8]> for FixedString<N> {
    fn eq(&self, other: &&[u8]) -> bool {
        *self == **other
    }
}

impl<const N: usize, const M: usize> PartialEq<[u8; M]> for FixedString<N> {
    fn eq(&self, other: &[u8; M]) -> bool {
        *self == other[..]
    }
}

impl<const N: usize> PartialEq<str> for FixedString<N> {
    fn eq(&self, other: &str) -> bool {
        *self == *other.as_bytes()
    }
}

impl<const N: usize> PartialEq<&str> for FixedString<N> {
    fn eq(&self, other: &&str) -> bool {
        *self == *other.as_bytes()
    }
}

impl<const N: usize> PartialEq<String> for FixedString<N> {
    fn eq(&self, other: &String) -> bool {
        *self == *other.as_bytes()
    }
}

impl PartialEq<u32> for FixedString<4> {
    fn eq(&self, other: &u32) -> bool {
        self.to_int() == *other
    }
}

impl<const N: usize> fmt::Display for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl<const N: usize> fmt::Debug for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

#[cfg(feature = "derive")]
mod serde_impl {
    use super::FixedString;
    use serde::de::{self, SeqAccess, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::fmt;

    impl<const N: usize> Serialize for FixedString<N> {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match std::str::from_utf8(self.as_text()) {
                Ok(s) => serializer.serialize_str(s),
                Err(_) => serializer.serialize_bytes(self.as_text()),
            }
        }
    }

    struct FixedStringVisitor<const N: usize>;

    impl<'de, const N: usize> Visitor<'de> for FixedStringVisitor<N> {
        type Value = FixedString<N>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(formatter, "a string of at most {} bytes", N)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(FixedString::from_text(v))
        }

        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
            Ok(FixedString::from_text(v))
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut data = Vec::with_capacity(N);
            while let Some(byte) = seq.next_element::<u8>()? {
                data.push(byte);
            }
            Ok(FixedString::from_text(data))
        }
    }

    impl<'de, const N: usize> Deserialize<'de> for FixedString<N> {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_any(FixedStringVisitor::<N>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use rstest::*;

    #[test]
    fn test_tag_keeps_all_bytes() {
        let mut tag = Name::empty();
        tag.assign("NPC_");
        assert_eq!(tag.as_bytes(), b"NPC_");
        assert_eq!(tag, "NPC_");
        assert_eq!(tag.len(), 4);
    }

    #[test]
    fn test_tag_short_value_zero_pads() {
        let mut tag = Name::new(*b"ABCD");
        tag.assign("XY");
        assert_eq!(tag.as_bytes(), b"XY\0\0");
        assert_eq!(tag, "XY");
    }

    #[test]
    fn test_assign_truncates_and_terminates() {
        let mut name = FixedString::<8>::empty();
        name.assign("abcdefghijkl");
        assert_eq!(name.as_bytes(), b"abcdefg\0");
        assert_eq!(name, "abcdefg");

        name.assign("hi");
        assert_eq!(name.as_bytes(), b"hi\0\0\0\0\0\0");
    }

    #[test]
    fn test_assign_empty_clears() {
        let mut name = FixedString::<8>::from_text("value");
        name.assign("");
        assert!(name.is_empty());
        assert_eq!(name.as_bytes(), &[0; 8]);
    }

    #[rstest]
    #[case(&b"abc"[..], true)]
    #[case(&b"abc\0garbage"[..], true)]
    #[case(&b"ab"[..], false)]
    #[case(&b"abcd"[..], false)]
    #[case(&b""[..], false)]
    fn test_eq_stops_at_nul(#[case] rhs: &[u8], #[case] expected: bool) {
        let name = FixedString::<8>::from_text("abc");
        assert_eq!(name == *rhs, expected);
    }

    #[test]
    fn test_eq_ignores_bytes_after_terminator() {
        let a = FixedString::<6>::new_raw(*b"abc\0xy");
        let b = FixedString::<6>::new_raw(*b"abc\0\0\0");
        assert_eq!(a, b);
        assert_ne!(a, FixedString::<6>::from_text("abcd"));
    }

    #[test]
    fn test_tag_integer_is_little_endian() {
        let tag = Name::new(*b"TES3");
        assert_eq!(tag.to_int(), 0x3353_4554);
        assert_eq!(tag, 0x3353_4554u32);
        assert_eq!(Name::from_int(0x3353_4554), tag);
    }

    #[rstest]
    #[case(0x41, 0x4242_0041, false)]
    #[case(0x0000_4241, 0x4100_4241, false)]
    #[case(0x3353_4554, 0x3353_4554, true)]
    #[case(0, 0, true)]
    fn test_tag_eq_is_integer_eq(#[case] lhs: u32, #[case] rhs: u32, #[case] expected: bool) {
        use std::collections::hash_map::DefaultHasher;

        let hash = |tag: &Name| {
            let mut hasher = DefaultHasher::new();
            tag.hash(&mut hasher);
            hasher.finish()
        };

        let (a, b) = (Name::from_int(lhs), Name::from_int(rhs));
        assert_eq!(a == b, expected);
        assert_eq!(a.cmp(&b) == std::cmp::Ordering::Equal, expected);
        if expected {
            assert_eq!(hash(&a), hash(&b));
        }
    }

    #[quickcheck]
    fn tag_eq_matches_int(lhs: u32, rhs: u32) -> bool {
        (Name::from_int(lhs) == Name::from_int(rhs)) == (lhs == rhs)
    }

    #[quickcheck]
    fn tag_int_round_trip(value: u32) -> bool {
        let tag = Name::from(value);
        tag.to_int() == value && u32::from(tag) == value
    }

    #[quickcheck]
    fn tag_bytes_round_trip(data: (u8, u8, u8, u8)) -> bool {
        let bytes = [data.0, data.1, data.2, data.3];
        let mut tag = Name::empty();
        tag.assign(bytes);
        Name::from_int(tag.to_int()).as_bytes() == &bytes
    }
}
