use crate::data::{windows_1252_byte, WINDOWS_1252};
use crate::util::nul_terminated_len;
use std::borrow::Cow;

/// Converts between the byte encoding used inside content files and utf-8.
///
/// Identifiers and text in content files are stored in a legacy single byte
/// code page that depends on the locale the file was authored for. The codec
/// hands raw bytes to an `Encoding` whenever text is requested, and asks it to
/// encode text when writing.
///
/// It is heavily encouraged that encoding implementations are marked as
/// `Copy` to make sure they are as cheap to copy as possible, as they are
/// passed around with every reader and writer.
///
/// Decoding stops at the first NUL byte since text fields are usually NUL
/// terminated or NUL padded.
pub trait Encoding {
    /// Decodes bytes into a utf-8 compatible string -- allocating if necessary
    fn decode<'a>(&self, data: &'a [u8]) -> Cow<'a, str>;

    /// Encodes utf-8 text into file bytes -- allocating if necessary
    fn encode<'a>(&self, data: &'a str) -> Cow<'a, [u8]>;
}

/// Decodes bytes according to the windows1252 code page
///
/// ```
/// use esmcodec::{Windows1252Encoding, Encoding};
///
/// let encoding = Windows1252Encoding::new();
/// assert_eq!(encoding.decode(b"Caius Cosades"), "Caius Cosades");
/// assert_eq!(encoding.decode(b"guard01\0\0\0"), "guard01");
/// assert_eq!(encoding.decode(b"\xff"), "ÿ");
/// assert_eq!(encoding.decode(b"\x8a"), "Š");
/// assert_eq!(encoding.decode(b"hi\x81\x8a"), "hi\u{81}Š");
/// assert_eq!(encoding.encode("Š"), &b"\x8a"[..]);
/// ```
#[derive(Debug, Default, Copy, Clone)]
pub struct Windows1252Encoding;

impl Windows1252Encoding {
    /// Creates a new windows 1252 decoder
    pub fn new() -> Self {
        Windows1252Encoding
    }

    /// Static method for decoding windows 1252 data
    pub fn decode(data: &[u8]) -> Cow<'_, str> {
        decode_windows1252(data)
    }

    /// Static method for encoding text as windows 1252 data
    pub fn encode(data: &str) -> Cow<'_, [u8]> {
        encode_windows1252(data)
    }
}

impl Encoding for Windows1252Encoding {
    fn decode<'a>(&self, data: &'a [u8]) -> Cow<'a, str> {
        Windows1252Encoding::decode(data)
    }

    fn encode<'a>(&self, data: &'a str) -> Cow<'a, [u8]> {
        Windows1252Encoding::encode(data)
    }
}

impl<T: Encoding + ?Sized> Encoding for &'_ T {
    fn decode<'a>(&self, data: &'a [u8]) -> Cow<'a, str> {
        (**self).decode(data)
    }

    fn encode<'a>(&self, data: &'a str) -> Cow<'a, [u8]> {
        (**self).encode(data)
    }
}

impl<T: Encoding + ?Sized> Encoding for Box<T> {
    fn decode<'a>(&self, data: &'a [u8]) -> Cow<'a, str> {
        (**self).decode(data)
    }

    fn encode<'a>(&self, data: &'a str) -> Cow<'a, [u8]> {
        (**self).encode(data)
    }
}

/// Decodes bytes according to the utf8 standard
///
/// ```
/// use esmcodec::{Utf8Encoding, Encoding};
///
/// let encoding = Utf8Encoding::new();
/// assert_eq!(encoding.decode(b"Caius Cosades"), "Caius Cosades");
/// assert_eq!(encoding.decode(b"J\xc3\xa5hk\xc3\xa5m\0"), "Jåhkåm");
/// assert_eq!(encoding.encode("Jåhkåm"), "Jåhkåm".as_bytes());
/// ```
#[derive(Debug, Default, Copy, Clone)]
pub struct Utf8Encoding;

impl Utf8Encoding {
    /// Creates a new utf8 decoder
    pub fn new() -> Self {
        Utf8Encoding
    }

    /// Static method for decoding utf8 data
    pub fn decode(data: &[u8]) -> Cow<'_, str> {
        String::from_utf8_lossy(&data[..nul_terminated_len(data)])
    }
}

impl Encoding for Utf8Encoding {
    fn decode<'a>(&self, data: &'a [u8]) -> Cow<'a, str> {
        Utf8Encoding::decode(data)
    }

    fn encode<'a>(&self, data: &'a str) -> Cow<'a, [u8]> {
        Cow::Borrowed(data.as_bytes())
    }
}

#[inline]
pub(crate) fn decode_windows1252(d: &[u8]) -> Cow<'_, str> {
    let d = &d[..nul_terminated_len(d)];
    match d.iter().position(|x| !x.is_ascii()) {
        // ascii is a subset of utf8
        None => Cow::Borrowed(std::str::from_utf8(d).unwrap_or_default()),
        Some(offset) => Cow::Owned(windows_1252_create(d, offset)),
    }
}

fn windows_1252_create(d: &[u8], offset: usize) -> String {
    let (upto, rest) = d.split_at(offset);

    // size estimate: all remaining characters need translation
    let size_estimate = offset + (d.len() - offset) * 2;
    let mut result = String::with_capacity(size_estimate);
    result.push_str(std::str::from_utf8(upto).unwrap_or_default());
    result.extend(rest.iter().map(|&c| WINDOWS_1252[usize::from(c)]));
    result
}

#[inline]
pub(crate) fn encode_windows1252(d: &str) -> Cow<'_, [u8]> {
    if d.is_ascii() {
        return Cow::Borrowed(d.as_bytes());
    }

    let result = d
        .chars()
        .map(|c| windows_1252_byte(c).unwrap_or(b'?'))
        .collect();
    Cow::Owned(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn decode_stops_at_nul() {
        assert_eq!(Windows1252Encoding::decode(b""), "");
        assert_eq!(Windows1252Encoding::decode(b"\0abc"), "");
        assert_eq!(Windows1252Encoding::decode(b"new\xF8\0junk"), "newø");
        assert_eq!(Utf8Encoding::decode(b"new\0junk"), "new");
    }

    #[test]
    fn decode_ascii_borrows() {
        assert!(matches!(
            Windows1252Encoding::decode(b"Balmora"),
            Cow::Borrowed("Balmora")
        ));
    }

    #[test]
    fn encode_unmappable_replaced() {
        assert_eq!(Windows1252Encoding::encode("a\u{3042}b"), &b"a?b"[..]);
        assert_eq!(Windows1252Encoding::encode("Dagoth Ur"), &b"Dagoth Ur"[..]);
    }

    #[test]
    fn scalar_invalid_utf8_replace() {
        let data = b"Joe\xffcheeze";
        assert_eq!(Utf8Encoding::decode(data), "Joe�cheeze");
    }

    #[test]
    fn decode_undefined_characters() {
        let data = &[0x81, 0x8d, 0x8f, 0x90, 0x9d];
        let (cow, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(data);
        assert_eq!(Windows1252Encoding::decode(data), cow);
    }

    #[quickcheck]
    fn decode_matches_encoding_rs(data: Vec<u8>) -> bool {
        let text = &data[..nul_terminated_len(&data)];
        let (cow, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(text);
        cow == Windows1252Encoding::decode(&data)
    }

    #[quickcheck]
    fn encode_decode_round_trip(data: Vec<u8>) -> bool {
        let text = &data[..nul_terminated_len(&data)];
        let decoded = Windows1252Encoding::decode(text);
        Windows1252Encoding::encode(&decoded) == text
    }
}
