/// Code points for the windows-1252 bytes 0x80 through 0x9f. Every other byte
/// maps to the code point of the same value.
///
/// Positions 0x81, 0x8d, 0x8f, 0x90 and 0x9d are undefined in the code page
/// but the Windows API maps them to the matching C1 control codes, so we do
/// too.
const HIGH_CONTROL: [char; 32] = [
    '\u{20ac}', '\u{81}', '\u{201a}', '\u{0192}', '\u{201e}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02c6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{8d}', '\u{017d}', '\u{8f}',
    '\u{90}', '\u{2018}', '\u{2019}', '\u{201c}', '\u{201d}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02dc}', '\u{2122}', '\u{0161}', '\u{203a}', '\u{0153}', '\u{9d}', '\u{017e}', '\u{0178}',
];

const fn create_windows_1252_table() -> [char; 256] {
    let mut table = [0 as char; 256];
    let mut i = 0usize;
    while i < 256 {
        table[i] = if i >= 0x80 && i < 0xa0 {
            HIGH_CONTROL[i - 0x80]
        } else {
            i as u8 as char
        };
        i += 1;
    }
    table
}

pub(crate) static WINDOWS_1252: [char; 256] = create_windows_1252_table();

/// The windows-1252 byte for a character, if the code page can represent it
#[inline]
pub(crate) fn windows_1252_byte(c: char) -> Option<u8> {
    let code = u32::from(c);
    if code < 0x80 || (0xa0..0x100).contains(&code) {
        return Some(code as u8);
    }

    HIGH_CONTROL
        .iter()
        .position(|&x| x == c)
        .map(|idx| 0x80 + idx as u8)
}
