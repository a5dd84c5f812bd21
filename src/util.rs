/// A const generic version of arrayref that splits off the first `N` bytes
#[inline]
pub(crate) fn get_split<const N: usize>(data: &[u8]) -> Option<([u8; N], &[u8])> {
    let (head, rest) = data.split_first_chunk::<N>()?;
    Some((*head, rest))
}

/// Reads a little endian u32 from the first four bytes.
///
/// Callers guarantee there are at least four bytes.
#[inline]
pub(crate) fn le_u32(data: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[..4]);
    u32::from_le_bytes(buf)
}

/// Length of the text before the first NUL byte
#[inline]
pub(crate) fn nul_terminated_len(data: &[u8]) -> usize {
    data.iter().position(|&x| x == 0).unwrap_or(data.len())
}

/// Matches the final path component of two file names, ignoring ascii case.
///
/// Content files list their masters by bare file name, while readers are
/// usually named after the path they were opened from.
pub(crate) fn file_name_eq(a: &str, b: &str) -> bool {
    fn base(x: &str) -> &str {
        x.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(x)
    }

    base(a).eq_ignore_ascii_case(base(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case(b"abc\0def", 3)]
    #[case(b"\0", 0)]
    #[case(b"", 0)]
    #[case(b"full", 4)]
    fn test_nul_terminated_len(#[case] input: &[u8], #[case] expected: usize) {
        assert_eq!(nul_terminated_len(input), expected);
    }

    #[rstest]
    #[case("Morrowind.esm", "morrowind.ESM", true)]
    #[case("data/Morrowind.esm", "Morrowind.esm", true)]
    #[case("C:\\games\\data\\Tribunal.esm", "tribunal.esm", true)]
    #[case("Tribunal.esm", "Bloodmoon.esm", false)]
    fn test_file_name_eq(#[case] a: &str, #[case] b: &str, #[case] expected: bool) {
        assert_eq!(file_name_eq(a, b), expected);
    }

    #[test]
    fn test_get_split() {
        let data = [1u8, 2, 3, 4, 5];
        let (head, rest) = get_split::<4>(&data).unwrap();
        assert_eq!(head, [1, 2, 3, 4]);
        assert_eq!(rest, &[5]);
        assert!(get_split::<6>(&data).is_none());
        assert_eq!(le_u32(&data), 0x0403_0201);
    }
}
