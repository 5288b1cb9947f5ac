//! Redaction of sensitive header values in dumped HTTP messages
//!
//! Works on the serialized bytes of a request or response, after the dump has
//! been produced. Only the diagnostic copy is touched.

/// Number of leading bytes searched for a sensitive prefix
pub const SEARCH_WINDOW: usize = 4096;

/// Maximum number of value bytes replaced by the mask
pub const MASK_LEN: usize = 4;

/// Byte written over the start of a redacted value
pub const MASK_BYTE: u8 = b'X';

/// Redacts the value following the first occurrence of `prefix`.
///
/// The prefix must start within the first [`SEARCH_WINDOW`] bytes. Up to
/// [`MASK_LEN`] bytes of the value are overwritten with [`MASK_BYTE`],
/// stopping early at `\n`, then the rest of the line up to the next `\n` is
/// removed. With no further `\n` the buffer ends after the mask.
///
/// Later occurrences of the same prefix are left alone. An empty prefix never
/// matches.
pub fn redact_one(mut buf: Vec<u8>, prefix: &[u8]) -> Vec<u8> {
    if prefix.is_empty() {
        return buf;
    }

    let window = buf.len().min(SEARCH_WINDOW);
    let start = match find(&buf[..window], prefix) {
        Some(start) => start,
        None => return buf,
    };

    let mut i = start + prefix.len();
    let mut masked = 0;
    while i < buf.len() && masked < MASK_LEN && buf[i] != b'\n' {
        buf[i] = MASK_BYTE;
        i += 1;
        masked += 1;
    }

    match buf[i..].iter().position(|&b| b == b'\n') {
        Some(rest) => {
            buf.drain(i..i + rest);
        }
        None => buf.truncate(i),
    }
    buf
}

/// Applies [`redact_one`] for each prefix in order.
///
/// Each pass sees the output of the previous one, so prefixes that overlap
/// each other must not be configured together.
pub fn redact_all<P: AsRef<[u8]>>(buf: Vec<u8>, prefixes: &[P]) -> Vec<u8> {
    prefixes
        .iter()
        .fold(buf, |buf, prefix| redact_one(buf, prefix.as_ref()))
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_AUTH;

    fn redact_str(input: &str, prefix: &[u8]) -> String {
        String::from_utf8(redact_one(input.as_bytes().to_vec(), prefix)).unwrap()
    }

    #[test]
    fn test_redact_one() {
        let cases = [
            ("", ""),
            ("floo", "floo"),
            ("Authorization: ", "Authorization: "),
            ("Authorization: \n", "Authorization: \n"),
            ("Authorization: A", "Authorization: X"),
            ("Authorization: A\n", "Authorization: X\n"),
            ("Authorization: AAAA", "Authorization: XXXX"),
            ("Authorization: AAAA\n", "Authorization: XXXX\n"),
            ("Authorization: AAAAA", "Authorization: XXXX"),
            ("Authorization: AAAAA\n", "Authorization: XXXX\n"),
            (
                "Authorization: AAAAAAAAA\nPotato: Help\n",
                "Authorization: XXXX\nPotato: Help\n",
            ),
            (
                "Sausage: 1\nAuthorization: AAAAAAAAA\nPotato: Help\n",
                "Sausage: 1\nAuthorization: XXXX\nPotato: Help\n",
            ),
        ];

        for (input, want) in cases {
            assert_eq!(redact_str(input, b"Authorization: "), want, "input {:?}", input);
        }
    }

    #[test]
    fn test_redact_all_default_prefixes() {
        let cases = [
            ("", ""),
            ("floo", "floo"),
            (
                "Authorization: AAAAAAAAA\nPotato: Help\n",
                "Authorization: XXXX\nPotato: Help\n",
            ),
            (
                "X-Auth-Token: AAAAAAAAA\nPotato: Help\n",
                "X-Auth-Token: XXXX\nPotato: Help\n",
            ),
            (
                "X-Auth-Token: AAAAAAAAA\nAuthorization: AAAAAAAAA\nPotato: Help\n",
                "X-Auth-Token: XXXX\nAuthorization: XXXX\nPotato: Help\n",
            ),
        ];

        for (input, want) in cases {
            let got = redact_all(input.as_bytes().to_vec(), &DEFAULT_AUTH);
            assert_eq!(String::from_utf8(got).unwrap(), want, "input {:?}", input);
        }
    }

    #[test]
    fn test_carriage_return_is_part_of_the_value() {
        // Only '\n' terminates a value, so a CRLF line loses its '\r'
        assert_eq!(
            redact_str("Authorization: Bearer abc\r\nHost: x\r\n", b"Authorization: "),
            "Authorization: XXXX\nHost: x\r\n"
        );
        assert_eq!(
            redact_str("Authorization: AB\r\nHost: x\r\n", b"Authorization: "),
            "Authorization: XXX\nHost: x\r\n"
        );
    }

    #[test]
    fn test_only_first_occurrence_redacted() {
        let input = "Authorization: one-secret\nAuthorization: two-secret\n";
        assert_eq!(
            redact_str(input, b"Authorization: "),
            "Authorization: XXXX\nAuthorization: two-secret\n"
        );
    }

    #[test]
    fn test_prefix_outside_search_window_ignored() {
        let mut input = "a".repeat(SEARCH_WINDOW);
        input.push_str("\nAuthorization: secret\n");
        assert_eq!(redact_str(&input, b"Authorization: "), input);

        // A prefix straddling the window edge doesn't match either
        let mut input = "a".repeat(SEARCH_WINDOW - 5);
        input.push_str("Authorization: secret\n");
        assert_eq!(redact_str(&input, b"Authorization: "), input);
    }

    #[test]
    fn test_case_sensitive_match() {
        let input = "authorization: secret\n";
        assert_eq!(redact_str(input, b"Authorization: "), input);
    }

    #[test]
    fn test_empty_prefix_is_noop() {
        assert_eq!(redact_str("Authorization: secret", b""), "Authorization: secret");
    }
}
