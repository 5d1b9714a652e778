//! Input layout detection.

use std::io::{self, BufRead};

use serde::Deserialize;

/// How elements are laid out in the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// One top-level JSON array.
    #[default]
    Array,
    /// JSON Lines, or any whitespace-separated sequence of JSON values.
    Lines,
    /// `Array` if the first non-whitespace byte is `[`, `Lines` otherwise.
    Auto,
}

impl InputFormat {
    /// Resolve `Auto` from the first significant byte of the input.
    pub fn resolve(self, first: Option<u8>) -> InputFormat {
        match (self, first) {
            (InputFormat::Auto, Some(b'[')) => InputFormat::Array,
            (InputFormat::Auto, _) => InputFormat::Lines,
            (format, _) => format,
        }
    }
}

/// Skip leading whitespace and return the next byte without consuming it.
///
/// Returns `None` at end of input.
pub fn peek_significant<R: BufRead + ?Sized>(reader: &mut R) -> io::Result<Option<u8>> {
    loop {
        let buf = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if buf.is_empty() {
            return Ok(None);
        }
        match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(pos) => {
                let byte = buf[pos];
                reader.consume(pos);
                return Ok(Some(byte));
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}

/// Describe what a document starting with `byte` holds, for error messages.
pub(crate) fn describe_leading(byte: Option<u8>) -> String {
    match byte {
        None => "empty input".to_string(),
        Some(b'{') => "an object".to_string(),
        Some(b'"') => "a string".to_string(),
        Some(b't') | Some(b'f') => "a boolean".to_string(),
        Some(b'n') => "null".to_string(),
        Some(b) if b == b'-' || b.is_ascii_digit() => "a number".to_string(),
        Some(b) => format!("unexpected byte {:?}", b as char),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Read};

    #[test]
    fn test_peek_skips_whitespace_without_consuming() {
        let mut reader = BufReader::new(&b"  \n\t[1]"[..]);
        assert_eq!(peek_significant(&mut reader).unwrap(), Some(b'['));

        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "[1]");
    }

    #[test]
    fn test_peek_across_buffer_boundary() {
        let mut input = vec![b' '; 10];
        input.push(b'{');
        let mut reader = BufReader::with_capacity(4, &input[..]);
        assert_eq!(peek_significant(&mut reader).unwrap(), Some(b'{'));
    }

    #[test]
    fn test_peek_empty() {
        let mut reader = BufReader::new(&b"   "[..]);
        assert_eq!(peek_significant(&mut reader).unwrap(), None);
    }

    #[test]
    fn test_resolve_auto() {
        assert_eq!(InputFormat::Auto.resolve(Some(b'[')), InputFormat::Array);
        assert_eq!(InputFormat::Auto.resolve(Some(b'{')), InputFormat::Lines);
        assert_eq!(InputFormat::Auto.resolve(None), InputFormat::Lines);
        assert_eq!(InputFormat::Array.resolve(Some(b'{')), InputFormat::Array);
    }

    #[test]
    fn test_describe_leading() {
        assert_eq!(describe_leading(Some(b'{')), "an object");
        assert_eq!(describe_leading(Some(b'7')), "a number");
        assert_eq!(describe_leading(None), "empty input");
    }
}
