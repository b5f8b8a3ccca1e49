//! Document paths.
//!
//! A [`Path`] addresses a location inside a document as an ordered sequence
//! of string segments. Textually a path is rendered like a JSON Pointer
//! ([RFC 6901](https://tools.ietf.org/html/rfc6901)): segments joined by `/`,
//! with `~` escaped as `~0` and `/` escaped as `~1`.
//!
//! # Example
//!
//! ```
//! use dbz_path::Path;
//!
//! let path = Path::parse("/contacts/0/first~1last", true);
//! assert_eq!(path.size(), 3);
//! assert_eq!(path.segment(2), Some("first/last"));
//! assert_eq!(path.to_string(), "/contacts/0/first~1last");
//!
//! let parent = path.parent().unwrap();
//! assert_eq!(parent, Path::parse("contacts/0", true));
//! ```

use thiserror::Error;

mod path;
pub use path::{Path, Segments};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("INVALID_SEGMENT_INDEX: {index} (size {size})")]
    InvalidSegmentIndex { index: usize, size: usize },
    #[error("INVALID_SUBPATH_LENGTH: {length} (size {size})")]
    InvalidSubpathLength { length: usize, size: usize },
}

/// Unescapes a path segment.
///
/// `~1` is replaced with `/` and then `~0` is replaced with `~`.
///
/// ```
/// use dbz_path::unescape_segment;
///
/// assert_eq!(unescape_segment("a~0b"), "a~b");
/// assert_eq!(unescape_segment("c~1d"), "c/d");
/// assert_eq!(unescape_segment("~01"), "~1");
/// ```
pub fn unescape_segment(segment: &str) -> String {
    if !segment.contains('~') {
        return segment.to_string();
    }
    // Order matters: ~1 must be replaced before ~0
    segment.replace("~1", "/").replace("~0", "~")
}

/// Escapes a path segment.
///
/// ```
/// use dbz_path::escape_segment;
///
/// assert_eq!(escape_segment("a~b"), "a~0b");
/// assert_eq!(escape_segment("c/d"), "c~1d");
/// ```
pub fn escape_segment(segment: &str) -> String {
    if !segment.contains('/') && !segment.contains('~') {
        return segment.to_string();
    }
    // Order matters: ~ must be escaped before /
    segment.replace('~', "~0").replace('/', "~1")
}

/// Parses a segment as a non-negative array index.
///
/// Leading zeros are rejected, as are signs and anything that is not an
/// ASCII digit.
///
/// ```
/// use dbz_path::parse_index;
///
/// assert_eq!(parse_index("0"), Some(0));
/// assert_eq!(parse_index("12"), Some(12));
/// assert_eq!(parse_index("012"), None);
/// assert_eq!(parse_index("-1"), None);
/// ```
pub fn parse_index(segment: &str) -> Option<usize> {
    let bytes = segment.as_bytes();
    if bytes.is_empty() || (bytes.len() > 1 && bytes[0] == b'0') {
        return None;
    }
    if !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    segment.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_roundtrip() {
        for raw in ["", "plain", "a/b", "a~b", "~1", "/~/", "~0~1"] {
            assert_eq!(unescape_segment(&escape_segment(raw)), raw);
        }
    }

    #[test]
    fn unescape_is_ordered() {
        // "~01" must become "~1", not "/"
        assert_eq!(unescape_segment("~01"), "~1");
    }

    #[test]
    fn index_parsing() {
        assert_eq!(parse_index("7"), Some(7));
        assert_eq!(parse_index(""), None);
        assert_eq!(parse_index("00"), None);
        assert_eq!(parse_index("1.5"), None);
        assert_eq!(parse_index("-"), None);
    }
}
