//! Markdown metadata extraction.
//!
//! A markdown file may start with a JSON object wrapped in an HTML comment:
//!
//! ```text
//! <!--
//! {
//!   "title": "Hello World"
//! }
//! -->
//! # Hello World
//! ```
//!
//! The comment must be the very first thing in the file. Everything after the
//! closing `-->` is the body, minus the rest of the marker line: trailing
//! spaces or tabs and a single newline. A file that does not start with
//! `<!--` has no metadata and its whole content is the body.
//!
//! Because the block is an HTML comment, files stay valid markdown for
//! editors and previewers that know nothing about the convention.

use serde_json::{Map, Value};
use thiserror::Error;

const OPEN: &[u8] = b"<!--";
const CLOSE: &[u8] = b"-->";

/// Arbitrary key-value metadata attached to a markdown file.
pub type Metadata = Map<String, Value>;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("no closing --> to end metadata")]
    Unterminated,
    #[error("error decoding metadata: {0}")]
    Json(#[from] serde_json::Error),
}

/// Split raw file content into optional metadata and the remaining body.
pub fn split_metadata(content: &[u8]) -> Result<(Option<Metadata>, &[u8]), MetadataError> {
    let Some(rest) = content.strip_prefix(OPEN) else {
        return Ok((None, content));
    };
    let end = find(rest, CLOSE).ok_or(MetadataError::Unterminated)?;
    let metadata: Metadata = serde_json::from_slice(&rest[..end])?;
    let body = strip_marker_line(&rest[end + CLOSE.len()..]);
    Ok((Some(metadata), body))
}

/// Drop what is left of the closing marker's line, if it is only blanks.
fn strip_marker_line(body: &[u8]) -> &[u8] {
    let blanks = body
        .iter()
        .take_while(|&&b| b == b' ' || b == b'\t')
        .count();
    let after = &body[blanks..];
    if let Some(rest) = after.strip_prefix(b"\r\n") {
        rest
    } else if let Some(rest) = after.strip_prefix(b"\n") {
        rest
    } else if after.is_empty() {
        after
    } else {
        body
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn no_marker_means_whole_body() {
        let (meta, body) = split_metadata(b"# Title\n\nText").unwrap();
        assert!(meta.is_none());
        assert_eq!(body, b"# Title\n\nText");
    }

    #[test]
    fn metadata_and_body() {
        let (meta, body) = split_metadata(b"<!--{\"title\":\"X\"}-->\nBody").unwrap();
        assert_eq!(Value::Object(meta.unwrap()), json!({"title": "X"}));
        assert_eq!(body, b"Body");
    }

    #[test]
    fn trailing_blanks_on_marker_line_dropped() {
        let (meta, body) = split_metadata(b"<!--{\"title\":\"X\"}--> \nBody").unwrap();
        assert_eq!(Value::Object(meta.unwrap()), json!({"title": "X"}));
        assert_eq!(body, b"Body");
    }

    #[test]
    fn only_one_newline_stripped() {
        let (_, body) = split_metadata(b"<!--{}-->\n\nBody\n").unwrap();
        assert_eq!(body, b"\nBody\n");
    }

    #[test]
    fn crlf_newline_stripped() {
        let (_, body) = split_metadata(b"<!--{}-->\r\nBody").unwrap();
        assert_eq!(body, b"Body");
    }

    #[test]
    fn text_on_marker_line_kept() {
        let (_, body) = split_metadata(b"<!--{}--> Body").unwrap();
        assert_eq!(body, b" Body");
    }

    #[test]
    fn multiline_json() {
        let input = b"<!--\n{\n  \"title\": \"Hello World\",\n  \"tags\": [\"a\", \"b\"]\n}\n-->\n# Hello";
        let (meta, body) = split_metadata(input).unwrap();
        let meta = meta.unwrap();
        assert_eq!(meta["title"], json!("Hello World"));
        assert_eq!(meta["tags"], json!(["a", "b"]));
        assert_eq!(body, b"# Hello");
    }

    #[test]
    fn empty_body_after_metadata() {
        let (meta, body) = split_metadata(b"<!--{\"a\":1}-->").unwrap();
        assert!(meta.is_some());
        assert!(body.is_empty());
    }

    #[test]
    fn unterminated_is_error() {
        let result = split_metadata(b"<!--{\"title\":\"X\"}\nBody");
        assert!(matches!(result, Err(MetadataError::Unterminated)));
    }

    #[test]
    fn invalid_json_is_error() {
        let result = split_metadata(b"<!-- just a comment -->\nBody");
        assert!(matches!(result, Err(MetadataError::Json(_))));
    }

    #[test]
    fn non_object_json_is_error() {
        let result = split_metadata(b"<!--[1, 2]-->\nBody");
        assert!(matches!(result, Err(MetadataError::Json(_))));
    }

    #[test]
    fn marker_must_be_first() {
        let (meta, body) = split_metadata(b"\n<!--{}-->\nBody").unwrap();
        assert!(meta.is_none());
        assert_eq!(body, b"\n<!--{}-->\nBody");
    }
}
