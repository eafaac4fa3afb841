//! Structured-text codec
//!
//! Thin wrapper over `serde_json` that turns wire text into a generic tree
//! and back. Knows nothing about envelope kinds.

use serde_json::Value;

use crate::error::ProtocolError;

/// Parse wire text into a tree
///
/// Anything after the final `}` is dropped first; some peers pad frames with
/// trailing bytes.
pub fn parse(text: &str) -> Result<Value, ProtocolError> {
    let text = match text.rfind('}') {
        Some(idx) => &text[..=idx],
        None => text,
    };
    serde_json::from_str(text).map_err(ProtocolError::Parse)
}

/// Render a tree as text, optionally indented
pub fn serialize(tree: &Value, pretty: bool) -> String {
    if pretty {
        format!("{tree:#}")
    } else {
        tree.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_drops_trailing_bytes() {
        let tree = parse("{\"type\":\"x\"}\0\0\r").unwrap();
        assert_eq!(tree, json!({ "type": "x" }));
    }

    #[test]
    fn test_parse_reports_syntax_errors() {
        assert!(matches!(parse("{not json"), Err(ProtocolError::Parse(_))));
        assert!(matches!(parse(""), Err(ProtocolError::Parse(_))));
    }

    #[test]
    fn test_serialize_compact_and_pretty() {
        let tree = json!({ "a": 1 });
        assert_eq!(serialize(&tree, false), "{\"a\":1}");
        assert!(serialize(&tree, true).contains('\n'));
    }
}
