//! Dotted-path lookups into JSON payloads.
//!
//! `"data.hashtag.edge_hashtag_to_media.edges"` walks object keys; a numeric
//! segment indexes into an array; the empty path is the root.

use serde::Deserialize;
use serde_json::Value;

/// Resolves `path` inside `value`.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Resolves `path` and renders the value as an identifier string.
///
/// Strings are returned as-is, numbers in their decimal form; anything else
/// is not an identifier.
pub fn lookup_id(value: &Value, path: &str) -> Option<String> {
    match lookup(value, path)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Pagination metadata found at a page-info path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

impl PageInfo {
    /// Reads the page info at `path`; a missing or malformed value is `None`.
    pub fn at(value: &Value, path: &str) -> Option<Self> {
        lookup(value, path).and_then(|v| Self::deserialize(v).ok())
    }

    /// A next page exists only when flagged and a non-empty cursor is present.
    pub fn has_more(&self) -> bool {
        self.has_next_page
            && self
                .end_cursor
                .as_deref()
                .is_some_and(|cursor| !cursor.is_empty())
    }
}
