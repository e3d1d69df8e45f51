//! HTTP header map with case-insensitive name lookup.
//!
//! Header fields are order-preserving and multi-valued per RFC 9110 §5: the
//! serializer writes entries back in insertion order and never merges
//! duplicates, so `Set-Cookie` and friends survive a round trip intact.

use std::fmt;

/// A case-insensitive, multi-value HTTP header map.
///
/// Lookup ignores ASCII case; iteration yields entries in insertion order.
/// Duplicate names are kept as separate entries rather than being joined
/// with commas.
///
/// # Examples
///
/// ```
/// use portcullis::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Allow", "GET, HEAD");
/// headers.insert("Set-Cookie", "SESSIONID=abc");
/// headers.insert("Set-Cookie", "theme=dark");
///
/// assert_eq!(headers.get("allow"), Some("GET, HEAD"));
/// assert_eq!(headers.get_all("set-cookie").count(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header map with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Appends a header entry, preserving any existing entries with the
    /// same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Returns the first value for `name` (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns all values for `name` (case-insensitive) in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if at least one entry with `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Returns the number of entries (duplicates counted individually).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Headers {
    /// Writes every entry as a `name: value\r\n` wire line, in insertion
    /// order, duplicates as repeated lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}
