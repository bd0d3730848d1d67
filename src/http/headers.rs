//! HTTP header map with case-insensitive name lookup.
//!
//! HTTP headers are order-preserving and case-insensitive per [RFC 9110 §5].

/// A case-insensitive, multi-value HTTP header map.
///
/// Preserves insertion order and allows multiple values per header name,
/// matching the semantics of HTTP/1.1 header fields (RFC 9110 §5.3). Cached
/// responses keep their full header map, so duplicates such as `Set-Cookie`
/// survive a round-trip through the store.
///
/// # Examples
///
/// ```
/// use shellac::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Cache-Control", "public, max-age=60");
/// headers.insert("X-Custom", "first");
/// headers.insert("X-Custom", "second");
///
/// assert_eq!(headers.get("cache-control"), Some("public, max-age=60"));
/// let all: Vec<_> = headers.get_all("x-custom").collect();
/// assert_eq!(all, vec!["first", "second"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header entry. Multiple values for the same name are preserved.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the first value for the given header name (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns an iterator over all values for the given header name (case-insensitive).
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.inner
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the combined field value for the given name: every entry
    /// joined with `", "` in insertion order (RFC 9110 §5.2), or `None` if
    /// no entry exists.
    ///
    /// List-typed headers such as `Cache-Control` must be read in this form;
    /// a directive split across repeated entries is equivalent to one
    /// comma-separated entry.
    pub fn combined(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self.get_all(name).collect();
        if values.is_empty() {
            return None;
        }
        Some(values.join(", "))
    }

    /// Returns `true` if the map contains at least one entry with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Returns the total number of header entries (not unique names).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no header entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_get() {
        let mut h = Headers::new();
        h.insert("Cache-Control", "public, max-age=60");
        assert_eq!(h.get("cache-control"), Some("public, max-age=60"));
        assert_eq!(h.get("CACHE-CONTROL"), Some("public, max-age=60"));
        assert_eq!(h.get("Cache-Control"), Some("public, max-age=60"));
    }

    #[test]
    fn first_value_wins_for_get() {
        let mut h = Headers::new();
        h.insert("X-Version", "1");
        h.insert("X-Version", "2");
        assert_eq!(h.get("x-version"), Some("1"));
    }

    #[test]
    fn multi_value() {
        let mut h = Headers::new();
        h.insert("Set-Cookie", "a=1");
        h.insert("Set-Cookie", "b=2");
        let vals: Vec<_> = h.get_all("set-cookie").collect();
        assert_eq!(vals, vec!["a=1", "b=2"]);
    }

    #[test]
    fn combined_joins_entries_in_insertion_order() {
        let mut h = Headers::new();
        assert_eq!(h.combined("cache-control"), None);

        h.insert("Cache-Control", "max-age=60");
        assert_eq!(h.combined("cache-control"), Some("max-age=60".to_owned()));

        h.insert("Cache-Control", "private");
        assert_eq!(
            h.combined("cache-control"),
            Some("max-age=60, private".to_owned())
        );
    }

    #[test]
    fn contains() {
        let mut h = Headers::new();
        h.insert("Content-Type", "application/json");
        assert!(h.contains("content-type"));
        assert!(!h.contains("x-missing"));
    }

    #[test]
    fn clone_is_independent() {
        let mut h = Headers::new();
        h.insert("X-A", "1");
        let mut copy = h.clone();
        copy.insert("X-B", "2");
        assert_eq!(h.len(), 1);
        assert_eq!(copy.len(), 2);
    }
}
