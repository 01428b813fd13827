use indexmap::IndexMap;
use url::form_urlencoded;

/// Multi-valued beacon parameters in arrival order.
///
/// A key maps to zero, one or many values. Keys are compared exactly (case-sensitive).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    entries: IndexMap<String, Vec<String>>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an `application/x-www-form-urlencoded` payload or a raw query string.
    pub fn from_urlencoded(input: &[u8]) -> Self {
        form_urlencoded::parse(input)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Form body values first, then query values appended under the same key.
    pub fn merge(body: ParameterSet, query: ParameterSet) -> Self {
        let mut merged = body;
        for (key, values) in query.entries {
            merged.entries.entry(key).or_default().extend(values);
        }
        merged
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .entry(key.into())
            .or_default()
            .push(value.into());
    }

    /// Registers `key` as present without any value.
    pub fn insert_empty(&mut self, key: impl Into<String>) {
        self.entries.entry(key.into()).or_default();
    }

    pub fn values(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.values(key)?.first().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// True when `key` carries at least one value.
    pub fn has_values(&self, key: &str) -> bool {
        self.values(key).is_some_and(|v| !v.is_empty())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ParameterSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = ParameterSet::new();
        for (k, v) in iter {
            set.push(k, v);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_keys_in_order() {
        let params = ParameterSet::from_urlencoded(b"cd1=a&v=1&cd1=b+c&dp=%2Fhome");
        assert_eq!(params.keys().collect::<Vec<_>>(), vec!["cd1", "v", "dp"]);
        assert_eq!(
            params.values("cd1"),
            Some(&["a".to_string(), "b c".to_string()][..])
        );
        assert_eq!(params.first("dp"), Some("/home"));
    }

    #[test]
    fn bare_key_is_present_with_empty_value() {
        let params = ParameterSet::from_urlencoded(b"t&v=");
        assert_eq!(params.first("t"), Some(""));
        assert_eq!(params.first("v"), Some(""));
        assert!(params.has_values("t"));
    }

    #[test]
    fn merge_puts_body_values_before_query_values() {
        let body = ParameterSet::from_urlencoded(b"dp=%2Fbody&t=event");
        let query = ParameterSet::from_urlencoded(b"dp=%2Fquery&v=1");
        let merged = ParameterSet::merge(body, query);

        assert_eq!(
            merged.values("dp"),
            Some(&["/body".to_string(), "/query".to_string()][..])
        );
        assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["dp", "t", "v"]);
    }

    #[test]
    fn empty_entry_is_present_but_has_no_values() {
        let mut params = ParameterSet::new();
        params.insert_empty("cid");
        assert!(params.contains("cid"));
        assert!(!params.has_values("cid"));
        assert_eq!(params.first("cid"), None);
    }

    #[test]
    fn keys_are_case_sensitive() {
        let params: ParameterSet = [("TID", "UA-1")].into_iter().collect();
        assert!(params.contains("TID"));
        assert!(!params.contains("tid"));
    }
}
