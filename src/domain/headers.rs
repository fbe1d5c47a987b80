//! Case-insensitive, multi-valued header container.
//!
//! Names are lower-cased on every read and write, so the wire always shows
//! lower-case header names.

use compact_str::CompactString;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderTable {
    entries: Vec<(CompactString, Vec<String>)>,
}

fn normalize(name: &str) -> CompactString {
    let mut name = CompactString::from(name.trim());
    name.make_ascii_lowercase();
    name
}

impl HeaderTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        let name = normalize(name);
        self.entries.iter().position(|(k, _)| *k == name)
    }

    /// Replaces every value stored under `name`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        match self.position(name) {
            Some(idx) => self.entries[idx].1 = vec![value.into()],
            None => self.entries.push((normalize(name), vec![value.into()])),
        }
        self
    }

    /// Appends `value` after the values already stored under `name`.
    pub fn add(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        match self.position(name) {
            Some(idx) => self.entries[idx].1.push(value.into()),
            None => self.entries.push((normalize(name), vec![value.into()])),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.position(name)
            .map(|idx| self.entries[idx].1.as_slice())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Appends all of `other`'s values under each of its names.
    pub fn merge(&mut self, other: &HeaderTable) -> &mut Self {
        for (name, values) in &other.entries {
            for value in values {
                self.add(name, value.as_str());
            }
        }
        self
    }

    /// Like [HeaderTable::merge], but names already present in `self` keep
    /// their own values.
    pub fn merge_missing(&mut self, defaults: &HeaderTable) -> &mut Self {
        for (name, values) in &defaults.entries {
            if !self.contains(name) {
                self.entries.push((name.clone(), values.clone()));
            }
        }
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// One `(name, value)` pair per stored value, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Total number of values, counting repeated headers.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|(_, values)| values.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderTable
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut table = HeaderTable::new();
        for (name, value) in iter {
            table.add(name.as_ref(), value);
        }
        table
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for HeaderTable
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from(value: [(K, V); N]) -> Self {
        value.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_case_insensitive_lookup() {
        let mut headers = HeaderTable::new();
        headers.add("Content-Type", "application/json");

        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(headers.names().collect::<Vec<_>>(), vec!["content-type"]);
    }

    #[test]
    fn success_repeated_values_keep_order() {
        let mut headers = HeaderTable::new();
        headers.add("X-Foo", "1").add("x-foo", "2").add("X-Bar", "3");

        assert_eq!(headers.get_all("X-FOO"), ["1", "2"]);
        assert_eq!(headers.len(), 3);
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec![("x-foo", "1"), ("x-foo", "2"), ("x-bar", "3")]
        );
    }

    #[test]
    fn success_set_replaces_all_values() {
        let mut headers = HeaderTable::new();
        headers.add("x-foo", "1").add("x-foo", "2");
        headers.set("X-Foo", "3");

        assert_eq!(headers.get_all("x-foo"), ["3"]);
        assert_eq!(headers.get_or("x-missing", "none"), "none");
        assert!(headers.get_all("x-missing").is_empty());
    }

    #[test]
    fn success_merge_appends() {
        let mut headers = HeaderTable::from([("x-foo", "1")]);
        let other = HeaderTable::from([("X-Foo", "2"), ("x-bar", "3")]);
        headers.merge(&other);

        assert_eq!(headers.get_all("x-foo"), ["1", "2"]);
        assert_eq!(headers.get("x-bar"), Some("3"));
    }

    #[test]
    fn success_merge_missing_keeps_own_values() {
        let mut headers = HeaderTable::from([("access-control-allow-origin", "example.com")]);
        let defaults = HeaderTable::from([
            ("Access-Control-Allow-Origin", "*"),
            ("Access-Control-Allow-Methods", "*"),
        ]);
        headers.merge_missing(&defaults);

        assert_eq!(headers.get_all("access-control-allow-origin"), ["example.com"]);
        assert_eq!(headers.get("access-control-allow-methods"), Some("*"));
    }
}
