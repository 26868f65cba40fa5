//! Per-call metadata.
//!
//! Keys are case-insensitive and stored lowercased, matching how they travel
//! as HTTP headers.

use std::collections::HashMap;

/// Metadata key holding the bearer token.
pub const TOKEN_KEY: &str = "token";

/// String key/value pairs attached to a call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: HashMap<String, String>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any previous one.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .insert(key.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The bearer token, if one is attached.
    pub fn token(&self) -> Option<&str> {
        self.get(TOKEN_KEY)
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_case_insensitive() {
        let md = Metadata::new().with("Token", "abc");
        assert_eq!(md.token(), Some("abc"));
        assert_eq!(md.get("TOKEN"), Some("abc"));
    }

    #[test]
    fn test_missing_token() {
        let md = Metadata::new().with("other", "x");
        assert_eq!(md.token(), None);
        assert!(!md.is_empty());
    }
}
