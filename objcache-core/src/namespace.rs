//! Key namespacing for shared buckets.
//!
//! Several caches may share one bucket, so every logical key is stored under
//! its cache's prefix. Both the prefix and the key are percent-encoded before
//! being joined with `/`: encoded segments never contain `/`, which keeps the
//! mapping injective and means the flush scan `"<prefix>/"` can only match
//! objects written through the same prefix.

use std::borrow::Cow;
use std::fmt;

/// Separator between the encoded prefix and the encoded key.
pub const SEPARATOR: char = '/';

/// The physical object name an entry is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoragePath(String);

impl StoragePath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StoragePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Maps logical keys to storage paths under one prefix.
///
/// Deterministic and free of process state: a path computed in one process
/// resolves to the same object in any other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyNamespace {
    prefix: String,
    encoded_prefix: String,
}

impl KeyNamespace {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let encoded_prefix = urlencoding::encode(&prefix).into_owned();
        Self {
            prefix,
            encoded_prefix,
        }
    }

    /// The prefix as configured, before encoding.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Storage path for `key`.
    pub fn path(&self, key: &str) -> StoragePath {
        let encoded_key = urlencoding::encode(key);
        let mut path =
            String::with_capacity(self.encoded_prefix.len() + 1 + encoded_key.len());
        path.push_str(&self.encoded_prefix);
        path.push(SEPARATOR);
        path.push_str(&encoded_key);
        StoragePath(path)
    }

    /// Listing prefix covering every path of this namespace and nothing else.
    pub fn list_prefix(&self) -> String {
        format!("{}{}", self.encoded_prefix, SEPARATOR)
    }

    /// Recover the logical key from a path of this namespace.
    ///
    /// Returns `None` for paths written under another prefix or with an
    /// encoding this namespace would never produce.
    pub fn key_of(&self, path: &str) -> Option<String> {
        let encoded_key = path
            .strip_prefix(self.encoded_prefix.as_str())?
            .strip_prefix(SEPARATOR)?;
        let key = urlencoding::decode(encoded_key).ok()?;
        // Reject non-canonical encodings so key_of stays the inverse of path.
        if urlencoding::encode(&key) != Cow::Borrowed(encoded_key) {
            return None;
        }
        Some(key.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_path() {
        let ns = KeyNamespace::new("frontend");
        assert_eq!(ns.path("page-1").as_str(), "frontend/page-1");
        assert_eq!(ns.list_prefix(), "frontend/");
    }

    #[test]
    fn test_path_is_stable() {
        let a = KeyNamespace::new("sessions");
        let b = KeyNamespace::new("sessions");
        assert_eq!(a.path("user:42"), b.path("user:42"));
    }

    #[test]
    fn test_unsafe_characters_are_encoded() {
        let ns = KeyNamespace::new("pages");
        let path = ns.path("a/b c?d%");
        assert_eq!(path.as_str(), "pages/a%2Fb%20c%3Fd%25");
        assert_eq!(path.as_str().matches(SEPARATOR).count(), 1);
    }

    #[test]
    fn test_prefix_is_encoded() {
        let ns = KeyNamespace::new("team/a");
        assert_eq!(ns.prefix(), "team/a");
        assert_eq!(ns.path("k").as_str(), "team%2Fa/k");
        assert_eq!(ns.list_prefix(), "team%2Fa/");
    }

    #[test]
    fn test_nested_prefix_not_covered_by_parent_scan() {
        let parent = KeyNamespace::new("a");
        let child = KeyNamespace::new("a/b");
        let child_path = child.path("x");
        assert!(!child_path.as_str().starts_with(&parent.list_prefix()));
    }

    #[test]
    fn test_prefix_sharing_start_not_covered() {
        let short = KeyNamespace::new("cache");
        let long = KeyNamespace::new("cache2");
        assert!(!long.path("k").as_str().starts_with(&short.list_prefix()));
    }

    #[test]
    fn test_slash_in_key_does_not_collide_with_prefix() {
        let ns_a = KeyNamespace::new("a");
        let ns_ab = KeyNamespace::new("a/b");
        assert_ne!(ns_a.path("b/c"), ns_ab.path("c"));
    }

    #[test]
    fn test_key_of_inverts_path() {
        let ns = KeyNamespace::new("p");
        for key in ["plain", "with space", "slash/inside", "", "ümlaut", "%41"] {
            let path = ns.path(key);
            assert_eq!(ns.key_of(path.as_str()).as_deref(), Some(key));
        }
    }

    #[test]
    fn test_key_of_foreign_path() {
        let ns = KeyNamespace::new("p");
        assert_eq!(ns.key_of("q/key"), None);
        assert_eq!(ns.key_of("pkey"), None);
        assert_eq!(ns.key_of("p"), None);
    }

    #[test]
    fn test_key_of_rejects_non_canonical_encoding() {
        let ns = KeyNamespace::new("p");
        // "%61" decodes to "a", but path("a") is "p/a".
        assert_eq!(ns.key_of("p/%61"), None);
    }

    #[test]
    fn test_display_matches_as_str() {
        let path = KeyNamespace::new("x").path("y");
        assert_eq!(path.to_string(), "x/y");
        assert_eq!(path.clone().into_string(), "x/y");
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        /// Property: distinct (prefix, key) pairs map to distinct paths.
        #[test]
        fn prop_path_is_injective(
            prefix1 in ".{0,12}",
            prefix2 in ".{0,12}",
            key1 in ".{0,16}",
            key2 in ".{0,16}",
        ) {
            let p1 = KeyNamespace::new(prefix1.clone()).path(&key1);
            let p2 = KeyNamespace::new(prefix2.clone()).path(&key2);
            if prefix1 == prefix2 && key1 == key2 {
                prop_assert_eq!(p1, p2);
            } else {
                prop_assert_ne!(p1, p2, "Different inputs must have different paths");
            }
        }

        /// Property: a path belongs to exactly the namespace that produced it.
        #[test]
        fn prop_list_prefix_scopes_paths(
            prefix1 in ".{0,12}",
            prefix2 in ".{0,12}",
            key in ".{0,16}",
        ) {
            let ns1 = KeyNamespace::new(prefix1.clone());
            let ns2 = KeyNamespace::new(prefix2.clone());
            let path = ns2.path(&key);
            prop_assert_eq!(path.as_str().starts_with(&ns1.list_prefix()), prefix1 == prefix2);
        }

        /// Property: key_of recovers the logical key.
        #[test]
        fn prop_key_of_roundtrip(prefix in ".{0,12}", key in ".{0,16}") {
            let ns = KeyNamespace::new(prefix);
            let path = ns.path(&key);
            prop_assert_eq!(ns.key_of(path.as_str()), Some(key));
        }
    }
}
