//! Cache key derivation.
//!
//! A fetch is identified by its class plus its dependency tags. Tags are
//! sorted by name before hashing so map iteration order never changes the key.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

const FIELD_SEPARATOR: u8 = 0x1f;

/// Stable key for a `(class, dependencies)` pair.
///
/// The digest is SHA-256, hex-encoded to 64 characters. Keys are therefore not
/// interchangeable with MD5-derived keys written by other cache clients
/// sharing a backing store.
pub fn cache_key<K, V, S>(class: &str, dependencies: &HashMap<K, V, S>) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut hasher = Sha256::new();
    hasher.update(class.as_bytes());
    for (name, value) in sorted_tags(dependencies) {
        hasher.update([FIELD_SEPARATOR]);
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Index key for one dependency tag.
pub fn tag_key(name: &str, value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(b"=");
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

pub(crate) fn sorted_tags<K, V, S>(dependencies: &HashMap<K, V, S>) -> Vec<(&str, &str)>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut tags: Vec<(&str, &str)> = dependencies
        .iter()
        .map(|(name, value)| (name.as_ref(), value.as_ref()))
        .collect();
    tags.sort_unstable();
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_does_not_matter() {
        let mut forward = HashMap::new();
        let mut backward = HashMap::new();
        let tags = [("user", "42"), ("post", "7"), ("lang", "en"), ("page", "3")];
        for (name, value) in tags {
            forward.insert(name, value);
        }
        for (name, value) in tags.into_iter().rev() {
            backward.insert(name, value);
        }

        assert_eq!(
            cache_key("profile", &forward),
            cache_key("profile", &backward)
        );
    }

    #[test]
    fn class_separates_identical_tags() {
        let deps = HashMap::from([("user", "42")]);
        assert_ne!(cache_key("profile", &deps), cache_key("sidebar", &deps));
    }

    #[test]
    fn tag_boundaries_are_unambiguous() {
        let joined = HashMap::from([("ab", "c")]);
        let split = HashMap::from([("a", "bc")]);
        assert_ne!(cache_key("x", &joined), cache_key("x", &split));
    }

    #[test]
    fn keys_are_hex_digests() {
        let deps: HashMap<String, String> = HashMap::new();
        let key = cache_key("empty", &deps);
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(tag_key("user", "42"), tag_key("user", "42"));
        assert_ne!(tag_key("user", "42"), tag_key("user", "43"));
    }
}
