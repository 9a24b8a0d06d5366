use std::collections::HashMap;

use crate::chat::message::StreamSessionId;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Normalized identity of a submitted query.
///
/// 64-bit FNV-1a over the trimmed text. Not cryptographic; two texts that
/// collide are treated as the same query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryKey(pub u64);

impl QueryKey {
    pub fn from_text(text: &str) -> Self {
        let hash = text
            .trim()
            .bytes()
            .fold(FNV_OFFSET_BASIS, |hash, byte| {
                (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
            });
        Self(hash)
    }
}

/// Query keys currently in flight, each attributed to the session streaming it.
#[derive(Debug, Clone, Default)]
pub struct ActiveQueries {
    entries: HashMap<QueryKey, StreamSessionId>,
}

impl ActiveQueries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: QueryKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Registers `key` for `session_id`. Returns false if the key is already active.
    pub fn try_register(&mut self, key: QueryKey, session_id: StreamSessionId) -> bool {
        if self.contains(key) {
            return false;
        }
        self.entries.insert(key, session_id);
        true
    }

    /// Releases `key` only if it is still attributed to `session_id`.
    pub fn release(&mut self, key: QueryKey, session_id: StreamSessionId) -> bool {
        if self.entries.get(&key) != Some(&session_id) {
            return false;
        }
        self.entries.remove(&key);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_surrounding_whitespace_only() {
        assert_eq!(QueryKey::from_text("  hello  "), QueryKey::from_text("hello"));
        assert_ne!(QueryKey::from_text("hello"), QueryKey::from_text("Hello"));
        assert_ne!(QueryKey::from_text("ab"), QueryKey::from_text("ba"));
    }

    #[test]
    fn key_matches_reference_fnv1a() {
        assert_eq!(QueryKey::from_text("").0, FNV_OFFSET_BASIS);
        assert_eq!(QueryKey::from_text("a").0, 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn registry_is_single_flight_per_key() {
        let mut queries = ActiveQueries::new();
        let key = QueryKey::from_text("weather?");

        assert!(queries.try_register(key, StreamSessionId::new(1)));
        assert!(!queries.try_register(key, StreamSessionId::new(2)));
        assert_eq!(queries.len(), 1);

        assert!(!queries.release(key, StreamSessionId::new(2)));
        assert!(queries.contains(key));
        assert!(queries.release(key, StreamSessionId::new(1)));
        assert!(queries.is_empty());
    }
}
