//! Cache key derivation.
//!
//! A response key hashes the namespace, the full request path (including the
//! query string), the current generation token and the code version. Bumping
//! the generation therefore makes every earlier key unreachable.

use sha2::{Digest, Sha256};

/// Store key holding the current generation token.
pub const GENERATION_KEY: &str = "cache:generation";

const RESPONSE_PREFIX: &str = "response:";
const LOCK_PREFIX: &str = "lock:";

/// Keys the cache coordinates through rather than responses: the generation
/// token and refresh locks.
pub(crate) fn is_control_key(key: &str) -> bool {
    key == GENERATION_KEY || key.starts_with(LOCK_PREFIX)
}
const SEPARATOR: [u8; 1] = [0x1f];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    digest: String,
}

impl CacheKey {
    pub fn derive(namespace: &str, path: &str, generation: &str, code_version: &str) -> Self {
        let mut hasher = Sha256::new();
        for (index, part) in [namespace, path, generation, code_version]
            .into_iter()
            .enumerate()
        {
            if index > 0 {
                hasher.update(SEPARATOR);
            }
            hasher.update(part.as_bytes());
        }
        Self {
            digest: hex::encode(hasher.finalize()),
        }
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Key under which the entry is stored.
    pub fn entry_key(&self) -> String {
        format!("{RESPONSE_PREFIX}{}", self.digest)
    }

    /// Key of the single-flight refresh lock for this entry.
    pub fn lock_key(&self) -> String {
        format!("{LOCK_PREFIX}{}", self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_changes_the_key() {
        let before = CacheKey::derive("items", "/api/items/?type=all", "g1", "0.1.0");
        let after = CacheKey::derive("items", "/api/items/?type=all", "g2", "0.1.0");
        assert_ne!(before, after);
        assert_eq!(
            before,
            CacheKey::derive("items", "/api/items/?type=all", "g1", "0.1.0")
        );
    }

    #[test]
    fn parts_do_not_run_together() {
        let a = CacheKey::derive("ab", "c", "g", "v");
        let b = CacheKey::derive("a", "bc", "g", "v");
        assert_ne!(a, b);
    }

    #[test]
    fn entry_and_lock_keys_share_the_digest() {
        let key = CacheKey::derive("tags", "/api/tags/", "g", "v");
        assert_eq!(key.digest().len(), 64);
        assert_eq!(key.entry_key(), format!("response:{}", key.digest()));
        assert_eq!(key.lock_key(), format!("lock:{}", key.digest()));
    }
}
