//! This module provides a deterministic hasher and `HashMap` and `HashSet` variants that use
//! it. The hashing data structures in the standard library are not deterministic:
//!
//! > By default, HashMap uses a hashing algorithm selected to provide
//! > resistance against HashDoS attacks. The algorithm is randomly seeded, and a
//! > reasonable best-effort is made to generate this seed from a high quality,
//! > secure source of randomness provided by the host without blocking the program.
//!
//! Reproducible runs need every map we iterate to behave the same across processes, so the
//! crate uses the `rustc-hash` variants throughout. Use `HashMap::default()` to create one.
//!
//! The `hash_str` and `hash_keys` free functions are used to derive random number streams
//! in `crate::random`.

use xxhash_rust::xxh3::xxh3_64;

pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

/// A convenience method to compute the hash of a `&str`.
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}

/// Hashes a sequence of integer keys as their little-endian byte representation.
pub fn hash_keys(keys: &[u64]) -> u64 {
    let bytes: Vec<u8> = keys.iter().flat_map(|key| key.to_le_bytes()).collect();
    xxh3_64(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_strings() {
        let a = hash_str("hello");
        let b = hash_str("hello");
        let c = hash_str("world");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn key_order_matters() {
        assert_eq!(hash_keys(&[1, 2, 3]), hash_keys(&[1, 2, 3]));
        assert_ne!(hash_keys(&[1, 2, 3]), hash_keys(&[3, 2, 1]));
    }
}
