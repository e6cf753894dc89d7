//! SHA-256 helpers for artifact sealing.
//!
//! The aggregate digest is called a "merkle root" in manifests for
//! compatibility, but it is a flat hash: the per-artifact hex digests are
//! sorted, concatenated and hashed once. Sorting makes the result independent
//! of artifact enumeration order.

use sha2::{Digest, Sha256};

/// Prefix carried by `merkle_root` in persisted manifests.
pub const MERKLE_ROOT_PREFIX: &str = "SHA256:";

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Hash of the lexicographically sorted, separator-free concatenation of
/// `digests`.
pub fn aggregate_root<S: AsRef<str>>(digests: &[S]) -> String {
    let mut sorted: Vec<&str> = digests.iter().map(|d| d.as_ref()).collect();
    sorted.sort_unstable();
    sha256_hex(sorted.concat().as_bytes())
}

pub fn format_merkle_root(root_hex: &str) -> String {
    format!("{}{}", MERKLE_ROOT_PREFIX, root_hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_aggregate_root_order_independent() {
        let a = sha256_hex(b"kpis");
        let b = sha256_hex(b"explain");
        let c = sha256_hex(b"source");
        let forward = aggregate_root(&[a.clone(), b.clone(), c.clone()]);
        let reversed = aggregate_root(&[c.clone(), a.clone(), b.clone()]);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_aggregate_root_is_hash_of_sorted_concat() {
        let digests = ["ff", "00", "aa"];
        assert_eq!(aggregate_root(&digests), sha256_hex(b"00aaff"));
    }

    #[test]
    fn test_aggregate_root_sensitive_to_members() {
        let a = aggregate_root(&[sha256_hex(b"one"), sha256_hex(b"two")]);
        let b = aggregate_root(&[sha256_hex(b"one"), sha256_hex(b"twO")]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_format_merkle_root() {
        assert_eq!(format_merkle_root("abc"), "SHA256:abc");
    }
}
