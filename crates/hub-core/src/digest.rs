// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stable one-way digest for storage lookup keys.
//!
//! Every lookup key that embeds a caller-supplied identifier is digested
//! before indexing. This bounds key length and prevents index skew from
//! hostile identifiers; the canonical value is stored alongside the digest.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

/// Digest a caller-supplied identifier into a fixed-length index key.
///
/// SHA-256, URL-safe unpadded base64. The function is pure; equal inputs
/// always produce equal keys.
#[must_use]
pub fn hash(value: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(value.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(hash("zHubId"), hash("zHubId"));
    }

    #[test]
    fn digest_separates_inputs() {
        assert_ne!(hash("zHubA"), hash("zHubB"));
    }

    #[test]
    fn digest_has_fixed_length() {
        // 32 bytes → 43 base64 chars unpadded, regardless of input size.
        assert_eq!(hash("").len(), 43);
        assert_eq!(hash(&"x".repeat(10_000)).len(), 43);
    }

    #[test]
    fn digest_is_url_safe() {
        let d = hash("controller:did:key:z6Mkf5rGMoatrSj1f4CyvuHBeXJELe9RPdzo2PKGNCKVtZxP");
        assert!(d.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
