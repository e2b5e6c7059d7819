// SPDX-License-Identifier: MIT OR Apache-2.0
//! did:key resolution to Ed25519 verification keys.
//!
//! The loader natively understands `did:key:` URLs carrying an Ed25519
//! public key (multicodec `0xed 0x01` behind a multibase `z`). Any other
//! scheme is refused unless a key was explicitly whitelisted on the
//! resolver. Resolution failures are uniform `NotAllowedError`s.

use ed25519_dalek::VerifyingKey;
use hub_error::{HubError, HubResult};
use std::collections::HashMap;

/// Multicodec prefix for an Ed25519 public key.
const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

/// A resolved verification method.
#[derive(Debug, Clone)]
pub struct ResolvedKey {
    /// The full key URL (with fragment).
    pub id: String,
    /// The controlling principal — for did:key, the DID itself.
    pub controller: String,
    /// The Ed25519 public key.
    pub key: VerifyingKey,
}

/// Resolves a signature `keyId` to a verification key.
pub trait KeyResolver: Send + Sync {
    /// Resolve `key_id` or fail with a uniform authorization error.
    fn resolve(&self, key_id: &str) -> HubResult<ResolvedKey>;
}

/// The default resolver: did:key natively, plus an explicit whitelist for
/// keys under other schemes.
#[derive(Default)]
pub struct DidKeyResolver {
    whitelist: HashMap<String, ResolvedKey>,
}

impl DidKeyResolver {
    /// A resolver that accepts did:key URLs only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whitelist a key under a non-did:key URL.
    pub fn whitelist(&mut self, resolved: ResolvedKey) {
        self.whitelist.insert(resolved.id.clone(), resolved);
    }
}

impl KeyResolver for DidKeyResolver {
    fn resolve(&self, key_id: &str) -> HubResult<ResolvedKey> {
        if let Some(resolved) = self.whitelist.get(key_id) {
            return Ok(resolved.clone());
        }
        resolve_did_key(key_id)
    }
}

/// Decode a `did:key:z...` URL (optionally with fragment) into a key.
pub fn resolve_did_key(key_id: &str) -> HubResult<ResolvedKey> {
    let did = key_id.split('#').next().unwrap_or(key_id);
    let encoded = did
        .strip_prefix("did:key:z")
        .ok_or_else(HubError::not_allowed)?;

    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|_| HubError::not_allowed())?;
    if bytes.len() != 2 + 32 || bytes[..2] != ED25519_MULTICODEC {
        return Err(HubError::not_allowed());
    }

    let mut raw = [0u8; 32];
    raw.copy_from_slice(&bytes[2..]);
    let key = VerifyingKey::from_bytes(&raw).map_err(|_| HubError::not_allowed())?;

    Ok(ResolvedKey {
        id: key_id.to_owned(),
        controller: did.to_owned(),
        key,
    })
}

/// Encode an Ed25519 public key as a `did:key` DID.
#[must_use]
pub fn did_key_for(key: &VerifyingKey) -> String {
    let mut bytes = Vec::with_capacity(2 + 32);
    bytes.extend_from_slice(&ED25519_MULTICODEC);
    bytes.extend_from_slice(key.as_bytes());
    format!("did:key:z{}", bs58::encode(bytes).into_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand_core::OsRng;

    fn fresh_key() -> VerifyingKey {
        SigningKey::generate(&mut OsRng).verifying_key()
    }

    #[test]
    fn did_key_roundtrip() {
        let key = fresh_key();
        let did = did_key_for(&key);
        let resolved = resolve_did_key(&did).unwrap();
        assert_eq!(resolved.key, key);
        assert_eq!(resolved.controller, did);
    }

    #[test]
    fn fragment_is_stripped_for_controller() {
        let key = fresh_key();
        let did = did_key_for(&key);
        let url = format!("{did}#{}", &did["did:key:".len()..]);
        let resolved = resolve_did_key(&url).unwrap();
        assert_eq!(resolved.controller, did);
        assert_eq!(resolved.id, url);
    }

    #[test]
    fn non_did_key_scheme_refused() {
        let err = resolve_did_key("https://keys.example/k1").unwrap_err();
        assert_eq!(err.kind, hub_error::ErrorKind::NotAllowedError);
    }

    #[test]
    fn wrong_multicodec_refused() {
        // X25519 multicodec (0xec 0x01) instead of Ed25519.
        let mut bytes = vec![0xec, 0x01];
        bytes.extend_from_slice(&[7u8; 32]);
        let did = format!("did:key:z{}", bs58::encode(bytes).into_string());
        assert!(resolve_did_key(&did).is_err());
    }

    #[test]
    fn truncated_key_refused() {
        let mut bytes = vec![0xed, 0x01];
        bytes.extend_from_slice(&[7u8; 16]);
        let did = format!("did:key:z{}", bs58::encode(bytes).into_string());
        assert!(resolve_did_key(&did).is_err());
    }

    #[test]
    fn whitelisted_url_resolves() {
        let key = fresh_key();
        let mut resolver = DidKeyResolver::new();
        resolver.whitelist(ResolvedKey {
            id: "https://keys.example/k1".into(),
            controller: "https://keys.example/owner".into(),
            key,
        });
        let resolved = resolver.resolve("https://keys.example/k1").unwrap();
        assert_eq!(resolved.controller, "https://keys.example/owner");
        assert!(resolver.resolve("https://keys.example/k2").is_err());
    }
}
