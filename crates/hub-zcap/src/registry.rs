// SPDX-License-Identifier: MIT OR Apache-2.0
//! Root-capability materialization and delegated-capability storage.
//!
//! Root capabilities are a pure function of `(url, HubConfig)`. Persisting
//! one is a bug: the document reflects live configuration and must
//! re-materialize on every request.

use hub_core::{id, Capability, HubConfig, SECURITY_CONTEXT_V2};
use hub_error::{HubError, HubResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

// ---------------------------------------------------------------------------
// RootCapabilityRegistry
// ---------------------------------------------------------------------------

/// Materializes root capabilities for the canonical invocation targets of a
/// hub: `documents`, `query`, `authorizations`, and `documents/<docId>`.
#[derive(Debug, Clone)]
pub struct RootCapabilityRegistry {
    base_url: String,
}

impl RootCapabilityRegistry {
    /// A registry serving capabilities under `base_url` (no trailing slash).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Extract the hub id from a root capability URL, if it is one.
    #[must_use]
    pub fn hub_id_of(&self, url: &str) -> Option<String> {
        let rest = url.strip_prefix(&format!("{}/data-hubs/", self.base_url))?;
        let (hub_id, rest) = rest.split_once('/')?;
        rest.strip_prefix("zcaps/")?;
        Some(hub_id.to_owned())
    }

    /// Materialize the root capability for `url` from the hub's config.
    ///
    /// Returns `None` for any URL outside the supported suffix grammar; the
    /// verifier then falls back to the delegated store.
    #[must_use]
    pub fn materialize(&self, url: &str, config: &HubConfig) -> Option<Capability> {
        let rest = url.strip_prefix(&format!("{}/data-hubs/", self.base_url))?;
        let (hub_id, rest) = rest.split_once('/')?;
        if hub_id != config.id {
            return None;
        }
        let suffix = rest.strip_prefix("zcaps/")?;

        let supported = match suffix {
            "documents" | "query" | "authorizations" => true,
            _ => match suffix.strip_prefix("documents/") {
                Some(doc_id) => {
                    !doc_id.contains('/') && id::validate(doc_id).is_ok()
                }
                None => false,
            },
        };
        if !supported {
            return None;
        }

        Some(Capability {
            context: SECURITY_CONTEXT_V2.into(),
            id: url.to_owned(),
            invocation_target: format!("{}/data-hubs/{hub_id}/{suffix}", self.base_url),
            controller: Some(config.controller.clone()),
            invoker: config.invoker.clone(),
            delegator: config.delegator.clone(),
            parent_capability: None,
            allowed_action: None,
            proof: None,
        })
    }
}

// ---------------------------------------------------------------------------
// DelegationStore
// ---------------------------------------------------------------------------

struct StoredDelegation {
    /// The holder (invoker) the capability was stored for.
    controller: String,
    capability: Capability,
}

/// Verbatim storage for delegated capabilities, keyed by capability id with
/// `controller` and `invocationTarget` as lookup keys.
///
/// Callers verify the delegation before inserting and root-delegator status
/// before removing; the store itself only enforces key uniqueness.
#[derive(Clone, Default)]
pub struct DelegationStore {
    inner: Arc<RwLock<HashMap<String, StoredDelegation>>>,
}

impl DelegationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a delegated capability for its holder.
    pub async fn insert(&self, controller: &str, capability: Capability) -> HubResult<()> {
        let mut state = self.inner.write().await;
        if state.contains_key(&capability.id) {
            return Err(HubError::duplicate("authorization already exists"));
        }
        state.insert(capability.id.clone(), StoredDelegation {
            controller: controller.to_owned(),
            capability,
        });
        Ok(())
    }

    /// Fetch by capability id, constrained to an invocation target.
    pub async fn get(&self, capability_id: &str, invocation_target: &str) -> Option<Capability> {
        let state = self.inner.read().await;
        state
            .get(capability_id)
            .filter(|s| s.capability.invocation_target == invocation_target)
            .map(|s| s.capability.clone())
    }

    /// Fetch by capability id alone.
    pub async fn get_by_id(&self, capability_id: &str) -> Option<Capability> {
        let state = self.inner.read().await;
        state.get(capability_id).map(|s| s.capability.clone())
    }

    /// All capabilities stored for a holder.
    pub async fn find_by_controller(&self, controller: &str) -> Vec<Capability> {
        let state = self.inner.read().await;
        let mut out: Vec<Capability> = state
            .values()
            .filter(|s| s.controller == controller)
            .map(|s| s.capability.clone())
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Remove by capability id. Returns whether anything was removed.
    pub async fn remove(&self, capability_id: &str) -> bool {
        let mut state = self.inner.write().await;
        state.remove(capability_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::{KeyDescription, OneOrMany};

    const BASE: &str = "https://hub.example";

    fn config(hub_id: &str) -> HubConfig {
        HubConfig {
            id: hub_id.into(),
            sequence: 0,
            controller: "did:key:zCtrl".into(),
            invoker: Some(OneOrMany::One("did:key:zInvoker".into())),
            delegator: None,
            reference_id: None,
            key_agreement_key: KeyDescription {
                id: "did:key:zKak#zKak".into(),
                kind: "X25519KeyAgreementKey2019".into(),
            },
            hmac: KeyDescription {
                id: "did:key:zHmac#zHmac".into(),
                kind: "Sha256HmacKey2019".into(),
            },
        }
    }

    #[test]
    fn materializes_collection_suffixes() {
        let registry = RootCapabilityRegistry::new(BASE);
        let hub = id::generate();
        let config = config(&hub);

        for suffix in ["documents", "query", "authorizations"] {
            let url = format!("{BASE}/data-hubs/{hub}/zcaps/{suffix}");
            let cap = registry.materialize(&url, &config).unwrap();
            assert_eq!(cap.id, url);
            assert_eq!(
                cap.invocation_target,
                format!("{BASE}/data-hubs/{hub}/{suffix}")
            );
            assert_eq!(cap.controller.as_deref(), Some("did:key:zCtrl"));
            assert!(cap.proof.is_none());
        }
    }

    #[test]
    fn materializes_document_suffix_with_valid_id() {
        let registry = RootCapabilityRegistry::new(BASE);
        let hub = id::generate();
        let doc = id::generate();
        let config = config(&hub);

        let url = format!("{BASE}/data-hubs/{hub}/zcaps/documents/{doc}");
        let cap = registry.materialize(&url, &config).unwrap();
        assert_eq!(
            cap.invocation_target,
            format!("{BASE}/data-hubs/{hub}/documents/{doc}")
        );
    }

    #[test]
    fn rejects_invalid_document_id() {
        let registry = RootCapabilityRegistry::new(BASE);
        let hub = id::generate();
        let config = config(&hub);

        let url = format!("{BASE}/data-hubs/{hub}/zcaps/documents/not-an-id");
        assert!(registry.materialize(&url, &config).is_none());
    }

    #[test]
    fn rejects_unknown_suffixes_and_foreign_urls() {
        let registry = RootCapabilityRegistry::new(BASE);
        let hub = id::generate();
        let config = config(&hub);

        for url in [
            format!("{BASE}/data-hubs/{hub}/zcaps/chunks"),
            format!("{BASE}/data-hubs/{hub}/zcaps/documents/{}/extra", id::generate()),
            format!("{BASE}/data-hubs/{hub}/documents"),
            format!("https://other.example/data-hubs/{hub}/zcaps/documents"),
        ] {
            assert!(registry.materialize(&url, &config).is_none(), "{url}");
        }
    }

    #[test]
    fn hub_mismatch_yields_none() {
        let registry = RootCapabilityRegistry::new(BASE);
        let config = config(&id::generate());
        let url = format!("{BASE}/data-hubs/{}/zcaps/documents", id::generate());
        assert!(registry.materialize(&url, &config).is_none());
    }

    #[test]
    fn hub_id_extraction() {
        let registry = RootCapabilityRegistry::new(BASE);
        let hub = id::generate();
        let url = format!("{BASE}/data-hubs/{hub}/zcaps/query");
        assert_eq!(registry.hub_id_of(&url), Some(hub));
        assert_eq!(registry.hub_id_of("https://other.example/x"), None);
    }

    #[tokio::test]
    async fn delegation_store_crud() {
        let store = DelegationStore::new();
        let cap = Capability {
            context: SECURITY_CONTEXT_V2.into(),
            id: "urn:zcap:z1Cap".into(),
            invocation_target: format!("{BASE}/data-hubs/zHub/documents/zDoc"),
            controller: None,
            invoker: Some(OneOrMany::One("did:key:zBob".into())),
            delegator: None,
            parent_capability: Some(format!("{BASE}/data-hubs/zHub/zcaps/documents/zDoc")),
            allowed_action: Some(OneOrMany::One("read".into())),
            proof: None,
        };

        store.insert("did:key:zBob", cap.clone()).await.unwrap();
        assert_eq!(
            store.insert("did:key:zBob", cap.clone()).await.unwrap_err().kind,
            hub_error::ErrorKind::DuplicateError
        );

        // Target-constrained lookup only matches the stored target.
        assert!(store
            .get("urn:zcap:z1Cap", &cap.invocation_target)
            .await
            .is_some());
        assert!(store
            .get("urn:zcap:z1Cap", "https://hub.example/data-hubs/zHub/documents/zOther")
            .await
            .is_none());

        assert_eq!(store.find_by_controller("did:key:zBob").await.len(), 1);
        assert!(store.find_by_controller("did:key:zEve").await.is_empty());

        assert!(store.remove("urn:zcap:z1Cap").await);
        assert!(!store.remove("urn:zcap:z1Cap").await);
    }
}
