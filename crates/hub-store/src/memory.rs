// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory backend for the document store.
//!
//! One `RwLock` guards all collections; every conditional write (sequence
//! gate, unique indexes) happens under a single write-lock acquisition, so
//! uniqueness is atomic with the write and concurrent writers with the same
//! prior sequence see exactly one winner. No lock is ever held across an
//! await point.

use crate::query::QueryPlan;
use crate::{unique_attribute_tokens, ChunkRecord, ConfigRecord, DocRecord};
use hub_core::digest::hash;
use hub_core::{id, Chunk, Document, HubConfig, Meta};
use hub_error::{HubError, HubResult};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

/// Key of a document: `(hub digest, doc-id digest)`.
type DocKey = (String, String);

/// Key of a chunk: `(hub digest, doc-id digest, index)`.
type ChunkKey = (String, String, u64);

struct StoredDoc {
    record: DocRecord,
    /// Cached unique-attribute projection, kept in lockstep with the
    /// `unique_tokens` index.
    tokens: Vec<String>,
}

#[derive(Default)]
struct Collections {
    /// Configs by hashed id. Unique.
    configs: HashMap<String, ConfigRecord>,
    /// `(controller digest, referenceId)` → hashed config id. Unique,
    /// partial on referenceId presence.
    config_refs: HashMap<(String, String), String>,
    /// Documents by `(hub digest, id digest)`. Unique.
    docs: HashMap<DocKey, StoredDoc>,
    /// Hub-scoped document sets for isolation-preserving scans.
    docs_by_hub: HashMap<String, BTreeSet<String>>,
    /// `(hub digest, unique token)` → doc-id digest. Unique, partial on
    /// token presence.
    unique_tokens: HashMap<(String, String), String>,
    /// Chunks by `(hub digest, doc digest, index)`. Unique.
    chunks: HashMap<ChunkKey, ChunkRecord>,
}

// ---------------------------------------------------------------------------
// HubStore
// ---------------------------------------------------------------------------

/// The document store: configs, documents, and chunks for every hub.
///
/// Cheap to clone; clones share the same backing collections.
#[derive(Clone, Default)]
pub struct HubStore {
    inner: Arc<RwLock<Collections>>,
}

impl HubStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- Config operations ---------------------------------------------------

    /// Insert a new hub configuration.
    ///
    /// The config must carry `sequence == 0`. Duplicates on `id` or on
    /// `(controller, referenceId)` fail with `DuplicateError`.
    pub async fn insert_config(&self, config: HubConfig) -> HubResult<ConfigRecord> {
        if config.sequence != 0 {
            return Err(HubError::data("config.sequence must be 0 on insert")
                .with_context("sequence", config.sequence));
        }
        id::validate(&config.id)?;

        let key = hash(&config.id);
        let ref_key = config
            .reference_id
            .as_ref()
            .map(|r| (hash(&config.controller), r.clone()));

        let mut state = self.inner.write().await;
        if state.configs.contains_key(&key) {
            return Err(HubError::duplicate("hub configuration already exists"));
        }
        if let Some(ref_key) = &ref_key {
            if state.config_refs.contains_key(ref_key) {
                return Err(HubError::duplicate(
                    "a hub with this referenceId already exists for the controller",
                ));
            }
        }

        let record = ConfigRecord {
            config,
            meta: Meta::now(),
        };
        if let Some(ref_key) = ref_key {
            state.config_refs.insert(ref_key, key.clone());
        }
        state.configs.insert(key, record.clone());
        Ok(record)
    }

    /// Replace a hub configuration under the sequence gate.
    ///
    /// The conditional match is `stored.sequence == config.sequence - 1`;
    /// zero rows matched raises `InvalidStateError`.
    pub async fn update_config(&self, config: HubConfig) -> HubResult<()> {
        id::validate(&config.id)?;
        let key = hash(&config.id);

        let mut state = self.inner.write().await;
        let stored = state
            .configs
            .get(&key)
            .ok_or_else(|| HubError::invalid_state("hub configuration sequence mismatch"))?;

        if config.sequence.checked_sub(1) != Some(stored.config.sequence) {
            return Err(
                HubError::invalid_state("hub configuration sequence mismatch")
                    .with_context("storedSequence", stored.config.sequence),
            );
        }

        // Move the (controller, referenceId) unique index entry if it changed.
        let old_ref = stored
            .config
            .reference_id
            .as_ref()
            .map(|r| (hash(&stored.config.controller), r.clone()));
        let new_ref = config
            .reference_id
            .as_ref()
            .map(|r| (hash(&config.controller), r.clone()));
        if old_ref != new_ref {
            if let Some(new_ref) = &new_ref {
                if state.config_refs.get(new_ref).is_some_and(|id| id != &key) {
                    return Err(HubError::duplicate(
                        "a hub with this referenceId already exists for the controller",
                    ));
                }
            }
            if let Some(old_ref) = old_ref {
                state.config_refs.remove(&old_ref);
            }
            if let Some(new_ref) = new_ref {
                state.config_refs.insert(new_ref, key.clone());
            }
        }

        let stored = state.configs.get_mut(&key).expect("checked above");
        stored.meta = stored.meta.touched();
        stored.config = config;
        Ok(())
    }

    /// Fetch a hub configuration by id.
    pub async fn get_config(&self, hub_id: &str) -> HubResult<ConfigRecord> {
        let state = self.inner.read().await;
        state
            .configs
            .get(&hash(hub_id))
            .cloned()
            .ok_or_else(|| HubError::not_found("hub configuration not found"))
    }

    /// Find hub configurations for a controller, optionally narrowed to one
    /// `referenceId`. The controller predicate is always forced.
    pub async fn find_config(
        &self,
        controller: &str,
        reference_id: Option<&str>,
    ) -> HubResult<Vec<ConfigRecord>> {
        let controller_digest = hash(controller);
        let state = self.inner.read().await;
        let mut out: Vec<ConfigRecord> = state
            .configs
            .values()
            .filter(|r| hash(&r.config.controller) == controller_digest)
            .filter(|r| match reference_id {
                Some(wanted) => r.config.reference_id.as_deref() == Some(wanted),
                None => true,
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.config.id.cmp(&b.config.id));
        Ok(out)
    }

    // -- Document operations -------------------------------------------------

    /// Insert a new document into a hub.
    ///
    /// The document id must be structurally valid; `(hub, id)` and every
    /// unique-attribute token must be free.
    pub async fn insert(&self, hub_id: &str, doc: Document) -> HubResult<DocRecord> {
        id::validate(&doc.id)?;
        let hub = hash(hub_id);
        let doc_digest = hash(&doc.id);
        let key = (hub.clone(), doc_digest.clone());
        let tokens = unique_attribute_tokens(&doc);

        let mut state = self.inner.write().await;
        if state.docs.contains_key(&key) {
            return Err(HubError::duplicate("document already exists"));
        }
        Self::check_token_conflicts(&state, &hub, &doc_digest, &tokens)?;

        let record = DocRecord {
            doc,
            meta: Meta::now(),
        };
        for token in &tokens {
            state
                .unique_tokens
                .insert((hub.clone(), token.clone()), doc_digest.clone());
        }
        state
            .docs_by_hub
            .entry(hub)
            .or_default()
            .insert(doc_digest);
        state.docs.insert(key, StoredDoc {
            record: record.clone(),
            tokens,
        });
        Ok(record)
    }

    /// Fetch a document by hub and id.
    pub async fn get(&self, hub_id: &str, doc_id: &str) -> HubResult<DocRecord> {
        let state = self.inner.read().await;
        state
            .docs
            .get(&(hash(hub_id), hash(doc_id)))
            .map(|s| s.record.clone())
            .ok_or_else(|| HubError::not_found("document not found"))
    }

    /// Find the documents of one hub matching a compiled blinded query.
    ///
    /// The hub predicate is always forced; no cross-hub hit is possible.
    pub async fn find(&self, hub_id: &str, plan: &QueryPlan) -> HubResult<Vec<DocRecord>> {
        let hub = hash(hub_id);
        let state = self.inner.read().await;
        let Some(members) = state.docs_by_hub.get(&hub) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for doc_digest in members {
            if let Some(stored) = state.docs.get(&(hub.clone(), doc_digest.clone())) {
                if plan.matches(&stored.record.doc) {
                    out.push(stored.record.clone());
                }
            }
        }
        Ok(out)
    }

    /// Count the documents of one hub matching a compiled blinded query.
    pub async fn count(&self, hub_id: &str, plan: &QueryPlan) -> HubResult<u64> {
        Ok(self.find(hub_id, plan).await?.len() as u64)
    }

    /// Replace or insert a document under the sequence gate.
    ///
    /// With a prior record the conditional match is
    /// `stored.sequence == doc.sequence - 1` (`InvalidStateError` on zero
    /// rows). Without one this is the insert path. Unique-attribute
    /// collisions fail with `DuplicateError` in both paths.
    pub async fn update(&self, hub_id: &str, doc: Document) -> HubResult<()> {
        id::validate(&doc.id)?;
        let hub = hash(hub_id);
        let doc_digest = hash(&doc.id);
        let key = (hub.clone(), doc_digest.clone());
        let tokens = unique_attribute_tokens(&doc);

        let mut state = self.inner.write().await;
        match state.docs.get(&key) {
            Some(stored) => {
                if doc.sequence.checked_sub(1) != Some(stored.record.doc.sequence) {
                    return Err(HubError::invalid_state("document sequence mismatch")
                        .with_context("storedSequence", stored.record.doc.sequence));
                }
                let old_tokens = stored.tokens.clone();
                Self::check_token_conflicts(&state, &hub, &doc_digest, &tokens)?;
                for token in &old_tokens {
                    state.unique_tokens.remove(&(hub.clone(), token.clone()));
                }
                for token in &tokens {
                    state
                        .unique_tokens
                        .insert((hub.clone(), token.clone()), doc_digest.clone());
                }
                let stored = state.docs.get_mut(&key).expect("checked above");
                stored.record.meta = stored.record.meta.touched();
                stored.record.doc = doc;
                stored.tokens = tokens;
            }
            None => {
                Self::check_token_conflicts(&state, &hub, &doc_digest, &tokens)?;
                for token in &tokens {
                    state
                        .unique_tokens
                        .insert((hub.clone(), token.clone()), doc_digest.clone());
                }
                state
                    .docs_by_hub
                    .entry(hub)
                    .or_default()
                    .insert(doc_digest);
                state.docs.insert(key, StoredDoc {
                    record: DocRecord {
                        doc,
                        meta: Meta::now(),
                    },
                    tokens,
                });
            }
        }
        Ok(())
    }

    /// Remove a document and everything it owns (index tokens, chunks).
    ///
    /// Returns whether a document was removed.
    pub async fn remove(&self, hub_id: &str, doc_id: &str) -> HubResult<bool> {
        let hub = hash(hub_id);
        let doc_digest = hash(doc_id);
        let key = (hub.clone(), doc_digest.clone());

        let mut state = self.inner.write().await;
        let Some(stored) = state.docs.remove(&key) else {
            return Ok(false);
        };
        for token in &stored.tokens {
            state.unique_tokens.remove(&(hub.clone(), token.clone()));
        }
        if let Some(members) = state.docs_by_hub.get_mut(&hub) {
            members.remove(&doc_digest);
        }
        state
            .chunks
            .retain(|(h, d, _), _| !(h == &hub && d == &doc_digest));
        Ok(true)
    }

    // -- Chunk operations ----------------------------------------------------

    /// Upsert a chunk of a document's payload.
    ///
    /// The chunk must carry the parent document's current sequence
    /// (`InvalidStateError` otherwise); within the current sequence,
    /// concurrent writers to the same index race last-write-wins.
    pub async fn update_chunk(&self, hub_id: &str, doc_id: &str, chunk: Chunk) -> HubResult<()> {
        let hub = hash(hub_id);
        let doc_digest = hash(doc_id);

        let mut state = self.inner.write().await;
        let parent = state
            .docs
            .get(&(hub.clone(), doc_digest.clone()))
            .ok_or_else(|| HubError::not_found("document not found"))?;
        if chunk.sequence != parent.record.doc.sequence {
            return Err(HubError::invalid_state(
                "chunk sequence does not match document sequence",
            )
            .with_context("documentSequence", parent.record.doc.sequence)
            .with_context("chunkSequence", chunk.sequence));
        }

        let key = (hub, doc_digest, chunk.index);
        match state.chunks.get_mut(&key) {
            Some(existing) => {
                existing.meta = existing.meta.touched();
                existing.chunk = chunk;
            }
            None => {
                state.chunks.insert(key, ChunkRecord {
                    chunk,
                    meta: Meta::now(),
                });
            }
        }
        Ok(())
    }

    /// Fetch a chunk by hub, document, and index.
    pub async fn get_chunk(
        &self,
        hub_id: &str,
        doc_id: &str,
        chunk_index: u64,
    ) -> HubResult<ChunkRecord> {
        let state = self.inner.read().await;
        state
            .chunks
            .get(&(hash(hub_id), hash(doc_id), chunk_index))
            .cloned()
            .ok_or_else(|| HubError::not_found("chunk not found"))
    }

    /// Remove a chunk. Parent-document existence is deliberately not
    /// checked; removal is by key alone.
    ///
    /// Returns whether a chunk was removed.
    pub async fn remove_chunk(
        &self,
        hub_id: &str,
        doc_id: &str,
        chunk_index: u64,
    ) -> HubResult<bool> {
        let mut state = self.inner.write().await;
        Ok(state
            .chunks
            .remove(&(hash(hub_id), hash(doc_id), chunk_index))
            .is_some())
    }

    /// Garbage-collection hook: remove every chunk of a document whose
    /// sequence is behind the parent's current sequence. Chunks of a
    /// since-removed parent are all stale. Returns how many were collected.
    ///
    /// Scheduling of the sweep is the caller's concern.
    pub async fn sweep_stale_chunks(&self, hub_id: &str, doc_id: &str) -> HubResult<u64> {
        let hub = hash(hub_id);
        let doc_digest = hash(doc_id);

        let mut state = self.inner.write().await;
        let current = state
            .docs
            .get(&(hub.clone(), doc_digest.clone()))
            .map(|s| s.record.doc.sequence);

        let before = state.chunks.len();
        state.chunks.retain(|(h, d, _), record| {
            if h != &hub || d != &doc_digest {
                return true;
            }
            match current {
                Some(seq) => record.chunk.sequence >= seq,
                None => false,
            }
        });
        let collected = (before - state.chunks.len()) as u64;
        if collected > 0 {
            debug!(collected, "swept stale chunks");
        }
        Ok(collected)
    }

    // -- Internals -----------------------------------------------------------

    /// Reject tokens already owned by a different document of the same hub.
    fn check_token_conflicts(
        state: &Collections,
        hub: &str,
        doc_digest: &str,
        tokens: &[String],
    ) -> HubResult<()> {
        for token in tokens {
            if let Some(owner) = state.unique_tokens.get(&(hub.to_owned(), token.clone())) {
                if owner != doc_digest {
                    return Err(HubError::duplicate(
                        "a unique blinded attribute is already in use",
                    ));
                }
            }
        }
        Ok(())
    }
}
