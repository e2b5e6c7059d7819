// SPDX-License-Identifier: MIT OR Apache-2.0
//! Document store for the data hub.
//!
//! Persists hub configurations, encrypted documents, and payload chunks over
//! an in-memory backend that satisfies the storage-layer indexing contract:
//! unique keys on hashed identifiers, a unique partial index over blinded
//! unique-attribute tokens, and conditional sequence-gated updates. All
//! lookup keys that embed caller-supplied identifiers are digested before
//! indexing.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod memory;
/// Blinded `has`/`equals` query compilation.
pub mod query;

pub use memory::HubStore;
pub use query::{Query, QueryPlan};

use hub_core::{Chunk, Document, HubConfig, Meta};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

/// A stored hub configuration with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRecord {
    /// The configuration document.
    pub config: HubConfig,
    /// Record timestamps.
    pub meta: Meta,
}

/// A stored document with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocRecord {
    /// The encrypted document.
    pub doc: Document,
    /// Record timestamps.
    pub meta: Meta,
}

/// A stored chunk with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// The chunk payload.
    pub chunk: Chunk,
    /// Record timestamps.
    pub meta: Meta,
}

// ---------------------------------------------------------------------------
// Unique-attribute projection
// ---------------------------------------------------------------------------

/// Project a document's unique blinded attributes into index tokens.
///
/// For each indexed entry, each attribute flagged `unique` emits
/// `hash(entry.hmac.id) ":" name ":" value`. The result is deduplicated
/// (a document never collides with itself) and empty when the document has
/// no unique attributes, so the partial unique index skips it entirely.
#[must_use]
pub fn unique_attribute_tokens(doc: &Document) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    if let Some(entries) = &doc.indexed {
        for entry in entries {
            let key_digest = hub_core::digest::hash(&entry.hmac.id);
            for attr in &entry.attributes {
                if attr.unique {
                    tokens.push(format!("{key_digest}:{}:{}", attr.name, attr.value));
                }
            }
        }
    }
    tokens.sort_unstable();
    tokens.dedup();
    tokens
}
