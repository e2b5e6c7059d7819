// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end semantics of the document store: unique blinded attributes,
//! optimistic concurrency, blinded query soundness, and hub isolation.
//!
//! Attribute names and values are produced the way a real client would:
//! HMAC-SHA-256 over the plaintext, URL-safe base64. The store only ever
//! sees the tokens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use hub_core::{id, Attribute, Document, IndexedEntry, KeyDescription};
use hub_error::ErrorKind;
use hub_store::{HubStore, Query, QueryPlan};
use serde_json::json;
use sha2::Sha256;

const HMAC_KEY_ID: &str = "did:key:zHmacKey#zHmacKey";
const BLINDING_SECRET: &[u8] = b"test-blinding-secret";

/// Blind a plaintext the way a client-side HMAC indexer does.
fn blind(plaintext: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(BLINDING_SECRET).unwrap();
    mac.update(plaintext.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

fn indexed_doc(sequence: u64, attrs: &[(&str, &str, bool)]) -> Document {
    Document {
        id: id::generate(),
        sequence,
        jwe: json!({"protected": "eyJlbmMiOiJBMjU2R0NNIn0", "ciphertext": "AAAA"}),
        indexed: Some(vec![IndexedEntry {
            hmac: KeyDescription {
                id: HMAC_KEY_ID.into(),
                kind: "Sha256HmacKey2019".into(),
            },
            sequence: 0,
            attributes: attrs
                .iter()
                .map(|(name, value, unique)| Attribute {
                    name: blind(name),
                    value: blind(value),
                    unique: *unique,
                })
                .collect(),
        }]),
    }
}

fn has_query(names: &[&str]) -> QueryPlan {
    let query = Query {
        index: HMAC_KEY_ID.into(),
        equals: None,
        has: Some(names.iter().map(|n| blind(n)).collect()),
    };
    QueryPlan::compile(&query).unwrap()
}

fn equals_query(pairs: &[(&str, &str)]) -> QueryPlan {
    let clause = pairs
        .iter()
        .map(|(n, v)| (blind(n), serde_json::Value::String(blind(v))))
        .collect();
    let query = Query {
        index: HMAC_KEY_ID.into(),
        equals: Some(vec![clause]),
        has: None,
    };
    QueryPlan::compile(&query).unwrap()
}

// ---------------------------------------------------------------------------
// Unique-attribute injectivity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unique_attribute_collision_rejected_in_same_hub() {
    let store = HubStore::new();
    let a = indexed_doc(0, &[("email", "alice@example.com", true)]);
    let b = indexed_doc(0, &[("email", "alice@example.com", true)]);

    store.insert("zHub", a).await.unwrap();
    let err = store.insert("zHub", b.clone()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateError);

    // The same token in a different hub does not collide.
    store.insert("zOtherHub", b).await.unwrap();
}

#[tokio::test]
async fn non_unique_attributes_never_collide() {
    let store = HubStore::new();
    let a = indexed_doc(0, &[("type", "message", false)]);
    let b = indexed_doc(0, &[("type", "message", false)]);
    store.insert("zHub", a).await.unwrap();
    store.insert("zHub", b).await.unwrap();
}

#[tokio::test]
async fn update_frees_abandoned_unique_tokens() {
    let store = HubStore::new();
    let mut a = indexed_doc(0, &[("email", "alice@example.com", true)]);
    store.insert("zHub", a.clone()).await.unwrap();

    // Re-point the document at a different unique value.
    a.sequence = 1;
    a.indexed.as_mut().unwrap()[0].attributes[0].value = blind("alice@new.example");
    store.update("zHub", a).await.unwrap();

    // The abandoned token is free for another document now.
    let b = indexed_doc(0, &[("email", "alice@example.com", true)]);
    store.insert("zHub", b).await.unwrap();
}

#[tokio::test]
async fn failed_update_leaves_tokens_untouched() {
    let store = HubStore::new();
    let a = indexed_doc(0, &[("email", "alice@example.com", true)]);
    store.insert("zHub", a.clone()).await.unwrap();

    // Wrong sequence: the write must not release or re-home the token.
    let mut stale = a.clone();
    stale.sequence = 5;
    assert_eq!(
        store.update("zHub", stale).await.unwrap_err().kind,
        ErrorKind::InvalidStateError
    );

    let b = indexed_doc(0, &[("email", "alice@example.com", true)]);
    assert_eq!(
        store.insert("zHub", b).await.unwrap_err().kind,
        ErrorKind::DuplicateError
    );
}

// ---------------------------------------------------------------------------
// Optimistic concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_have_exactly_one_winner() {
    let store = HubStore::new();
    let doc = indexed_doc(0, &[]);
    store.insert("zHub", doc.clone()).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        let mut next = doc.clone();
        next.sequence = 1;
        handles.push(tokio::spawn(
            async move { store.update("zHub", next).await },
        ));
    }

    let mut winners = 0;
    let mut losers = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => winners += 1,
            Err(e) => {
                assert_eq!(e.kind, ErrorKind::InvalidStateError);
                losers += 1;
            }
        }
    }
    assert_eq!(winners, 1, "exactly one concurrent writer must win");
    assert_eq!(losers, 15);

    let stored = store.get("zHub", &doc.id).await.unwrap();
    assert_eq!(stored.doc.sequence, 1);
}

#[tokio::test]
async fn chunk_coherence_follows_document_sequence() {
    let store = HubStore::new();
    let mut doc = indexed_doc(0, &[]);
    store.insert("zHub", doc.clone()).await.unwrap();

    let chunk = |sequence: u64| hub_core::Chunk {
        index: 0,
        offset: 0,
        sequence,
        jwe: json!({"ciphertext": "AAAA"}),
    };

    store.update_chunk("zHub", &doc.id, chunk(0)).await.unwrap();

    doc.sequence = 1;
    store.update("zHub", doc.clone()).await.unwrap();

    // Stale chunk writes always fail after the parent advanced.
    assert_eq!(
        store
            .update_chunk("zHub", &doc.id, chunk(0))
            .await
            .unwrap_err()
            .kind,
        ErrorKind::InvalidStateError
    );
    store.update_chunk("zHub", &doc.id, chunk(1)).await.unwrap();
}

// ---------------------------------------------------------------------------
// Query soundness
// ---------------------------------------------------------------------------

#[tokio::test]
async fn has_query_returns_exactly_the_matching_documents() {
    let store = HubStore::new();
    let matching = indexed_doc(0, &[("type", "message", false)]);
    let other = indexed_doc(0, &[("category", "note", false)]);
    store.insert("zHub", matching.clone()).await.unwrap();
    store.insert("zHub", other).await.unwrap();

    let found = store.find("zHub", &has_query(&["type"])).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].doc.id, matching.id);
}

#[tokio::test]
async fn equals_query_requires_value_match() {
    let store = HubStore::new();
    let alice = indexed_doc(0, &[("recipient", "alice", false)]);
    let bob = indexed_doc(0, &[("recipient", "bob", false)]);
    store.insert("zHub", alice.clone()).await.unwrap();
    store.insert("zHub", bob).await.unwrap();

    let found = store
        .find("zHub", &equals_query(&[("recipient", "alice")]))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].doc.id, alice.id);

    let none = store
        .find("zHub", &equals_query(&[("recipient", "carol")]))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn count_matches_find() {
    let store = HubStore::new();
    store
        .insert("zHub", indexed_doc(0, &[("type", "message", false)]))
        .await
        .unwrap();
    store
        .insert("zHub", indexed_doc(0, &[("type", "message", false)]))
        .await
        .unwrap();

    let plan = has_query(&["type"]);
    assert_eq!(store.count("zHub", &plan).await.unwrap(), 2);
}

#[tokio::test]
async fn queries_never_cross_hubs() {
    let store = HubStore::new();
    store
        .insert("zHubA", indexed_doc(0, &[("type", "message", false)]))
        .await
        .unwrap();

    let found = store.find("zHubB", &has_query(&["type"])).await.unwrap();
    assert!(found.is_empty());
}
