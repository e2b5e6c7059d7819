// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property-flavored tests over the identifier codec and the store's
//! sequencing rules.

use hub_core::{digest, id};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Identifier codec
// ---------------------------------------------------------------------------

proptest! {
    // generate() always validates, for as many draws as proptest makes.
    #[test]
    fn generated_identifiers_always_validate(_seed in any::<u64>()) {
        let id = id::generate();
        prop_assert!(id::validate(&id).is_ok());
    }

    // The digest is injective in practice and stable.
    #[test]
    fn digest_is_stable_and_separating(a in "[ -~]{0,64}", b in "[ -~]{0,64}") {
        prop_assert_eq!(digest::hash(&a), digest::hash(&a));
        if a != b {
            prop_assert_ne!(digest::hash(&a), digest::hash(&b));
        }
    }
}

#[test]
fn identifier_corpus_is_collision_free() {
    let mut seen = std::collections::HashSet::new();
    for _ in 0..10_000 {
        assert!(seen.insert(id::generate()), "128-bit ids must not collide");
    }
}

// ---------------------------------------------------------------------------
// Sequence chains
// ---------------------------------------------------------------------------

#[tokio::test]
async fn long_sequence_chain_is_strictly_monotonic() {
    use hub_core::Document;
    use hub_store::HubStore;
    use serde_json::json;

    let store = HubStore::new();
    let mut doc = Document {
        id: id::generate(),
        sequence: 0,
        jwe: json!({"ciphertext": "AAAA"}),
        indexed: None,
    };
    store.insert("zHub", doc.clone()).await.unwrap();

    for next in 1..=50u64 {
        // Every skipped or repeated sequence fails...
        let mut wrong = doc.clone();
        wrong.sequence = next + 1;
        assert!(store.update("zHub", wrong).await.is_err());

        let mut stale = doc.clone();
        stale.sequence = doc.sequence;
        assert!(store.update("zHub", stale).await.is_err());

        // ...and exactly the successor lands.
        doc.sequence = next;
        store.update("zHub", doc.clone()).await.unwrap();
    }

    let stored = store.get("zHub", &doc.id).await.unwrap();
    assert_eq!(stored.doc.sequence, 50);
}

#[tokio::test]
async fn documents_may_be_copied_in_at_arbitrary_sequence() {
    use hub_core::Document;
    use hub_store::HubStore;
    use serde_json::json;

    let store = HubStore::new();
    // First insert is not forced to sequence 0.
    let doc = Document {
        id: id::generate(),
        sequence: 41,
        jwe: json!({"ciphertext": "AAAA"}),
        indexed: None,
    };
    store.insert("zHub", doc.clone()).await.unwrap();

    let mut next = doc;
    next.sequence = 42;
    store.update("zHub", next).await.unwrap();
}
