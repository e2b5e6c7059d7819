// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cross-crate error-taxonomy tests: stable kinds, HTTP mapping, uniform
//! authorization failures, and Send/Sync bounds.

use hub_error::{ErrorKind, HubError, ALL_KINDS};
use std::error::Error;

// ---------------------------------------------------------------------------
// 1. Every kind maps to exactly one documented status
// ---------------------------------------------------------------------------

#[test]
fn http_mapping_is_total_and_documented() {
    let expected: &[(ErrorKind, u16)] = &[
        (ErrorKind::NotFoundError, 404),
        (ErrorKind::DuplicateError, 409),
        (ErrorKind::InvalidStateError, 409),
        (ErrorKind::DataError, 400),
        (ErrorKind::SyntaxError, 400),
        (ErrorKind::NotAllowedError, 400),
        (ErrorKind::NotSupportedError, 400),
        (ErrorKind::PermissionDenied, 403),
        (ErrorKind::InternalError, 500),
    ];
    assert_eq!(expected.len(), ALL_KINDS.len());
    for (kind, status) in expected {
        assert_eq!(kind.http_status(), *status, "{kind}");
    }
}

// ---------------------------------------------------------------------------
// 2. Store operations surface classified kinds
// ---------------------------------------------------------------------------

#[tokio::test]
async fn store_errors_carry_classified_kinds() {
    use hub_core::{id, Document, HubConfig, KeyDescription};
    use hub_store::HubStore;
    use serde_json::json;

    let store = HubStore::new();

    // Unknown hub: NotFoundError.
    assert_eq!(
        store.get_config("zMissing").await.unwrap_err().kind,
        ErrorKind::NotFoundError
    );

    // Bad identifier shape: SyntaxError.
    let bad = Document {
        id: "bogus".into(),
        sequence: 0,
        jwe: json!({}),
        indexed: None,
    };
    assert_eq!(
        store.insert("zHub", bad).await.unwrap_err().kind,
        ErrorKind::SyntaxError
    );

    // Nonzero initial config sequence: DataError.
    let config = HubConfig {
        id: id::generate(),
        sequence: 7,
        controller: "did:key:zCtrl".into(),
        invoker: None,
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
    };
    assert_eq!(
        store.insert_config(config).await.unwrap_err().kind,
        ErrorKind::DataError
    );
}

// ---------------------------------------------------------------------------
// 3. Authorization failures are uniform
// ---------------------------------------------------------------------------

#[test]
fn authorization_failures_are_indistinguishable() {
    // Whatever went wrong inside the verifier, callers see one shape.
    let no_capability = HubError::not_allowed();
    let bad_signature = HubError::not_allowed();
    let wrong_target = HubError::not_allowed();

    assert_eq!(no_capability.to_string(), bad_signature.to_string());
    assert_eq!(bad_signature.to_string(), wrong_target.to_string());
    assert_eq!(no_capability.kind.http_status(), 400);
}

// ---------------------------------------------------------------------------
// 4. Errors behave as std errors across crate boundaries
// ---------------------------------------------------------------------------

#[test]
fn hub_error_is_send_sync_std_error() {
    fn assert_bounds<T: Error + Send + Sync + 'static>() {}
    assert_bounds::<HubError>();
}

#[test]
fn source_chain_crosses_crates() {
    let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
    let err = HubError::internal("backend unreachable").with_source(io);
    let source = err.source().expect("source preserved");
    assert_eq!(source.to_string(), "reset");
}

#[test]
fn kinds_serialize_to_wire_names() {
    for kind in ALL_KINDS {
        let json = serde_json::to_string(kind).unwrap();
        assert_eq!(json, format!("\"{}\"", kind.as_str()));
    }
}
