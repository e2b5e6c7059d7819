// SPDX-License-Identifier: MIT OR Apache-2.0
//! Capability-based authorization for the data hub.
//!
//! Root capabilities are materialized on demand from hub configuration —
//! they are pure values and are never persisted. Delegated capabilities are
//! stored verbatim after their delegation proof verifies against the hub's
//! root delegators. Invocations are proved with HTTP message signatures
//! (Ed25519Signature2018 over did:key verification methods); every
//! verification failure collapses to a single opaque `NotAllowedError` so
//! callers cannot probe which check failed.
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Canonical JSON encoding signed by delegation proofs.
pub mod canonical;
/// Delegation-proof creation and verification.
pub mod delegation;
/// did:key resolution to Ed25519 verification keys.
pub mod didkey;
/// Root-capability materialization and delegated-capability storage.
pub mod registry;
/// HTTP signature header parsing and signing-string construction.
pub mod signature;
/// The invocation verifier.
pub mod verify;

pub use didkey::{DidKeyResolver, KeyResolver, ResolvedKey};
pub use registry::{DelegationStore, RootCapabilityRegistry};
pub use verify::{ConfigSource, Expectation, HttpRequestContext, InvocationVerifier, Invoker};
