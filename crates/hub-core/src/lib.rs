// SPDX-License-Identifier: MIT OR Apache-2.0
//! hub-core
//!
//! The stable contract for the data-hub service: hub configurations,
//! encrypted documents with blinded indexes, payload chunks, and the
//! capability (zCap) document shape, together with the identifier codec and
//! the one-way digest used for storage lookup keys.
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// One-way digests for caller-supplied lookup keys.
pub mod digest;
/// Multibase-base58 identifier minting and validation.
pub mod id;
/// Contract types: hub configuration, documents, indexes, chunks.
pub mod types;
/// Capability (zCap) document types and constants.
pub mod zcap;

pub use types::{
    Attribute, Chunk, Document, HubConfig, IndexedEntry, KeyDescription, Meta, OneOrMany,
};
pub use zcap::{Action, Capability, Proof};

/// JSON-LD context every capability document carries.
pub const SECURITY_CONTEXT_V2: &str = "https://w3id.org/security/v2";

/// The one signature suite the service supports. Others are future work.
pub const ED25519_SIGNATURE_2018: &str = "Ed25519Signature2018";

/// Proof purpose for invoking a capability.
pub const PURPOSE_CAPABILITY_INVOCATION: &str = "capabilityInvocation";

/// Proof purpose for delegating a capability.
pub const PURPOSE_CAPABILITY_DELEGATION: &str = "capabilityDelegation";
