// SPDX-License-Identifier: MIT OR Apache-2.0
//! Contract types for hub configurations, documents, and chunks.
//!
//! These are the wire shapes (camelCase JSON) the service accepts and
//! returns. The server never interprets `jwe` payloads or blinded attribute
//! names/values; they are opaque strings produced client-side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// OneOrMany
// ---------------------------------------------------------------------------

/// A field that may be a single principal identifier or a list of them.
///
/// `invoker`, `delegator`, and `allowedAction` all use this shape on the
/// wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    /// A single value.
    One(String),
    /// A list of values.
    Many(Vec<String>),
}

impl OneOrMany {
    /// Returns `true` if `value` is (one of) the contained value(s).
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::One(v) => v == value,
            Self::Many(vs) => vs.iter().any(|v| v == value),
        }
    }

    /// View the contents as a slice-backed vector of string references.
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::One(v) => vec![v.as_str()],
            Self::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        Self::One(value.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Key descriptions
// ---------------------------------------------------------------------------

/// Reference to a client-held key: the blinding HMAC or the key-agreement
/// key. The server stores the identifier and type, never material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDescription {
    /// Key identifier (a URL or did:key fragment).
    pub id: String,
    /// Key type (e.g. `Sha256HmacKey2019`, `X25519KeyAgreementKey2019`).
    #[serde(rename = "type")]
    pub kind: String,
}

// ---------------------------------------------------------------------------
// HubConfig
// ---------------------------------------------------------------------------

/// Configuration record for one data hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubConfig {
    /// 128-bit URL-safe identifier. Minted by the server on creation.
    #[serde(default)]
    pub id: String,

    /// Monotonic version; every update must supply `prior + 1`.
    pub sequence: u64,

    /// Principal that owns the hub; default invoker and delegator.
    pub controller: String,

    /// Principal(s) allowed to invoke root capabilities. Defaults to the
    /// controller when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoker: Option<OneOrMany>,

    /// Principal(s) allowed to delegate root capabilities. Defaults to the
    /// controller when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegator: Option<OneOrMany>,

    /// Optional client-chosen name, unique per controller when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,

    /// The key-agreement key clients use to wrap content encryption keys.
    pub key_agreement_key: KeyDescription,

    /// The HMAC key clients use to blind index attributes.
    pub hmac: KeyDescription,
}

impl HubConfig {
    /// Principals allowed to invoke root capabilities (`invoker`, defaulting
    /// to the controller).
    #[must_use]
    pub fn root_invokers(&self) -> Vec<&str> {
        match &self.invoker {
            Some(v) => v.values(),
            None => vec![self.controller.as_str()],
        }
    }

    /// Principals allowed to delegate root capabilities (`delegator`,
    /// defaulting to the controller).
    #[must_use]
    pub fn root_delegators(&self) -> Vec<&str> {
        match &self.delegator {
            Some(v) => v.values(),
            None => vec![self.controller.as_str()],
        }
    }
}

// ---------------------------------------------------------------------------
// Documents and blinded indexes
// ---------------------------------------------------------------------------

/// A blinded attribute inside an indexed entry.
///
/// `name` and `value` are HMAC tokens computed client-side; the server never
/// sees plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Blinded attribute name.
    pub name: String,
    /// Blinded attribute value.
    pub value: String,
    /// When `true`, the `(hmac key, name, value)` token must be unique
    /// across all documents in the hub.
    #[serde(default)]
    pub unique: bool,
}

/// One blinded-index entry of a document, scoped to the HMAC key that
/// produced its attribute tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedEntry {
    /// The blinding key this entry's tokens were produced with.
    pub hmac: KeyDescription,
    /// Entry-local version counter.
    pub sequence: u64,
    /// Blinded attributes.
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// An encrypted document: an opaque JWE plus optional blinded indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Hub-scoped 128-bit identifier.
    pub id: String,

    /// Monotonic version; updates must supply `prior + 1`. First insert may
    /// carry any value (documents may be copied in mid-history).
    pub sequence: u64,

    /// The opaque ciphertext envelope. Never interpreted server-side.
    pub jwe: serde_json::Value,

    /// Blinded index entries, if the client indexes this document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<Vec<IndexedEntry>>,
}

// ---------------------------------------------------------------------------
// Chunks
// ---------------------------------------------------------------------------

/// One encrypted byte-range of a document's payload.
///
/// Chunks are keyed by `(hub, document, index)` and must carry the parent
/// document's current sequence at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of this chunk within the payload.
    pub index: u64,
    /// Byte offset of the chunk. Bounded only by `u64::MAX`.
    pub offset: u64,
    /// Must equal the parent document's sequence at write time.
    pub sequence: u64,
    /// The opaque ciphertext for this byte range.
    pub jwe: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Record metadata
// ---------------------------------------------------------------------------

/// Creation/update timestamps attached to every stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// When the record was first inserted.
    pub created: DateTime<Utc>,
    /// When the record was last written.
    pub updated: DateTime<Utc>,
}

impl Meta {
    /// Fresh metadata for a newly inserted record.
    #[must_use]
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            created: now,
            updated: now,
        }
    }

    /// Metadata for a replaced record: creation preserved, update advanced.
    #[must_use]
    pub fn touched(&self) -> Self {
        Self {
            created: self.created,
            updated: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
