// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP signature header parsing and signing-string construction.
//!
//! The wire format is the draft-cavage HTTP signature scheme:
//!
//! ```text
//! Authorization: Signature keyId="did:key:z6Mk...#z6Mk...",\
//!     headers="(key-id) (created) (expires) (request-target) host ...",\
//!     created="1700000000",expires="1700000600",signature="base64..."
//! ```
//!
//! Parsing is strict; anything malformed collapses to the uniform
//! authorization failure so the error channel carries no structure.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hub_error::{HubError, HubResult};
use std::collections::BTreeMap;

/// Special covered fields that are not plain request headers.
const FIELD_KEY_ID: &str = "(key-id)";
const FIELD_CREATED: &str = "(created)";
const FIELD_EXPIRES: &str = "(expires)";
const FIELD_REQUEST_TARGET: &str = "(request-target)";

/// A parsed `Authorization: Signature ...` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// The verification key URL.
    pub key_id: String,
    /// Covered fields, in covered order, lowercased.
    pub headers: Vec<String>,
    /// Unix seconds the signature was created.
    pub created: i64,
    /// Unix seconds the signature expires.
    pub expires: i64,
    /// The raw Ed25519 signature bytes.
    pub signature: Vec<u8>,
}

impl SignatureHeader {
    /// Returns `true` when `field` is among the covered fields.
    #[must_use]
    pub fn covers(&self, field: &str) -> bool {
        self.headers.iter().any(|h| h == field)
    }
}

/// Parse the value of an `Authorization` header.
pub fn parse_signature_header(value: &str) -> HubResult<SignatureHeader> {
    let params = value
        .strip_prefix("Signature ")
        .ok_or_else(HubError::not_allowed)?;

    let mut key_id = None;
    let mut headers = None;
    let mut created = None;
    let mut expires = None;
    let mut signature = None;

    for part in split_params(params) {
        let (name, raw) = part.split_once('=').ok_or_else(HubError::not_allowed)?;
        let val = raw.trim_matches('"');
        match name.trim() {
            "keyId" => key_id = Some(val.to_owned()),
            "headers" => {
                headers = Some(
                    val.split(' ')
                        .filter(|s| !s.is_empty())
                        .map(str::to_lowercase)
                        .collect::<Vec<_>>(),
                );
            }
            "created" => created = Some(parse_timestamp(val)?),
            "expires" => expires = Some(parse_timestamp(val)?),
            "signature" => {
                signature = Some(STANDARD.decode(val).map_err(|_| HubError::not_allowed())?);
            }
            // Unknown parameters (e.g. algorithm) are tolerated.
            _ => {}
        }
    }

    match (key_id, headers, created, expires, signature) {
        (Some(key_id), Some(headers), Some(created), Some(expires), Some(signature)) => {
            Ok(SignatureHeader {
                key_id,
                headers,
                created,
                expires,
                signature,
            })
        }
        _ => Err(HubError::not_allowed()),
    }
}

/// Split signature parameters on commas that sit outside quoted values.
fn split_params(params: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, c) in params.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                out.push(params[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(params[start..].trim());
    out
}

fn parse_timestamp(value: &str) -> HubResult<i64> {
    value.parse::<i64>().map_err(|_| HubError::not_allowed())
}

/// Build the canonical signing string for a parsed signature over a request.
///
/// `headers` must carry lowercased names. Fails when a covered header is
/// absent from the request.
pub fn signing_string(
    sig: &SignatureHeader,
    method: &str,
    path_and_query: &str,
    headers: &BTreeMap<String, String>,
) -> HubResult<String> {
    let mut lines = Vec::with_capacity(sig.headers.len());
    for field in &sig.headers {
        let line = match field.as_str() {
            FIELD_KEY_ID => format!("{FIELD_KEY_ID}: {}", sig.key_id),
            FIELD_CREATED => format!("{FIELD_CREATED}: {}", sig.created),
            FIELD_EXPIRES => format!("{FIELD_EXPIRES}: {}", sig.expires),
            FIELD_REQUEST_TARGET => {
                format!(
                    "{FIELD_REQUEST_TARGET}: {} {}",
                    method.to_lowercase(),
                    path_and_query
                )
            }
            name => {
                let value = headers.get(name).ok_or_else(HubError::not_allowed)?;
                format!("{name}: {value}")
            }
        };
        lines.push(line);
    }
    Ok(lines.join("\n"))
}
