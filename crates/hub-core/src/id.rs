// SPDX-License-Identifier: MIT OR Apache-2.0
//! Minting and validation of 128-bit multibase-base58 identifiers.
//!
//! Hub and document identifiers are 16 cryptographically random bytes behind
//! a two-byte `0x00 0x10` header (identity multicodec tag, 16-byte length),
//! base58-encoded with the multibase `z` indicator. An identifier decodes to
//! exactly 18 bytes. No other shape is accepted on the wire.

use hub_error::{HubError, HubResult};
use rand_core::{OsRng, RngCore};

/// Multibase indicator for base58-btc.
const MULTIBASE_BASE58: char = 'z';

/// Multicodec identity tag.
const CODEC_IDENTITY: u8 = 0x00;

/// Payload length marker: 16 bytes.
const PAYLOAD_LEN_TAG: u8 = 0x10;

/// Decoded identifier length: two header bytes plus 16 payload bytes.
const DECODED_LEN: usize = 18;

/// Mint a fresh identifier from 16 bytes of OS entropy.
#[must_use]
pub fn generate() -> String {
    let mut buf = [0u8; DECODED_LEN];
    buf[0] = CODEC_IDENTITY;
    buf[1] = PAYLOAD_LEN_TAG;
    OsRng.fill_bytes(&mut buf[2..]);
    format!("{MULTIBASE_BASE58}{}", bs58::encode(&buf).into_string())
}

/// Validate the structural rules of an identifier.
///
/// Fails with [`hub_error::ErrorKind::SyntaxError`] if the multibase
/// indicator is missing, the body is not base58, the decoded buffer is not
/// exactly 18 bytes, or the two header bytes are wrong.
pub fn validate(s: &str) -> HubResult<()> {
    let body = s
        .strip_prefix(MULTIBASE_BASE58)
        .ok_or_else(|| HubError::syntax("identifier must be multibase base58 (z...)"))?;

    let bytes = bs58::decode(body)
        .into_vec()
        .map_err(|e| HubError::syntax("identifier is not valid base58").with_source(e))?;

    if bytes.len() != DECODED_LEN {
        return Err(
            HubError::syntax("identifier must decode to exactly 18 bytes")
                .with_context("decodedLength", bytes.len()),
        );
    }
    if bytes[0] != CODEC_IDENTITY || bytes[1] != PAYLOAD_LEN_TAG {
        return Err(HubError::syntax("identifier header bytes must be 0x00 0x10"));
    }
    Ok(())
}
