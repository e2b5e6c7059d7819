// SPDX-License-Identifier: MIT OR Apache-2.0
//! Delegation-proof creation and verification.
//!
//! A delegated capability carries an `Ed25519Signature2018` proof with the
//! `capabilityDelegation` purpose. The signed payload is the canonical JSON
//! of the capability with the proof removed. Verification requires the
//! proof's key to belong to a root delegator of the hub the capability
//! grants access into.

use crate::canonical::canonical_json;
use crate::didkey::KeyResolver;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use ed25519_dalek::{Signature, Signer, SigningKey};
use hub_core::{
    Capability, HubConfig, Proof, ED25519_SIGNATURE_2018, PURPOSE_CAPABILITY_DELEGATION,
};
use hub_error::{HubError, HubResult};

/// The byte payload a delegation proof signs: canonical JSON of the
/// capability minus its `proof`.
pub fn signing_payload(capability: &Capability) -> HubResult<Vec<u8>> {
    let mut value = serde_json::to_value(capability)
        .map_err(|e| HubError::internal("capability serialization failed").with_source(e))?;
    if let Some(map) = value.as_object_mut() {
        map.remove("proof");
    }
    Ok(canonical_json(&value).into_bytes())
}

/// Attach a delegation proof to a capability.
///
/// Client-side counterpart of [`verify_delegation`]; the service only uses
/// it in tests but clients delegate with exactly this construction.
pub fn sign_delegation(
    mut capability: Capability,
    key: &SigningKey,
    verification_method: &str,
) -> HubResult<Capability> {
    capability.proof = None;
    let payload = signing_payload(&capability)?;
    let signature = key.sign(&payload);
    capability.proof = Some(Proof {
        kind: ED25519_SIGNATURE_2018.into(),
        created: Utc::now().to_rfc3339(),
        verification_method: verification_method.to_owned(),
        proof_purpose: PURPOSE_CAPABILITY_DELEGATION.into(),
        proof_value: STANDARD.encode(signature.to_bytes()),
    });
    Ok(capability)
}

/// Verify a delegated capability against the hub it grants access into.
///
/// `hub_url` is the hub's canonical URL (`<base>/data-hubs/<hubId>`). The
/// capability's target must sit inside the hub, the proof must carry the
/// delegation purpose under the supported suite, and the signing key must
/// belong to a root delegator. Every failure is the uniform authorization
/// error.
pub fn verify_delegation(
    capability: &Capability,
    config: &HubConfig,
    hub_url: &str,
    resolver: &dyn KeyResolver,
) -> HubResult<()> {
    if !capability
        .invocation_target
        .strip_prefix(hub_url)
        .is_some_and(|rest| rest.starts_with('/'))
    {
        return Err(HubError::not_allowed());
    }
    if capability.parent_capability.is_none() {
        return Err(HubError::not_allowed());
    }

    let proof = capability.proof.as_ref().ok_or_else(HubError::not_allowed)?;
    if proof.kind != ED25519_SIGNATURE_2018 || proof.proof_purpose != PURPOSE_CAPABILITY_DELEGATION
    {
        return Err(HubError::not_allowed());
    }

    let key = resolver.resolve(&proof.verification_method)?;
    if !config
        .root_delegators()
        .iter()
        .any(|d| *d == key.controller)
    {
        return Err(HubError::not_allowed());
    }

    let payload = signing_payload(capability)?;
    let raw = STANDARD
        .decode(&proof.proof_value)
        .map_err(|_| HubError::not_allowed())?;
    let signature = Signature::from_slice(&raw).map_err(|_| HubError::not_allowed())?;
    key.key
        .verify_strict(&payload, &signature)
        .map_err(|_| HubError::not_allowed())?;
    Ok(())
}
