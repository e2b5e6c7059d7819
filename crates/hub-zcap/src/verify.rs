// SPDX-License-Identifier: MIT OR Apache-2.0
//! The capability-invocation verifier.
//!
//! Given a signed request and the facade's expectation — invocation target,
//! root capability URL, and action — the verifier parses the HTTP signature,
//! resolves the verification key, materializes or looks up the invoked
//! capability, and validates the invocation against the expectation. Every
//! failure collapses to the uniform `NotAllowedError`; only tracing carries
//! the reason. Timing differences that leak capability existence are
//! accepted: identifiers are 128-bit random and infeasible to guess.

use crate::didkey::KeyResolver;
use crate::registry::{DelegationStore, RootCapabilityRegistry};
use crate::signature::{parse_signature_header, signing_string};
use async_trait::async_trait;
use chrono::Utc;
use ed25519_dalek::Signature;
use hub_core::{Action, Capability, HubConfig};
use hub_error::{HubError, HubResult};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Header naming the invoked capability.
pub const HEADER_CAPABILITY: &str = "authorization-capability";

/// Header naming the claimed action.
pub const HEADER_CAPABILITY_ACTION: &str = "authorization-capability-action";

/// Covered fields every invocation must sign.
const REQUIRED_COVERED: &[&str] = &[
    "(key-id)",
    "(created)",
    "(expires)",
    "(request-target)",
    "host",
    HEADER_CAPABILITY,
    HEADER_CAPABILITY_ACTION,
];

/// Additional covered fields required when the request carries a body.
const REQUIRED_COVERED_BODY: &[&str] = &["content-type", "digest"];

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// What the facade expects an invocation to prove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    /// The invocation target the route maps to.
    pub target: String,
    /// The root capability URL the route's target is governed by.
    pub root_capability: String,
    /// The action the route requires.
    pub action: Action,
}

/// The transport-independent view of a request under verification.
#[derive(Debug, Clone, Copy)]
pub struct HttpRequestContext<'a> {
    /// Request method (any case).
    pub method: &'a str,
    /// Path plus query string, as sent.
    pub path_and_query: &'a str,
    /// Request headers, lowercased names.
    pub headers: &'a BTreeMap<String, String>,
    /// Whether the request carries a body.
    pub has_body: bool,
}

/// The proven invoker identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoker {
    /// The key's controller (or the key id when no controller exists).
    pub id: String,
}

/// Hub-configuration lookup threaded into the verifier as an explicit
/// dependency, so authorization never re-enters the facade.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Fetch the configuration of a hub.
    async fn config_for_hub(&self, hub_id: &str) -> HubResult<HubConfig>;
}

// ---------------------------------------------------------------------------
// InvocationVerifier
// ---------------------------------------------------------------------------

/// Verifies HTTP-signature capability invocations.
pub struct InvocationVerifier {
    expected_host: String,
    clock_skew_secs: i64,
    registry: RootCapabilityRegistry,
    delegations: DelegationStore,
    resolver: Arc<dyn KeyResolver>,
}

impl InvocationVerifier {
    /// Build a verifier.
    #[must_use]
    pub fn new(
        expected_host: impl Into<String>,
        clock_skew_secs: u64,
        registry: RootCapabilityRegistry,
        delegations: DelegationStore,
        resolver: Arc<dyn KeyResolver>,
    ) -> Self {
        Self {
            expected_host: expected_host.into(),
            clock_skew_secs: clock_skew_secs as i64,
            registry,
            delegations,
            resolver,
        }
    }

    /// Verify an invocation, returning the proven invoker.
    pub async fn verify(
        &self,
        req: HttpRequestContext<'_>,
        expect: &Expectation,
        configs: &dyn ConfigSource,
    ) -> HubResult<Invoker> {
        self.verify_inner(req, expect, configs).await.map_err(|e| {
            debug!(reason = %e, target = %expect.target, "invocation rejected");
            HubError::not_allowed()
        })
    }

    async fn verify_inner(
        &self,
        req: HttpRequestContext<'_>,
        expect: &Expectation,
        configs: &dyn ConfigSource,
    ) -> HubResult<Invoker> {
        // 1. Parse the signature header and check coverage.
        let auth = req
            .headers
            .get("authorization")
            .ok_or_else(HubError::not_allowed)?;
        let sig = parse_signature_header(auth)?;

        let mut required: Vec<&str> = REQUIRED_COVERED.to_vec();
        if req.has_body {
            required.extend_from_slice(REQUIRED_COVERED_BODY);
        }
        for field in required {
            if !sig.covers(field) {
                return Err(HubError::not_allowed());
            }
        }

        // 2. The signed host must be this server.
        if req.headers.get("host") != Some(&self.expected_host) {
            return Err(HubError::not_allowed());
        }

        // 3. Signature validity window.
        let now = Utc::now().timestamp();
        if sig.created > now + self.clock_skew_secs || sig.expires < now {
            return Err(HubError::not_allowed());
        }

        // 4. Resolve the key and verify the signature.
        let key = self.resolver.resolve(&sig.key_id)?;
        let payload = signing_string(&sig, req.method, req.path_and_query, req.headers)?;
        let signature =
            Signature::from_slice(&sig.signature).map_err(|_| HubError::not_allowed())?;
        key.key
            .verify_strict(payload.as_bytes(), &signature)
            .map_err(|_| HubError::not_allowed())?;

        // 5. The claimed action must be the route's action.
        let action = req
            .headers
            .get(HEADER_CAPABILITY_ACTION)
            .and_then(|v| Action::from_str(v).ok())
            .ok_or_else(HubError::not_allowed)?;
        if action != expect.action {
            return Err(HubError::not_allowed());
        }

        // 6. Determine the invoked capability.
        let capability_id = req
            .headers
            .get(HEADER_CAPABILITY)
            .ok_or_else(HubError::not_allowed)?;
        let capability = self
            .invoked_capability(capability_id, expect, configs)
            .await?;

        // 7. Validate the invocation against the expectation.
        if capability.invocation_target != expect.target {
            return Err(HubError::not_allowed());
        }
        if capability.id != expect.root_capability
            && capability.parent_capability.as_deref() != Some(expect.root_capability.as_str())
        {
            return Err(HubError::not_allowed());
        }
        if !capability.permits_invoker(&key.controller) && !capability.permits_invoker(&key.id) {
            return Err(HubError::not_allowed());
        }
        if !capability.permits_action(action) {
            return Err(HubError::not_allowed());
        }

        Ok(Invoker { id: key.controller })
    }

    /// Materialize the expected root capability, or fall back to the
    /// delegated store keyed by `(id, invocationTarget)`.
    async fn invoked_capability(
        &self,
        capability_id: &str,
        expect: &Expectation,
        configs: &dyn ConfigSource,
    ) -> HubResult<Capability> {
        if capability_id == expect.root_capability {
            let hub_id = self
                .registry
                .hub_id_of(&expect.root_capability)
                .ok_or_else(HubError::not_allowed)?;
            let config = configs
                .config_for_hub(&hub_id)
                .await
                .map_err(|_| HubError::not_allowed())?;
            return self
                .registry
                .materialize(capability_id, &config)
                .ok_or_else(HubError::not_allowed);
        }
        self.delegations
            .get(capability_id, &expect.target)
            .await
            .ok_or_else(HubError::not_allowed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
