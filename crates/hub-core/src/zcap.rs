// SPDX-License-Identifier: MIT OR Apache-2.0
//! Capability (zCap) document types.
//!
//! A capability names an invocation target, the principals allowed to invoke
//! and delegate it, and (for delegated capabilities) the action caveat and
//! the delegation proof. Root capabilities are materialized on demand from a
//! hub's configuration and never carry a proof.

use crate::types::OneOrMany;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// The two actions a capability invocation can claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Retrieval: document/chunk GET and blinded queries.
    Read,
    /// Mutation: insert, update, delete.
    Write,
}

impl Action {
    /// Wire name of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            _ => Err(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Proof
// ---------------------------------------------------------------------------

/// Linked-data proof attached to a delegated capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    /// Signature suite. Only `Ed25519Signature2018` is supported.
    #[serde(rename = "type")]
    pub kind: String,
    /// RFC 3339 creation timestamp of the proof.
    pub created: String,
    /// Key the proof verifies under (a did:key URL with fragment).
    pub verification_method: String,
    /// Proof purpose; delegations carry `capabilityDelegation`.
    pub proof_purpose: String,
    /// Base64 signature over the canonical form of the capability minus
    /// this proof.
    pub proof_value: String,
}

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// A capability document: root (materialized, proof-less) or delegated
/// (stored verbatim with its delegation proof).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    /// JSON-LD context.
    #[serde(rename = "@context")]
    pub context: String,

    /// Capability identifier URL.
    pub id: String,

    /// The URL this capability authorizes requests against.
    pub invocation_target: String,

    /// Owning principal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,

    /// Principal(s) allowed to invoke.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoker: Option<OneOrMany>,

    /// Principal(s) allowed to delegate further.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegator: Option<OneOrMany>,

    /// For delegated capabilities: the root capability delegated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_capability: Option<String>,

    /// Action caveat on delegated capabilities. Absent means any action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_action: Option<OneOrMany>,

    /// Delegation proof. Root capabilities never carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
}

impl Capability {
    /// Returns `true` when `principal` may invoke this capability.
    ///
    /// Checks `invoker` first, falling back to `controller` when no invoker
    /// is named.
    #[must_use]
    pub fn permits_invoker(&self, principal: &str) -> bool {
        match (&self.invoker, &self.controller) {
            (Some(invoker), _) => invoker.contains(principal),
            (None, Some(controller)) => controller == principal,
            (None, None) => false,
        }
    }

    /// Returns `true` when `action` passes this capability's action caveat.
    ///
    /// An absent caveat permits any action (the root-capability case; roots
    /// are constrained by their target instead).
    #[must_use]
    pub fn permits_action(&self, action: Action) -> bool {
        match &self.allowed_action {
            Some(allowed) => allowed.contains(action.as_str()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SECURITY_CONTEXT_V2;
    use serde_json::json;

    fn delegated() -> Capability {
        Capability {
            context: SECURITY_CONTEXT_V2.into(),
            id: "urn:zcap:z1Cap".into(),
            invocation_target: "https://hub.example/data-hubs/zHub/documents/zDoc".into(),
            controller: None,
            invoker: Some(OneOrMany::One("did:key:zBob".into())),
            delegator: None,
            parent_capability: Some(
                "https://hub.example/data-hubs/zHub/zcaps/documents/zDoc".into(),
            ),
            allowed_action: Some(OneOrMany::One("read".into())),
            proof: None,
        }
    }

    #[test]
    fn action_parse_and_display() {
        assert_eq!("read".parse::<Action>().unwrap(), Action::Read);
        assert_eq!("write".parse::<Action>().unwrap(), Action::Write);
        assert!("admin".parse::<Action>().is_err());
        assert_eq!(Action::Write.to_string(), "write");
    }

    #[test]
    fn context_serializes_as_at_context() {
        let v = serde_json::to_value(delegated()).unwrap();
        assert_eq!(v["@context"], SECURITY_CONTEXT_V2);
        assert!(v.get("invocationTarget").is_some());
        assert!(v.get("proof").is_none());
    }

    #[test]
    fn invoker_checked_before_controller() {
        let cap = delegated();
        assert!(cap.permits_invoker("did:key:zBob"));
        assert!(!cap.permits_invoker("did:key:zEve"));
    }

    #[test]
    fn controller_is_invoker_fallback() {
        let mut cap = delegated();
        cap.invoker = None;
        cap.controller = Some("did:key:zAlice".into());
        assert!(cap.permits_invoker("did:key:zAlice"));
        assert!(!cap.permits_invoker("did:key:zBob"));
    }

    #[test]
    fn action_caveat_enforced() {
        let cap = delegated();
        assert!(cap.permits_action(Action::Read));
        assert!(!cap.permits_action(Action::Write));
    }

    #[test]
    fn absent_caveat_permits_any_action() {
        let mut cap = delegated();
        cap.allowed_action = None;
        assert!(cap.permits_action(Action::Read));
        assert!(cap.permits_action(Action::Write));
    }

    #[test]
    fn allowed_action_accepts_list_form() {
        let cap: Capability = serde_json::from_value(json!({
            "@context": SECURITY_CONTEXT_V2,
            "id": "urn:zcap:z1Cap",
            "invocationTarget": "https://hub.example/data-hubs/zHub/query",
            "allowedAction": ["read", "write"],
        }))
        .unwrap();
        assert!(cap.permits_action(Action::Read));
        assert!(cap.permits_action(Action::Write));
    }
}
