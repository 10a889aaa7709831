//! Access policy model
//!
//! Every stored object carries an [`AccessPolicy`]; categories carry a
//! default policy used for paths that do not exist yet. Evaluation lives in
//! the gateway crate; this module only defines the shape.

use serde::{Deserialize, Serialize};

/// Read posture of an object prior to rule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// Operation a rule can grant. Write does not imply read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
}

/// The subject of a rule: a single user identity or a named group.
/// Group membership resolution is pluggable; see the gateway crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Principal {
    User(String),
    Group(String),
}

/// A single ordered rule. The first rule whose principal matches the
/// requester decides; rules are not merged beyond that match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub principal: Principal,
    pub permission: Permission,
}

/// Policy attached to an object path (or to a category as its default).
///
/// Evaluation is default-deny: absent an explicit allow, access is denied
/// unless visibility is public and the request is a read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub owner: String,
    pub visibility: Visibility,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

impl AccessPolicy {
    /// Owner-only policy; nobody else can read or write.
    pub fn private(owner: impl Into<String>) -> Self {
        AccessPolicy {
            owner: owner.into(),
            visibility: Visibility::Private,
            rules: Vec::new(),
        }
    }

    /// World-readable policy; writes remain owner-gated.
    pub fn public(owner: impl Into<String>) -> Self {
        AccessPolicy {
            owner: owner.into(),
            visibility: Visibility::Public,
            rules: Vec::new(),
        }
    }

    /// Append a rule, preserving evaluation order.
    pub fn with_rule(mut self, principal: Principal, permission: Permission) -> Self {
        self.rules.push(PolicyRule {
            principal,
            permission,
        });
        self
    }
}
