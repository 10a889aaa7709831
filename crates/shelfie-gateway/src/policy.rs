//! Access policy engine
//!
//! Evaluates the [`AccessPolicy`] attached to an object path (or the
//! category default when none is attached yet) against a requester
//! identity. Evaluation is default-deny and runs on every read and write;
//! nothing is cached on the caller's side, because visibility can change
//! between requests without the bytes being re-uploaded.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use shelfie_core::{
    AccessPolicy, Category, ObjectPath, Permission, Principal, Visibility,
};
use tokio::sync::RwLock;

/// Operation being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

/// Pluggable group membership resolution.
///
/// The rule engine only needs a membership predicate; where memberships
/// come from (static list, directory lookup) is an integration concern.
pub trait GroupResolver: Send + Sync {
    fn is_member(&self, identity: &str, group: &str) -> bool;
}

/// Pseudo-group containing every non-empty identity. Category defaults use
/// it to grant object creation to any signed-in user through the same rule
/// machinery that governs per-object access.
pub const AUTHENTICATED_GROUP: &str = "authenticated";

/// Static, in-memory group membership.
#[derive(Default)]
pub struct StaticGroups {
    groups: HashMap<String, HashSet<String>>,
}

impl StaticGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(
        mut self,
        group: impl Into<String>,
        members: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.groups.insert(
            group.into(),
            members.into_iter().map(Into::into).collect(),
        );
        self
    }
}

impl GroupResolver for StaticGroups {
    fn is_member(&self, identity: &str, group: &str) -> bool {
        if group == AUTHENTICATED_GROUP {
            return !identity.is_empty();
        }
        self.groups
            .get(group)
            .map(|members| members.contains(identity))
            .unwrap_or(false)
    }
}

/// Where policies live. The shipped implementation is in-memory; the trait
/// is async so a database-backed store slots in without touching the
/// engine.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn attach(&self, path: &ObjectPath, policy: AccessPolicy);

    async fn lookup(&self, path: &ObjectPath) -> Option<AccessPolicy>;

    /// Default policy for paths that do not exist yet in this category.
    fn category_default(&self, category: Category) -> AccessPolicy;
}

/// In-memory policy store keyed by object path.
pub struct InMemoryPolicyStore {
    policies: RwLock<HashMap<String, AccessPolicy>>,
    category_defaults: HashMap<Category, AccessPolicy>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        let mut category_defaults = HashMap::new();
        // New objects may be created by any authenticated identity; reads
        // of unattached paths stay private.
        category_defaults.insert(
            Category::Items,
            AccessPolicy::private("").with_rule(
                Principal::Group(AUTHENTICATED_GROUP.to_string()),
                Permission::Write,
            ),
        );

        InMemoryPolicyStore {
            policies: RwLock::new(HashMap::new()),
            category_defaults,
        }
    }

    pub fn with_category_default(mut self, category: Category, policy: AccessPolicy) -> Self {
        self.category_defaults.insert(category, policy);
        self
    }
}

impl Default for InMemoryPolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn attach(&self, path: &ObjectPath, policy: AccessPolicy) {
        self.policies.write().await.insert(path.key(), policy);
    }

    async fn lookup(&self, path: &ObjectPath) -> Option<AccessPolicy> {
        self.policies.read().await.get(&path.key()).cloned()
    }

    fn category_default(&self, category: Category) -> AccessPolicy {
        self.category_defaults
            .get(&category)
            .cloned()
            .unwrap_or_else(|| AccessPolicy::private(""))
    }
}

/// The policy engine: store + membership resolution + evaluation.
pub struct PolicyEngine {
    store: Arc<dyn PolicyStore>,
    groups: Arc<dyn GroupResolver>,
}

impl PolicyEngine {
    pub fn new(store: Arc<dyn PolicyStore>, groups: Arc<dyn GroupResolver>) -> Self {
        PolicyEngine { store, groups }
    }

    /// Authorize an operation on a path against its attached policy, or
    /// the category default if none is attached.
    pub async fn authorize(&self, path: &ObjectPath, identity: &str, operation: Operation) -> bool {
        let policy = match self.store.lookup(path).await {
            Some(policy) => policy,
            None => self.store.category_default(path.category()),
        };
        self.evaluate(&policy, identity, operation)
    }

    /// Authorize creation of a not-yet-existing object in a category.
    pub async fn authorize_create(&self, category: Category, identity: &str) -> bool {
        let policy = self.store.category_default(category);
        self.evaluate(&policy, identity, Operation::Write)
    }

    pub fn store(&self) -> &Arc<dyn PolicyStore> {
        &self.store
    }

    /// Default-deny evaluation.
    ///
    /// Owner identity always grants the operation. Otherwise the first
    /// rule whose principal matches the requester decides: its permission
    /// must equal the operation, and later rules are not consulted. A
    /// public visibility grants reads before rules are considered.
    fn evaluate(&self, policy: &AccessPolicy, identity: &str, operation: Operation) -> bool {
        if !identity.is_empty() && identity == policy.owner {
            return true;
        }

        if operation == Operation::Read && policy.visibility == Visibility::Public {
            return true;
        }

        let needed = match operation {
            Operation::Read => Permission::Read,
            Operation::Write => Permission::Write,
        };

        policy
            .rules
            .iter()
            .find(|rule| self.principal_matches(&rule.principal, identity))
            .map(|rule| rule.permission == needed)
            .unwrap_or(false)
    }

    fn principal_matches(&self, principal: &Principal, identity: &str) -> bool {
        match principal {
            Principal::User(id) => !identity.is_empty() && identity == id,
            Principal::Group(group) => self.groups.is_member(identity, group),
        }
    }
}
