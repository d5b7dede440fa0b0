//! Core authorization types

use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Claims recovered from a verified credential
pub type Claims = serde_json::Map<String, Value>;

/// Role identifier
pub type RoleId = String;

/// One or many roles, as carried by a credential or the default role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Roles {
    /// A single role (`"role": "admin"`)
    One(RoleId),
    /// A role array (`"roles": ["admin", "editor"]`)
    Many(Vec<RoleId>),
}

impl Roles {
    /// Read roles out of a claim value.
    ///
    /// Empty strings count as absent. Non-string array members are dropped;
    /// any other shape is treated as absent.
    pub fn from_claim(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self::One(s.clone())),
            Value::Array(items) => Some(Self::Many(
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
            )),
            _ => None,
        }
    }

    /// Iterate over the role names
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[RoleId] = match self {
            Self::One(role) => std::slice::from_ref(role),
            Self::Many(roles) => roles,
        };
        slice.iter().map(String::as_str)
    }

    /// Whether `role` is one of these roles
    pub fn contains(&self, role: &str) -> bool {
        self.iter().any(|r| r == role)
    }

    /// Whether these roles are exactly the single role `role`
    pub fn is_only(&self, role: &str) -> bool {
        let mut iter = self.iter();
        iter.next() == Some(role) && iter.next().is_none()
    }
}

impl From<&str> for Roles {
    fn from(role: &str) -> Self {
        Self::One(role.to_string())
    }
}

/// Read a scope list out of a claim value. A lone string becomes a one-element list.
pub fn scopes_from_claim(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) if !s.is_empty() => Some(vec![s.clone()]),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
        ),
        _ => None,
    }
}

/// Resolved roles and scopes of the caller for one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Resolved roles, if any could be determined
    pub roles: Option<Roles>,

    /// Resolved scopes, in resolution order
    pub scopes: Option<Vec<String>>,
}

impl Identity {
    /// Create an identity from its parts
    pub fn new(roles: Option<Roles>, scopes: Option<Vec<String>>) -> Self {
        Self { roles, scopes }
    }

    /// Additive merge: fill only the fields that are still unresolved
    pub fn merge(&mut self, other: Identity) {
        if self.roles.is_none() {
            self.roles = other.roles;
        }
        if self.scopes.is_none() {
            self.scopes = other.scopes;
        }
    }

    /// Scopes held by this identity, empty when unresolved
    pub fn scopes(&self) -> &[String] {
        self.scopes.as_deref().unwrap_or(&[])
    }
}

/// Per-request context the gate reads from and writes onto
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Normalized claims of the verified credential
    pub claims: Option<Claims>,

    /// Identity resolved by earlier checks of the same request
    pub identity: Option<Identity>,
}

impl RequestContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `resolved` into the context identity without overwriting resolved fields
    pub fn merge_identity(&mut self, resolved: Identity) -> &Identity {
        let identity = self.identity.get_or_insert_with(Identity::default);
        identity.merge(resolved);
        identity
    }

    /// Subject identifier read from `claim` of the verified credential
    pub fn subject_id(&self, claim: &str) -> Option<&str> {
        self.claims
            .as_ref()
            .and_then(|claims| claims.get(claim))
            .and_then(Value::as_str)
    }
}

/// Policy requirement attached to a guarded operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// Any of these scopes satisfies the requirement
    Scopes(Vec<String>),
    /// Any of these roles satisfies the requirement
    Roles(Vec<RoleId>),
    /// A verified credential is enough
    Authenticated,
}

impl Requirement {
    /// Scope requirement from string slices
    pub fn scopes<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Scopes(scopes.into_iter().map(Into::into).collect())
    }

    /// Role requirement from string slices
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Roles(roles.into_iter().map(Into::into).collect())
    }
}

/// Outcome of one authorization decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationDecision {
    /// Access granted with the resolved identity
    Allow(Identity),
    /// Access refused with the classified reason
    Deny(AuthzError),
}

impl AuthorizationDecision {
    /// Whether access is granted
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }

    /// Deny reason, if denied
    pub fn reason(&self) -> Option<&AuthzError> {
        match self {
            Self::Allow(_) => None,
            Self::Deny(err) => Some(err),
        }
    }

    /// Convert into a `Result`, mapping Deny to its error
    pub fn into_result(self) -> Result<Identity> {
        match self {
            Self::Allow(identity) => Ok(identity),
            Self::Deny(err) => Err(err),
        }
    }
}
