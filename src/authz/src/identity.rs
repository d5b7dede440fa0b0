//! Identity resolution
//!
//! Combines verified claims with the static [`PermissionTable`] into the
//! [`Identity`] the scope and role checks run against.
//!
//! Precedence:
//!
//! 1. No claims: the default role, with the table's scopes for it.
//! 2. Claims: roles from the role claim (or the default role), and
//!    - claim scopes when present, verbatim,
//!    - otherwise nothing without a table,
//!    - otherwise the table's scopes for a single role,
//!    - otherwise the ordered union of the table's scopes for a role array.

use crate::permissions::PermissionTable;
use crate::types::{scopes_from_claim, Claims, Identity, Roles};
use std::sync::Arc;
use tracing::debug;

/// Claim keys searched for roles, in order
const ROLE_CLAIMS: [&str; 4] = ["role", "roles", "Role", "Roles"];

/// Claim keys searched for scopes, in order
const SCOPE_CLAIMS: [&str; 4] = ["scope", "scopes", "Scope", "Scopes"];

/// Resolves an [`Identity`] from claims, the default role and the permission table
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    /// Role assumed when the caller carries none
    default_role: Option<String>,

    /// Static permission table, if configured
    permissions: Option<Arc<PermissionTable>>,

    /// Claim read for roles ahead of the standard role claims
    role_claim_key: Option<String>,
}

impl IdentityResolver {
    /// Create a resolver
    pub fn new(default_role: Option<String>, permissions: Option<Arc<PermissionTable>>) -> Self {
        Self {
            default_role,
            permissions,
            role_claim_key: None,
        }
    }

    /// Read roles from `key` before the standard role claims
    pub fn with_role_claim_key(mut self, key: impl Into<String>) -> Self {
        self.role_claim_key = Some(key.into());
        self
    }

    /// The configured default role
    pub fn default_role(&self) -> Option<&str> {
        self.default_role.as_deref()
    }

    /// The configured permission table
    pub fn permissions(&self) -> Option<&PermissionTable> {
        self.permissions.as_deref()
    }

    /// Resolve the identity for `claims` (`None` when no credential was verified)
    pub fn resolve(&self, claims: Option<&Claims>) -> Identity {
        let Some(claims) = claims else {
            let roles = self.default_roles();
            let scopes = match (&self.permissions, &self.default_role) {
                (Some(table), Some(role)) => table.scopes_for(role).map(<[String]>::to_vec),
                _ => None,
            };
            debug!(?roles, "Resolved anonymous identity");
            return Identity::new(roles, scopes);
        };

        let roles = self.roles_from(claims).or_else(|| self.default_roles());
        let claim_scopes = SCOPE_CLAIMS
            .iter()
            .find_map(|key| claims.get(*key).and_then(scopes_from_claim));

        let scopes = match (claim_scopes, &self.permissions, &roles) {
            (Some(scopes), _, _) => Some(scopes),
            (None, None, _) => None,
            (None, Some(table), Some(Roles::One(role))) => {
                table.scopes_for(role).map(<[String]>::to_vec)
            }
            (None, Some(table), Some(roles @ Roles::Many(_))) => Some(table.union_of(roles.iter())),
            (None, Some(_), None) => None,
        };

        debug!(?roles, scopes = scopes.as_ref().map(Vec::len), "Resolved identity");
        Identity::new(roles, scopes)
    }

    fn roles_from(&self, claims: &Claims) -> Option<Roles> {
        self.role_claim_key
            .iter()
            .map(String::as_str)
            .chain(ROLE_CLAIMS)
            .find_map(|key| claims.get(key).and_then(Roles::from_claim))
    }

    fn default_roles(&self) -> Option<Roles> {
        self.default_role.as_deref().map(Roles::from)
    }
}
