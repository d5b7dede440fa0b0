//! Static role → scopes permission table

use crate::error::{AuthzError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Role → granted scopes mapping, established once at process start
///
/// The table is immutable after construction and shared by reference
/// (`Arc<PermissionTable>`) between all requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionTable {
    grants: HashMap<String, Vec<String>>,
}

impl PermissionTable {
    /// Build a table from role → scopes pairs
    pub fn new<I, R, S>(grants: I) -> Self
    where
        I: IntoIterator<Item = (R, Vec<S>)>,
        R: Into<String>,
        S: Into<String>,
    {
        Self {
            grants: grants
                .into_iter()
                .map(|(role, scopes)| (role.into(), scopes.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }

    /// Decode a table from its JSON text, e.g. `{"admin": ["item:read"]}`
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| AuthzError::Config(format!("Invalid permission table: {}", e)))
    }

    /// Decode a table from base64-encoded JSON
    pub fn from_base64_json(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| AuthzError::Config(format!("Permission table is not valid base64: {}", e)))?;
        let json = String::from_utf8(bytes)
            .map_err(|e| AuthzError::Config(format!("Permission table is not UTF-8: {}", e)))?;
        Self::from_json(&json)
    }

    /// Scopes granted to `role`, if the role is known
    pub fn scopes_for(&self, role: &str) -> Option<&[String]> {
        self.grants.get(role).map(Vec::as_slice)
    }

    /// Union of the scopes granted to `roles`, first-seen order, no duplicates
    pub fn union_of<'a, I>(&self, roles: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut union: Vec<String> = Vec::new();
        for scope in roles.into_iter().filter_map(|role| self.scopes_for(role)).flatten() {
            if !union.contains(scope) {
                union.push(scope.clone());
            }
        }
        union
    }

    /// Number of roles in the table
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// Whether the table has no roles
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}
