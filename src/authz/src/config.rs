//! Gate configuration
//!
//! Read once at process start, either from the environment or deserialized
//! from a host configuration file.

use crate::claims::ClaimNormalizer;
use crate::credential::CredentialVerifier;
use crate::error::{AuthzError, Result};
use crate::identity::IdentityResolver;
use crate::permissions::PermissionTable;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;

/// Role assumed for callers that carry none
pub const DEFAULT_ROLE: &str = "visitor";

/// Cookie read when cookie fallback is on
pub const DEFAULT_COOKIE_NAME: &str = "token";

/// Claim holding the subject id handed to conditional policies
pub const DEFAULT_SUBJECT_CLAIM: &str = "sub";

/// Authorization gate configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Role assumed for callers that carry none
    pub default_role: String,

    /// Base64-encoded JSON object mapping roles to scope lists
    pub permissions: Option<String>,

    /// Claim short-names mapped out of namespaced claim keys
    pub meta_claims: Vec<String>,

    /// HMAC secret or PEM-encoded RSA public key
    pub jwt_secret: Option<String>,

    /// Decode claims without verification when no secret is set
    pub allow_unverified: bool,

    /// Read the token from a cookie when the authorization header is missing
    pub cookie_fallback: bool,

    /// Cookie holding the token
    pub cookie_name: String,

    /// Claim read for roles ahead of `role`/`roles`/`Role`/`Roles`
    pub role_claim_key: Option<String>,

    /// Claim holding the subject id
    pub subject_claim: String,

    /// Clock skew tolerated on `exp` and `nbf`, in seconds
    pub leeway_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            default_role: DEFAULT_ROLE.to_string(),
            permissions: None,
            meta_claims: Vec::new(),
            jwt_secret: None,
            allow_unverified: false,
            cookie_fallback: false,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            role_claim_key: None,
            subject_claim: DEFAULT_SUBJECT_CLAIM.to_string(),
            leeway_secs: 0,
        }
    }
}

impl GateConfig {
    /// Load configuration from the process environment
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `DEFAULT_ROLE` | `default_role` |
    /// | `PERMISSIONS` | `permissions` |
    /// | `USER_METAS` | `meta_claims` (comma separated) |
    /// | `JWT_SECRET` | `jwt_secret` |
    /// | `JWT_NO_VERIFY` | `allow_unverified` |
    /// | `JWT_COOKIE` | `cookie_fallback` |
    /// | `JWT_COOKIE_NAME` | `cookie_name` |
    /// | `AUTH_DIRECTIVES_ROLE_KEY` | `role_claim_key` |
    /// | `JWT_SUBJECT_CLAIM` | `subject_claim` |
    /// | `JWT_LEEWAY_SECS` | `leeway_secs` |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(v) = var("DEFAULT_ROLE") {
            cfg.default_role = v.trim().to_string();
        }
        cfg.permissions = var("PERMISSIONS");
        if let Some(v) = var("USER_METAS") {
            cfg.meta_claims = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        cfg.jwt_secret = var("JWT_SECRET");
        if let Some(v) = var("JWT_NO_VERIFY") {
            cfg.allow_unverified = parse_flag("JWT_NO_VERIFY", &v)?;
        }
        if let Some(v) = var("JWT_COOKIE") {
            cfg.cookie_fallback = parse_flag("JWT_COOKIE", &v)?;
        }
        if let Some(v) = var("JWT_COOKIE_NAME") {
            cfg.cookie_name = v.trim().to_string();
        }
        cfg.role_claim_key = var("AUTH_DIRECTIVES_ROLE_KEY").map(|v| v.trim().to_string());
        if let Some(v) = var("JWT_SUBJECT_CLAIM") {
            cfg.subject_claim = v.trim().to_string();
        }
        if let Some(v) = var("JWT_LEEWAY_SECS") {
            cfg.leeway_secs = v.trim().parse().map_err(|_| {
                AuthzError::Config(format!("JWT_LEEWAY_SECS must be a number of seconds, got '{}'", v))
            })?;
        }

        Ok(cfg)
    }

    /// Decode the configured permission table
    pub fn permission_table(&self) -> Result<Option<PermissionTable>> {
        self.permissions
            .as_deref()
            .map(PermissionTable::from_base64_json)
            .transpose()
    }

    /// Build the credential verifier described by this configuration
    pub fn credential_verifier(&self) -> Result<CredentialVerifier> {
        let mut verifier = CredentialVerifier::new(self.jwt_secret.as_deref())?
            .allow_unverified(self.allow_unverified)
            .with_leeway(self.leeway_secs)
            .with_normalizer(ClaimNormalizer::new(&self.meta_claims));
        if self.cookie_fallback {
            verifier = verifier.with_cookie_fallback(&self.cookie_name);
        }
        Ok(verifier)
    }

    /// Build the identity resolver described by this configuration
    pub fn identity_resolver(&self) -> Result<IdentityResolver> {
        let default_role = Some(self.default_role.clone()).filter(|r| !r.is_empty());
        let table = self.permission_table()?.map(Arc::new);
        let resolver = IdentityResolver::new(default_role, table);

        Ok(match &self.role_claim_key {
            Some(key) => resolver.with_role_claim_key(key),
            None => resolver,
        })
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AuthzError::Config(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}
