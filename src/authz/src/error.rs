//! Error types for the authorization gate

use thiserror::Error;

/// Authorization gate errors
///
/// Every variant is terminal for the decision in flight: the guarded operation
/// never runs once one of these has been produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    /// No bearer value found in the request
    #[error("No authorization token.")]
    NoCredential,

    /// Signature or format verification failed
    #[error("You are not authorized for this resource.")]
    CredentialInvalid,

    /// Credential was well-formed but past its expiry
    #[error("You are not authorized for this resource.")]
    CredentialExpired,

    /// Identity resolved but lacks a required scope
    #[error("You are not authorized for this resource.")]
    InsufficientScope,

    /// Identity resolved but lacks a required role
    #[error("You are not authorized for this resource.")]
    InsufficientRole,

    /// Neither a role nor a scope could be determined for the identity
    #[error("No scopes or roles could be resolved for this identity.")]
    NoScopesOrRoles,

    /// Conditional scopes of one decision reference different resource types
    #[error("All conditional scopes must reference the same resource type.")]
    MixedResourceTypes,

    /// Conditional evaluation was required but no backend driver is configured
    #[error("No backend driver is provided, conditional scopes cannot be verified.")]
    NoDriver,

    /// Invalid startup configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthzError {
    /// Stable identifier used in logs, metric labels and error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoCredential => "no_credential",
            Self::CredentialInvalid => "credential_invalid",
            Self::CredentialExpired => "credential_expired",
            Self::InsufficientScope => "insufficient_scope",
            Self::InsufficientRole => "insufficient_role",
            Self::NoScopesOrRoles => "no_scopes_or_roles",
            Self::MixedResourceTypes => "mixed_resource_types",
            Self::NoDriver => "no_driver",
            Self::Config(_) => "config",
        }
    }

    /// Whether this is a misconfiguration rather than a security decision
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::NoDriver | Self::NoScopesOrRoles | Self::Config(_))
    }

    /// Whether the failure happened while verifying the credential
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::NoCredential | Self::CredentialInvalid | Self::CredentialExpired
        )
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
