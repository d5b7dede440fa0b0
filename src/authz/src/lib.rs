//! # Scopegate Authorization
//!
//! Request authorization for services that guard operations by scope, role or
//! plain authentication.
//!
//! ## Features
//!
//! - **Credential verification** of HS256 and RS256 bearer tokens, with optional cookie fallback
//! - **Claim normalization** of namespaced claims such as `https://example.com/role`
//! - **Identity resolution** from claims, a default role and a static role→scopes table
//! - **Scope authorization** with `resource:action` and `resource:action:condition` grants
//! - **Conditional policies** answered by a pluggable backend in a single round-trip
//! - **axum middleware** and a decorator for arbitrary async operations
//! - **Prometheus metrics** for decisions and backend evaluations
//!
//! ## Example
//!
//! ```rust
//! use scopegate_authz::{
//!     AuthorizationGate, ConditionRegistry, GateConfig, RequestContext, Requirement,
//! };
//! use http::HeaderMap;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GateConfig {
//!         jwt_secret: Some("change-me".into()),
//!         ..Default::default()
//!     };
//!     let gate = AuthorizationGate::from_config(&config, Arc::new(ConditionRegistry::new()), None)?;
//!
//!     // No Authorization header: the caller is told to authenticate
//!     let decision = gate
//!         .decide(&HeaderMap::new(), &Requirement::scopes(["item:read"]), &mut RequestContext::new(), None)
//!         .await;
//!
//!     assert!(!decision.is_allowed());
//!     Ok(())
//! }
//! ```

pub mod claims;
pub mod conditional;
pub mod config;
pub mod credential;
pub mod error;
pub mod gate;
pub mod http;
pub mod identity;
pub mod metrics;
pub mod permissions;
pub mod scope;  // Scope parsing and matching
pub mod types;

// Re-export commonly used types
pub use claims::ClaimNormalizer;
pub use conditional::{BackendDriver, ConditionRegistry, ConditionalEvaluator, Session};
pub use config::GateConfig;
pub use credential::{CredentialVerifier, RequestParts};
pub use error::{AuthzError, Result};
pub use gate::{AuthorizationGate, Guarded};
pub use identity::IdentityResolver;
pub use metrics::{GateMetrics, MetricsCollector};
pub use permissions::PermissionTable;
pub use scope::{Scope, ScopeAuthorizer, ScopeError};
pub use types::{AuthorizationDecision, Claims, Identity, RequestContext, Requirement, Roles};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
