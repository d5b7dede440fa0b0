//! Authorization gate
//!
//! Runs one decision per guarded operation: verify the credential, resolve
//! and merge the identity, then check the requirement. Authentication failures
//! are held back in scope and role mode so that a caller who never
//! authenticated is told so instead of being told they lack a grant.

use crate::conditional::{BackendDriver, ConditionRegistry, ConditionalEvaluator};
use crate::config::{GateConfig, DEFAULT_SUBJECT_CLAIM};
use crate::credential::{CredentialVerifier, RequestParts};
use crate::error::{AuthzError, Result};
use crate::identity::IdentityResolver;
use crate::metrics::MetricsCollector;
use crate::scope::ScopeAuthorizer;
use crate::types::{AuthorizationDecision, Claims, Identity, RequestContext, Requirement};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Decides whether a request may run a guarded operation
#[derive(Debug)]
pub struct AuthorizationGate {
    verifier: CredentialVerifier,
    resolver: IdentityResolver,
    authorizer: ScopeAuthorizer,

    /// Claim read for the subject id handed to conditional policies
    subject_claim: String,

    metrics: Option<Arc<MetricsCollector>>,
}

impl AuthorizationGate {
    /// Create a gate from its parts
    pub fn new(
        verifier: CredentialVerifier,
        resolver: IdentityResolver,
        authorizer: ScopeAuthorizer,
    ) -> Self {
        Self {
            verifier,
            resolver,
            authorizer,
            subject_claim: DEFAULT_SUBJECT_CLAIM.to_string(),
            metrics: None,
        }
    }

    /// Build a gate from `config`, the frozen condition registry and an optional backend
    pub fn from_config(
        config: &GateConfig,
        registry: Arc<ConditionRegistry>,
        driver: Option<Arc<dyn BackendDriver>>,
    ) -> Result<Self> {
        let verifier = config.credential_verifier()?;
        let resolver = config.identity_resolver()?;

        info!(
            default_role = %config.default_role,
            roles = resolver.permissions().map(|t| t.len()).unwrap_or(0),
            conditions = registry.len(),
            driver = driver.is_some(),
            algorithm = ?verifier.algorithm(),
            "Authorization gate configured"
        );

        let evaluator = ConditionalEvaluator::new(driver, registry);
        let gate = Self::new(verifier, resolver, ScopeAuthorizer::new(Arc::new(evaluator)))
            .with_subject_claim(&config.subject_claim);
        Ok(gate)
    }

    /// Read the subject id from `claim` instead of `sub`
    pub fn with_subject_claim(mut self, claim: impl Into<String>) -> Self {
        self.subject_claim = claim.into();
        self
    }

    /// Record decisions, latencies and conditional evaluations in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        let evaluator = self.authorizer.evaluator().clone().with_metrics(metrics.clone());
        self.authorizer = ScopeAuthorizer::new(Arc::new(evaluator));
        self.metrics = Some(metrics);
        self
    }

    /// The credential verifier
    pub fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }

    /// The identity resolver
    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// The metrics collector, if configured
    pub fn metrics(&self) -> Option<&Arc<MetricsCollector>> {
        self.metrics.as_ref()
    }

    /// Decide `requirement` for `request`.
    ///
    /// On a verified credential the normalized claims are stored on `context`;
    /// in scope and role mode the resolved identity is merged into it.
    /// `resource_id` is handed to conditional policies.
    pub async fn decide<R>(
        &self,
        request: &R,
        requirement: &Requirement,
        context: &mut RequestContext,
        resource_id: Option<&str>,
    ) -> AuthorizationDecision
    where
        R: RequestParts + Sync + ?Sized,
    {
        let decision_id = Uuid::new_v4();
        let start = Instant::now();

        let decision = self
            .evaluate(request, requirement, context, resource_id)
            .await;

        match &decision {
            AuthorizationDecision::Allow(identity) => {
                debug!(%decision_id, ?requirement, roles = ?identity.roles, "Allowed")
            }
            AuthorizationDecision::Deny(reason) => {
                debug!(%decision_id, ?requirement, reason = reason.kind(), "Denied")
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_decision(&decision).await;
            metrics.record_latency(start.elapsed()).await;
        }

        decision
    }

    async fn evaluate<R>(
        &self,
        request: &R,
        requirement: &Requirement,
        context: &mut RequestContext,
        resource_id: Option<&str>,
    ) -> AuthorizationDecision
    where
        R: RequestParts + Sync + ?Sized,
    {
        let verified = self.verifier.verify(request);

        if let Requirement::Authenticated = requirement {
            return match verified {
                Ok(claims) => {
                    let identity = self.resolver.resolve(Some(&claims));
                    context.claims = Some(claims);
                    AuthorizationDecision::Allow(context.merge_identity(identity).clone())
                }
                Err(e) => AuthorizationDecision::Deny(e),
            };
        }

        let failure = match verified {
            Ok(claims) => {
                context.claims = Some(claims);
                None
            }
            Err(e) => Some(e),
        };

        let resolved = self.resolver.resolve(authenticated_claims(context, &failure));
        let identity = context.merge_identity(resolved).clone();

        let outcome = match requirement {
            Requirement::Scopes(required) if required.is_empty() => Ok(true),
            Requirement::Roles(required) if required.is_empty() => Ok(true),
            _ if identity.roles.is_none() && identity.scopes.is_none() => {
                Err(AuthzError::NoScopesOrRoles)
            }
            Requirement::Scopes(required) => {
                let subject_id = context.subject_id(&self.subject_claim);
                self.authorizer
                    .authorize(required, identity.scopes(), subject_id, resource_id)
                    .await
            }
            Requirement::Roles(required) => Ok(identity
                .roles
                .as_ref()
                .is_some_and(|roles| required.iter().any(|r| roles.contains(r)))),
            Requirement::Authenticated => Ok(true),
        };

        match outcome {
            Ok(true) => AuthorizationDecision::Allow(identity),
            Ok(false) => AuthorizationDecision::Deny(self.refusal(requirement, &identity, failure)),
            Err(e) => AuthorizationDecision::Deny(e),
        }
    }

    /// Reason for an unsatisfied requirement: the held-back authentication
    /// failure when the caller ended up with nothing but the default role
    fn refusal(
        &self,
        requirement: &Requirement,
        identity: &Identity,
        failure: Option<AuthzError>,
    ) -> AuthzError {
        let defaulted = match (&identity.roles, self.resolver.default_role()) {
            (Some(roles), Some(default_role)) => roles.is_only(default_role),
            _ => false,
        };

        match failure {
            Some(auth_error) if defaulted => auth_error,
            _ => match requirement {
                Requirement::Roles(_) => AuthzError::InsufficientRole,
                _ => AuthzError::InsufficientScope,
            },
        }
    }

    /// Wrap `operation` so it only runs once `requirement` is satisfied
    pub fn guard<F>(self: &Arc<Self>, requirement: Requirement, operation: F) -> Guarded<F> {
        Guarded {
            gate: Arc::clone(self),
            requirement: Arc::new(requirement),
            operation,
        }
    }
}

/// Claims only count once verification succeeded on this request
fn authenticated_claims<'c>(
    context: &'c RequestContext,
    failure: &Option<AuthzError>,
) -> Option<&'c Claims> {
    match failure {
        Some(_) => None,
        None => context.claims.as_ref(),
    }
}

/// An operation behind an authorization requirement
#[derive(Debug, Clone)]
pub struct Guarded<F> {
    gate: Arc<AuthorizationGate>,
    requirement: Arc<Requirement>,
    operation: F,
}

impl<F> Guarded<F> {
    /// The requirement checked before each call
    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Guard another operation with the same requirement
    pub fn apply<G>(&self, operation: G) -> Guarded<G> {
        Guarded {
            gate: Arc::clone(&self.gate),
            requirement: Arc::clone(&self.requirement),
            operation,
        }
    }

    /// Decide, then run the operation with `args` and the enriched context.
    ///
    /// The operation receives a snapshot of `context` after the decision; the
    /// caller keeps the enriched context for later checks on the same request.
    ///
    /// # Errors
    ///
    /// The deny reason; the operation is not run.
    pub async fn call<R, A, Fut, T>(
        &self,
        request: &R,
        context: &mut RequestContext,
        resource_id: Option<&str>,
        args: A,
    ) -> Result<T>
    where
        R: RequestParts + Sync + ?Sized,
        F: Fn(A, RequestContext) -> Fut,
        Fut: Future<Output = T>,
    {
        self.gate
            .decide(request, &self.requirement, context, resource_id)
            .await
            .into_result()?;

        Ok((self.operation)(args, context.clone()).await)
    }
}
