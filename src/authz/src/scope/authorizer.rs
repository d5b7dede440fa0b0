/// Scope authorizer
///
/// Matches required scopes against held scopes. Unconditional grants decide
/// immediately; conditional grants are handed to the
/// [`ConditionalEvaluator`] which consults the backend.

use std::sync::Arc;
use tracing::debug;

use super::types::{Scope, ScopeKind};
use crate::conditional::ConditionalEvaluator;
use crate::error::Result;

/// Outcome of matching required scopes against held scopes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeMatch {
    /// An unconditional grant (or an empty requirement) satisfies the requirement
    Satisfied,
    /// Only conditional grants match; the backend must decide
    Pending(Vec<Scope>),
    /// Nothing held matches
    Unsatisfied,
}

/// Match `required` against `held`.
///
/// Every held scope starting with a required scope is a candidate, which
/// covers both the exact grant and its conditional variants: requiring
/// `item:edit` picks up `item:edit` and `item:edit:owner`. Candidates that are
/// neither two- nor three-segment scopes are discarded.
pub fn match_scopes<R, H>(required: &[R], held: &[H]) -> ScopeMatch
where
    R: AsRef<str>,
    H: AsRef<str>,
{
    if required.is_empty() {
        return ScopeMatch::Satisfied;
    }

    let mut candidates: Vec<&str> = Vec::new();
    for requirement in required.iter().map(AsRef::as_ref) {
        for scope in held.iter().map(AsRef::as_ref) {
            if scope.starts_with(requirement) && !candidates.contains(&scope) {
                candidates.push(scope);
            }
        }
    }

    let parsed: Vec<Scope> = candidates
        .into_iter()
        .filter_map(|candidate| Scope::new(candidate).ok())
        .collect();

    if parsed.iter().any(|scope| scope.kind() == ScopeKind::Unconditional) {
        return ScopeMatch::Satisfied;
    }

    if parsed.is_empty() {
        ScopeMatch::Unsatisfied
    } else {
        ScopeMatch::Pending(parsed)
    }
}

/// Decides scope requirements, delegating conditional grants to the backend
#[derive(Debug, Clone)]
pub struct ScopeAuthorizer {
    evaluator: Arc<ConditionalEvaluator>,
}

impl ScopeAuthorizer {
    /// Create an authorizer backed by `evaluator`
    pub fn new(evaluator: Arc<ConditionalEvaluator>) -> Self {
        Self { evaluator }
    }

    /// The evaluator conditional grants are delegated to
    pub fn evaluator(&self) -> &ConditionalEvaluator {
        &self.evaluator
    }

    /// Whether `held` satisfies `required` for `resource_id`
    ///
    /// # Errors
    ///
    /// Only conditional evaluation can fail: [`AuthzError::NoDriver`] when no
    /// backend is configured and [`AuthzError::MixedResourceTypes`] when the
    /// pending scopes span resource types.
    ///
    /// [`AuthzError::NoDriver`]: crate::AuthzError::NoDriver
    /// [`AuthzError::MixedResourceTypes`]: crate::AuthzError::MixedResourceTypes
    pub async fn authorize<R, H>(
        &self,
        required: &[R],
        held: &[H],
        subject_id: Option<&str>,
        resource_id: Option<&str>,
    ) -> Result<bool>
    where
        R: AsRef<str>,
        H: AsRef<str>,
    {
        match match_scopes(required, held) {
            ScopeMatch::Satisfied => Ok(true),
            ScopeMatch::Unsatisfied => Ok(false),
            ScopeMatch::Pending(conditional) => {
                debug!(count = conditional.len(), "Delegating conditional scopes");
                self.evaluator
                    .check_conditional_scopes(&conditional, subject_id, resource_id)
                    .await
            }
        }
    }
}
