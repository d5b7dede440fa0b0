//! Conditional policy evaluator
//!
//! Resolves resource-dependent grants with exactly one backend round-trip per
//! decision. Backend failures of any kind deny; only configuration and caller
//! errors ([`AuthzError::NoDriver`], [`AuthzError::MixedResourceTypes`]) are
//! returned as errors.

use super::driver::BackendDriver;
use super::error::BackendResult;
use super::query::{CompositeQuery, RESULT_FIELD};
use super::registry::ConditionRegistry;
use crate::error::{AuthzError, Result};
use crate::metrics::MetricsCollector;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Evaluates conditional scopes against the configured backend
#[derive(Clone)]
pub struct ConditionalEvaluator {
    /// Backend answering composed queries
    driver: Option<Arc<dyn BackendDriver>>,

    /// Condition name → fragment generator
    registry: Arc<ConditionRegistry>,

    /// Optional decision metrics
    metrics: Option<Arc<MetricsCollector>>,
}

impl ConditionalEvaluator {
    /// Create an evaluator
    pub fn new(driver: Option<Arc<dyn BackendDriver>>, registry: Arc<ConditionRegistry>) -> Self {
        Self {
            driver,
            registry,
            metrics: None,
        }
    }

    /// Record evaluations and backend failures in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Whether a backend driver is configured
    pub fn has_driver(&self) -> bool {
        self.driver.is_some()
    }

    /// The condition registry
    pub fn registry(&self) -> &ConditionRegistry {
        &self.registry
    }

    /// Decide `scopes` for `subject_id` on `resource_id`.
    ///
    /// Every scope must share the same leading resource type. Each scope
    /// contributes the condition `<resourceType>:<lastSegment>`; unregistered
    /// conditions contribute nothing. The composed query is run once and any
    /// satisfied condition allows.
    pub async fn check_conditional_scopes<S>(
        &self,
        scopes: &[S],
        subject_id: Option<&str>,
        resource_id: Option<&str>,
    ) -> Result<bool>
    where
        S: AsRef<str>,
    {
        let driver = self.driver.as_ref().ok_or(AuthzError::NoDriver)?;

        let shared_type = single_resource_type(scopes)?.unwrap_or_default();
        let fragments: Vec<String> = scopes
            .iter()
            .filter_map(|scope| {
                let key = condition_key(shared_type, scope.as_ref());
                match self.registry.get(&key) {
                    Some(generator) => Some(generator(subject_id, resource_id)),
                    None => {
                        debug!(condition = %key, "Skipping unregistered condition");
                        None
                    }
                }
            })
            .collect();

        let query = CompositeQuery::compose(&fragments);
        debug!(
            resource_type = shared_type,
            conditions = query.conditions(),
            "Evaluating conditional scopes"
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_conditional_evaluation().await;
        }

        match run_query(&**driver, &query).await {
            Ok(allowed) => Ok(allowed),
            Err(e) => {
                warn!(error = %e, "Conditional evaluation failed, denying");
                if let Some(metrics) = &self.metrics {
                    metrics.record_backend_failure().await;
                }
                Ok(false)
            }
        }
    }

    /// Decide the intersection of `required` and `held` conditionally.
    ///
    /// For callers that have already established set membership themselves.
    /// Returns `no_intersection_result` without touching the backend when no
    /// required scope is held.
    pub async fn satisfies_conditional_scopes<R, H>(
        &self,
        required: &[R],
        held: &[H],
        subject_id: Option<&str>,
        resource_id: Option<&str>,
        no_intersection_result: bool,
    ) -> Result<bool>
    where
        R: AsRef<str>,
        H: AsRef<str>,
    {
        let intersection: Vec<&str> = required
            .iter()
            .map(AsRef::as_ref)
            .filter(|scope| held.iter().any(|h| h.as_ref() == *scope))
            .collect();

        if intersection.is_empty() {
            return Ok(no_intersection_result);
        }

        self.check_conditional_scopes(&intersection, subject_id, resource_id)
            .await
    }
}

impl fmt::Debug for ConditionalEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalEvaluator")
            .field("driver", &self.driver.is_some())
            .field("registry", &self.registry)
            .finish()
    }
}

/// The resource type shared by all `scopes`, `None` when there are none
fn single_resource_type<S: AsRef<str>>(scopes: &[S]) -> Result<Option<&str>> {
    let mut types = scopes.iter().map(|scope| resource_type(scope.as_ref()));
    let Some(first) = types.next() else {
        return Ok(None);
    };

    if types.all(|other| other == first) {
        Ok(Some(first))
    } else {
        Err(AuthzError::MixedResourceTypes)
    }
}

fn resource_type(scope: &str) -> &str {
    scope.split(':').next().unwrap_or_default().trim()
}

fn condition_key(resource_type: &str, scope: &str) -> String {
    let condition = scope.rsplit(':').next().unwrap_or_default().trim();
    format!("{}:{}", resource_type, condition)
}

async fn run_query(driver: &dyn BackendDriver, query: &CompositeQuery) -> BackendResult<bool> {
    let mut session = driver.open_session();
    let result = session.run(query.text()).await?;
    result.first_bool(RESULT_FIELD)
}
