//! Conditional policy registry
//!
//! Maps condition names (`resource:condition`) to query-fragment generators.
//! The registry is filled during setup and then frozen behind an `Arc`; the
//! `&mut self` on [`ConditionRegistry::register`] keeps writers out once it is
//! shared with the gate.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Generates the query fragment for one condition from `(subject_id, resource_id)`.
///
/// The fragment is spliced into the composite query directly before
/// `, result` and must bind a boolean named `is_allowed`, e.g.
/// `OPTIONAL MATCH (u:User {id: $uid})-[:OWNS]->(i:Item {id: $iid}) WITH i IS NOT NULL AS is_allowed`.
pub type ConditionFn = Arc<dyn Fn(Option<&str>, Option<&str>) -> String + Send + Sync>;

/// Condition name → query fragment generator
#[derive(Clone, Default)]
pub struct ConditionRegistry {
    conditions: HashMap<String, ConditionFn>,
}

impl ConditionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the generator for `condition`, e.g. `item:owner`
    pub fn register<F>(&mut self, condition: impl Into<String>, generator: F) -> &mut Self
    where
        F: Fn(Option<&str>, Option<&str>) -> String + Send + Sync + 'static,
    {
        let condition = condition.into().trim().to_string();
        info!(condition = %condition, "Registered conditional policy");
        self.conditions.insert(condition, Arc::new(generator));
        self
    }

    /// Generator registered for `condition`
    pub fn get(&self, condition: &str) -> Option<&ConditionFn> {
        self.conditions.get(condition)
    }

    /// Whether `condition` is registered
    pub fn contains(&self, condition: &str) -> bool {
        self.conditions.contains_key(condition)
    }

    /// Number of registered conditions
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Whether no condition is registered
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

impl fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.conditions.keys().collect();
        names.sort();
        f.debug_struct("ConditionRegistry")
            .field("conditions", &names)
            .finish()
    }
}
