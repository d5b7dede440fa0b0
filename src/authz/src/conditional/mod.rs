//! Conditional (resource-dependent) policy evaluation
//!
//! A conditional scope such as `item:update:owner` grants `item:update` only
//! where the backend confirms the `item:owner` condition for the caller and
//! the target resource. Conditions are registered once at setup as query
//! fragment generators; each decision composes them into one query.
//!
//! # Example
//!
//! ```rust
//! use scopegate_authz::conditional::{ConditionRegistry, ConditionalEvaluator};
//! use std::sync::Arc;
//!
//! let mut registry = ConditionRegistry::new();
//! registry.register("item:owner", |subject, item| {
//!     format!(
//!         "OPTIONAL MATCH (:User {{id: '{}'}})-[o:OWNS]->(:Item {{id: '{}'}}) WITH o IS NOT NULL AS is_allowed",
//!         subject.unwrap_or_default(),
//!         item.unwrap_or_default(),
//!     )
//! });
//!
//! // No driver: conditional scopes report `NoDriver` when evaluated.
//! let evaluator = ConditionalEvaluator::new(None, Arc::new(registry));
//! assert!(!evaluator.has_driver());
//! ```

pub mod driver;
pub mod error;
pub mod evaluator;
pub mod query;
pub mod registry;

pub use driver::{BackendDriver, QueryResult, Record, Session};
pub use error::{BackendError, BackendResult};
pub use evaluator::ConditionalEvaluator;
pub use query::CompositeQuery;
pub use registry::{ConditionFn, ConditionRegistry};
