/// Scope parsing and matching
///
/// Scopes are `resource:action` (unconditional) or
/// `resource:action:condition` (conditional) strings. Required scopes are
/// matched by prefix against held scopes; unconditional grants decide at once,
/// conditional grants are resolved against the backend.
///
/// # Examples
///
/// ```
/// use scopegate_authz::scope::{match_scopes, ScopeMatch};
///
/// let held = ["item:read", "item:update:owner"];
///
/// assert_eq!(match_scopes(&["item:read"], &held), ScopeMatch::Satisfied);
/// assert!(matches!(match_scopes(&["item:update"], &held), ScopeMatch::Pending(_)));
/// assert_eq!(match_scopes(&["item:delete"], &held), ScopeMatch::Unsatisfied);
/// ```

mod types;
mod authorizer;


pub use types::{Scope, ScopeError, ScopeKind, ScopeResult};
pub use authorizer::{match_scopes, ScopeAuthorizer, ScopeMatch};
