/// Scope type definitions and validation
///
/// Provides the core Scope type distinguishing unconditional
/// `resource:action` grants from conditional `resource:action:condition` ones.

use std::fmt;
use std::str::FromStr;

/// Result type for scope operations
pub type ScopeResult<T> = Result<T, ScopeError>;

/// Errors that can occur while parsing a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// Empty scope string provided
    EmptyScope,
    /// Scope does not have two or three colon-delimited segments
    InvalidSegmentCount(usize),
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyScope => write!(f, "Scope cannot be empty"),
            Self::InvalidSegmentCount(n) => {
                write!(f, "Scope must have 2 or 3 segments, found {}", n)
            }
        }
    }
}

impl std::error::Error for ScopeError {}

/// Whether a grant holds unconditionally or depends on the target resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// `resource:action`
    Unconditional,
    /// `resource:action:condition`
    Conditional,
}

/// A parsed permission scope
///
/// # Examples
///
/// ```
/// use scopegate_authz::scope::{Scope, ScopeKind};
///
/// let scope = Scope::new("item:update:owner").unwrap();
/// assert_eq!(scope.kind(), ScopeKind::Conditional);
/// assert_eq!(scope.resource_type(), "item");
/// assert_eq!(scope.condition_key().as_deref(), Some("item:owner"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    /// Original scope string
    raw: String,
    /// Parsed segments
    segments: Vec<String>,
}

impl Scope {
    /// Parses a scope string
    ///
    /// Only the segment count is validated; segment contents are opaque.
    pub fn new(s: &str) -> ScopeResult<Self> {
        if s.is_empty() {
            return Err(ScopeError::EmptyScope);
        }

        let segments: Vec<String> = s.split(':').map(str::to_string).collect();
        if !(2..=3).contains(&segments.len()) {
            return Err(ScopeError::InvalidSegmentCount(segments.len()));
        }

        Ok(Self {
            raw: s.to_string(),
            segments,
        })
    }

    /// Returns the raw scope string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the segments of this scope
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns whether this scope is conditional
    pub fn kind(&self) -> ScopeKind {
        if self.segments.len() == 3 {
            ScopeKind::Conditional
        } else {
            ScopeKind::Unconditional
        }
    }

    /// Returns whether this scope is conditional
    pub fn is_conditional(&self) -> bool {
        self.kind() == ScopeKind::Conditional
    }

    /// Leading segment, trimmed
    pub fn resource_type(&self) -> &str {
        self.segments[0].trim()
    }

    /// Condition segment of a conditional scope
    pub fn condition(&self) -> Option<&str> {
        match self.kind() {
            ScopeKind::Conditional => self.segments.last().map(|s| s.trim()),
            ScopeKind::Unconditional => None,
        }
    }

    /// Registry key `<resourceType>:<condition>` of a conditional scope
    pub fn condition_key(&self) -> Option<String> {
        self.condition()
            .map(|condition| format!("{}:{}", self.resource_type(), condition))
    }
}

impl FromStr for Scope {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Scope {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
