//! HTTP integration for axum
//!
//! ```rust,no_run
//! use axum::{middleware, routing::get, Router};
//! use scopegate_authz::http::{enforce, GateLayer};
//! use scopegate_authz::{AuthorizationGate, ConditionRegistry, GateConfig, Requirement};
//! use std::sync::Arc;
//!
//! # fn build() -> scopegate_authz::Result<Router> {
//! let gate = Arc::new(AuthorizationGate::from_config(
//!     &GateConfig::from_env()?,
//!     Arc::new(ConditionRegistry::new()),
//!     None,
//! )?);
//!
//! let read = GateLayer::new(gate, Requirement::scopes(["item:read"]));
//! let app = Router::new()
//!     .route("/items", get(|| async { "items" }))
//!     .route_layer(middleware::from_fn_with_state(read, enforce));
//! # Ok(app)
//! # }
//! ```

use crate::credential::RequestParts;
use crate::error::AuthzError;
use crate::gate::AuthorizationGate;
use crate::types::{AuthorizationDecision, RequestContext, Requirement};
use axum::extract::{Request, State};
use axum::http::header::{COOKIE, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

impl RequestParts for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| value.to_str().ok())
    }

    fn cookie(&self, name: &str) -> Option<&str> {
        self.get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}

/// Pulls the target resource id out of a request
pub type ResourceIdFn = Arc<dyn Fn(&Request) -> Option<String> + Send + Sync>;

/// Middleware state: the gate and the requirement of the routes it guards
#[derive(Clone)]
pub struct GateLayer {
    gate: Arc<AuthorizationGate>,
    requirement: Arc<Requirement>,
    resource_id: Option<ResourceIdFn>,
}

impl GateLayer {
    /// Guard routes with `requirement`
    pub fn new(gate: Arc<AuthorizationGate>, requirement: Requirement) -> Self {
        Self {
            gate,
            requirement: Arc::new(requirement),
            resource_id: None,
        }
    }

    /// Hand the id returned by `extract` to conditional policies
    pub fn with_resource_id<F>(mut self, extract: F) -> Self
    where
        F: Fn(&Request) -> Option<String> + Send + Sync + 'static,
    {
        self.resource_id = Some(Arc::new(extract));
        self
    }

    /// Resource id taken from the last path segment, e.g. `42` in `/items/42`
    pub fn with_trailing_path_id(self) -> Self {
        self.with_resource_id(|request| {
            request
                .uri()
                .path()
                .rsplit('/')
                .next()
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
        })
    }

    /// The requirement enforced
    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }
}

impl fmt::Debug for GateLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateLayer")
            .field("requirement", &self.requirement)
            .field("resource_id", &self.resource_id.is_some())
            .finish()
    }
}

/// Authorization middleware for [`axum::middleware::from_fn_with_state`].
///
/// A `RequestContext` already in the request extensions (from an outer
/// layer) is reused, so several layers on one request merge into the same
/// identity. On Allow the enriched context is stored back for the handler.
pub async fn enforce(State(layer): State<GateLayer>, mut request: Request, next: Next) -> Response {
    let resource_id = layer.resource_id.as_ref().and_then(|extract| extract(&request));
    let mut context = request
        .extensions_mut()
        .remove::<RequestContext>()
        .unwrap_or_default();

    let decision = layer
        .gate
        .decide(request.headers(), &layer.requirement, &mut context, resource_id.as_deref())
        .await;

    match decision {
        AuthorizationDecision::Allow(_) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        AuthorizationDecision::Deny(reason) => error_response(&reason),
    }
}

/// HTTP status for a deny reason
pub fn status_for(error: &AuthzError) -> StatusCode {
    match error {
        AuthzError::NoCredential | AuthzError::CredentialInvalid | AuthzError::CredentialExpired => {
            StatusCode::UNAUTHORIZED
        }
        AuthzError::InsufficientScope | AuthzError::InsufficientRole => StatusCode::FORBIDDEN,
        AuthzError::MixedResourceTypes => StatusCode::BAD_REQUEST,
        AuthzError::NoScopesOrRoles | AuthzError::NoDriver | AuthzError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// JSON error response for a deny reason
pub fn error_response(error: &AuthzError) -> Response {
    let body = Json(ErrorBody {
        error: error.kind(),
        message: error.to_string(),
    });
    let mut response = (status_for(error), body).into_response();

    if error.is_authentication_failure() {
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(headers.header("Authorization"), Some("Bearer abc"));
        assert_eq!(headers.header("AUTHORIZATION"), Some("Bearer abc"));
    }

    #[test]
    fn test_cookie_lookup() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; session=xyz"));
        headers.append(COOKIE, HeaderValue::from_static("token=abc.def.ghi"));

        assert_eq!(headers.cookie("token"), Some("abc.def.ghi"));
        assert_eq!(headers.cookie("session"), Some("xyz"));
        assert_eq!(headers.cookie("missing"), None);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&AuthzError::NoCredential), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&AuthzError::CredentialExpired), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&AuthzError::InsufficientRole), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&AuthzError::MixedResourceTypes), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&AuthzError::NoDriver), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_response_challenges_unauthenticated() {
        let response = error_response(&AuthzError::NoCredential);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get(WWW_AUTHENTICATE).unwrap(), "Bearer");

        let response = error_response(&AuthzError::InsufficientScope);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }
}
