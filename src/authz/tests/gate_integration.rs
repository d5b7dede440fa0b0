//! Integration tests for the authorization gate
//!
//! End-to-end decisions from request headers through credential
//! verification, identity resolution, scope matching and conditional
//! evaluation against a recording backend.

mod common;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{condition_registry, request, RecordingDriver, SECRET};
use scopegate_authz::conditional::BackendError;
use scopegate_authz::{
    AuthorizationDecision, AuthorizationGate, AuthzError, BackendDriver, GateConfig, Identity,
    MetricsCollector, RequestContext, Requirement, Roles,
};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinSet;

fn config(permissions: Option<&str>) -> GateConfig {
    GateConfig {
        jwt_secret: Some(SECRET.to_string()),
        permissions: permissions.map(|json| STANDARD.encode(json)),
        ..Default::default()
    }
}

fn gate(permissions: Option<&str>, driver: Option<Arc<RecordingDriver>>) -> AuthorizationGate {
    gate_with(config(permissions), driver)
}

fn gate_with(config: GateConfig, driver: Option<Arc<RecordingDriver>>) -> AuthorizationGate {
    let driver = driver.map(|d| d as Arc<dyn BackendDriver>);
    AuthorizationGate::from_config(&config, condition_registry(), driver).unwrap()
}

async fn decide(
    gate: &AuthorizationGate,
    claims: Option<serde_json::Value>,
    requirement: Requirement,
    resource_id: Option<&str>,
) -> AuthorizationDecision {
    let mut context = RequestContext::new();
    gate.decide(&request(claims), &requirement, &mut context, resource_id)
        .await
}

// ============================================================================
// Credential and default role
// ============================================================================

#[tokio::test]
async fn test_missing_credential_without_table() {
    let gate = gate(None, None);
    let decision = decide(&gate, None, Requirement::scopes(["item:read"]), None).await;

    assert_eq!(decision, AuthorizationDecision::Deny(AuthzError::NoCredential));
    assert_eq!(
        decision.reason().map(ToString::to_string).as_deref(),
        Some("No authorization token.")
    );
}

#[tokio::test]
async fn test_missing_credential_keeps_default_role() {
    let gate = gate(None, None);
    let decision = decide(&gate, None, Requirement::roles(["visitor"]), None).await;

    assert_eq!(
        decision,
        AuthorizationDecision::Allow(Identity::new(Some(Roles::from("visitor")), None))
    );
}

#[tokio::test]
async fn test_expired_credential_is_resurfaced() {
    let gate = gate(Some(r#"{"admin": ["item:update"]}"#), None);
    let decision = decide(
        &gate,
        Some(json!({"role": "admin", "exp": 1})),
        Requirement::scopes(["item:update"]),
        None,
    )
    .await;

    assert_eq!(decision, AuthorizationDecision::Deny(AuthzError::CredentialExpired));
}

#[tokio::test]
async fn test_failed_credential_claims_are_not_kept() {
    let gate = gate(None, None);
    let mut context = RequestContext::new();
    let mut headers = request(None);
    headers.insert("authorization", "Bearer not-a-token".parse().unwrap());

    let decision = gate
        .decide(&headers, &Requirement::roles(["visitor"]), &mut context, None)
        .await;

    assert!(decision.is_allowed());
    assert!(context.claims.is_none());
}

// ============================================================================
// Unconditional scopes
// ============================================================================

#[tokio::test]
async fn test_role_from_table_allows() {
    let gate = gate(Some(r#"{"admin": ["item:update"]}"#), None);
    let decision = decide(
        &gate,
        Some(json!({"sub": "u1", "role": "admin"})),
        Requirement::scopes(["item:update"]),
        None,
    )
    .await;

    assert!(decision.is_allowed());
}

#[tokio::test]
async fn test_role_array_union() {
    let gate = gate(Some(r#"{"admin": ["a:x", "b:x"], "editor": ["b:x", "c:x"]}"#), None);
    let decision = decide(
        &gate,
        Some(json!({"roles": ["admin", "editor"]})),
        Requirement::scopes(["c:x"]),
        None,
    )
    .await;

    let identity = decision.into_result().unwrap();
    assert_eq!(identity.scopes(), ["a:x", "b:x", "c:x"]);
}

#[tokio::test]
async fn test_unconditional_grant_never_reaches_backend() {
    let driver = RecordingDriver::new();
    let gate = gate(None, Some(driver.clone()));

    let decision = decide(
        &gate,
        Some(json!({"scope": ["item:update:conditionfalse", "item:update"]})),
        Requirement::scopes(["item:update"]),
        Some("1"),
    )
    .await;

    assert!(decision.is_allowed());
    assert_eq!(driver.calls(), 0);
}

#[tokio::test]
async fn test_namespaced_claims_and_custom_role_key() {
    let config = GateConfig {
        meta_claims: vec!["scope".into()],
        role_claim_key: Some("groups".into()),
        ..config(Some(r#"{"ops": ["deploy:run"]}"#))
    };
    let gate = gate_with(config, None);

    let decision = decide(
        &gate,
        Some(json!({"https://example.com/Scope": ["item:read"]})),
        Requirement::scopes(["item:read"]),
        None,
    )
    .await;
    assert!(decision.is_allowed());

    let decision = decide(
        &gate,
        Some(json!({"groups": "ops", "role": "visitor"})),
        Requirement::scopes(["deploy:run"]),
        None,
    )
    .await;
    assert!(decision.is_allowed());
}

// ============================================================================
// Conditional scopes
// ============================================================================

#[tokio::test]
async fn test_condition_true_allows_and_false_denies() {
    let driver = RecordingDriver::new();
    let gate = gate(None, Some(driver.clone()));

    let allowed = decide(
        &gate,
        Some(json!({"sub": "u1", "scope": ["item:update:conditiontrue"]})),
        Requirement::scopes(["item:update"]),
        Some("1"),
    )
    .await;
    assert!(allowed.is_allowed());

    let denied = decide(
        &gate,
        Some(json!({"sub": "u1", "scope": ["item:update:conditionfalse"]})),
        Requirement::scopes(["item:update"]),
        Some("1"),
    )
    .await;
    assert_eq!(denied, AuthorizationDecision::Deny(AuthzError::InsufficientScope));
    assert_eq!(driver.calls(), 2);
}

#[tokio::test]
async fn test_conditions_are_ored_in_one_query() {
    let driver = RecordingDriver::new();
    let gate = gate(None, Some(driver.clone()));

    let decision = decide(
        &gate,
        Some(json!({"scope": ["item:update:conditionfalse", "item:update:conditiontrue"]})),
        Requirement::scopes(["item:update"]),
        Some("1"),
    )
    .await;

    assert!(decision.is_allowed());
    let queries = driver.queries();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].starts_with("WITH false AS result\n"));
    assert!(queries[0].contains("WITH false AS is_allowed, result\nWITH result OR is_allowed AS result"));
    assert!(queries[0].contains("WITH true AS is_allowed, result\nWITH result OR is_allowed AS result"));
    assert!(queries[0].ends_with("RETURN result AS result"));
}

#[tokio::test]
async fn test_subject_and_resource_reach_conditions() {
    let driver = RecordingDriver::new();
    let gate = gate(None, Some(driver.clone()));
    let claims = json!({"sub": "u1", "scope": ["user:update:self"]});

    let own = decide(&gate, Some(claims.clone()), Requirement::scopes(["user:update"]), Some("u1")).await;
    assert!(own.is_allowed());

    let other = decide(&gate, Some(claims), Requirement::scopes(["user:update"]), Some("u2")).await;
    assert!(!other.is_allowed());
}

#[tokio::test]
async fn test_missing_driver_is_distinct() {
    let gate = gate(None, None);
    let decision = decide(
        &gate,
        Some(json!({"scope": ["item:update:conditiontrue"]})),
        Requirement::scopes(["item:update"]),
        Some("1"),
    )
    .await;

    let reason = decision.reason().unwrap();
    assert_eq!(reason, &AuthzError::NoDriver);
    assert_ne!(reason, &AuthzError::InsufficientScope);
    assert!(reason.is_operational());
}

#[tokio::test]
async fn test_mixed_resource_types() {
    let driver = RecordingDriver::new();
    let gate = gate(None, Some(driver.clone()));

    let decision = decide(
        &gate,
        Some(json!({"scope": ["item:update:conditiontrue", "user:update:self"]})),
        Requirement::scopes(["item:update", "user:update"]),
        Some("1"),
    )
    .await;

    assert_eq!(decision, AuthorizationDecision::Deny(AuthzError::MixedResourceTypes));
    assert_eq!(driver.calls(), 0);
}

#[tokio::test]
async fn test_backend_failure_denies() {
    let driver = RecordingDriver::failing(BackendError::Connection("refused".into()));
    let metrics = Arc::new(MetricsCollector::new());
    let gate = gate(None, Some(driver.clone())).with_metrics(metrics.clone());

    let decision = decide(
        &gate,
        Some(json!({"scope": ["item:update:conditiontrue"]})),
        Requirement::scopes(["item:update"]),
        Some("1"),
    )
    .await;

    assert_eq!(decision, AuthorizationDecision::Deny(AuthzError::InsufficientScope));
    assert_eq!(driver.calls(), 1);

    let snapshot = metrics.get_metrics().await;
    assert_eq!(snapshot.conditional_evaluations, 1);
    assert_eq!(snapshot.backend_failures, 1);
}

// ============================================================================
// Guarded operations and concurrency
// ============================================================================

#[tokio::test]
async fn test_guard_shares_context_across_checks() {
    let gate = Arc::new(gate(Some(r#"{"admin": ["item:read"]}"#), None));
    let read = gate.guard(Requirement::scopes(["item:read"]), |id: &str, ctx: RequestContext| {
        let id = id.to_string();
        async move { (id, ctx.identity) }
    });
    let summary = read.apply(|_: (), _ctx: RequestContext| async { "summary" });

    let headers = request(Some(json!({"sub": "u1", "role": "admin"})));
    let mut context = RequestContext::new();

    let (id, identity) = read.call(&headers, &mut context, None, "42").await.unwrap();
    assert_eq!(id, "42");
    assert_eq!(identity.and_then(|i| i.roles), Some(Roles::from("admin")));

    assert_eq!(summary.call(&headers, &mut context, None, ()).await, Ok("summary"));
    assert_eq!(context.subject_id("sub"), Some("u1"));
}

#[tokio::test]
async fn test_concurrent_decisions() {
    let driver = RecordingDriver::new();
    let gate = Arc::new(gate(None, Some(driver.clone())));
    let mut tasks = JoinSet::new();

    for i in 0..32 {
        let gate = gate.clone();
        tasks.spawn(async move {
            let condition = if i % 2 == 0 { "conditiontrue" } else { "conditionfalse" };
            let claims = json!({"sub": format!("u{}", i), "scope": [format!("item:update:{}", condition)]});
            let decision = decide(&gate, Some(claims), Requirement::scopes(["item:update"]), Some("1")).await;
            (i, decision.is_allowed())
        });
    }

    while let Some(result) = tasks.join_next().await {
        let (i, allowed) = result.unwrap();
        assert_eq!(allowed, i % 2 == 0);
    }
    assert_eq!(driver.calls(), 32);
}
