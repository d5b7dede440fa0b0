//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use scopegate_authz::conditional::{
    BackendError, BackendResult, ConditionRegistry, QueryResult, Record,
};
use scopegate_authz::{BackendDriver, Session};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

pub const SECRET: &str = "integration_test_secret";

/// Backend stub recording every composed query.
///
/// A query answers `true` when any of its lines binds `true AS is_allowed`,
/// which is what the `conditiontrue` fixture condition emits.
#[derive(Default)]
pub struct RecordingDriver {
    queries: Arc<Mutex<Vec<String>>>,
    failure: Option<BackendError>,
}

impl RecordingDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Driver whose sessions fail with `error`
    pub fn failing(error: BackendError) -> Arc<Self> {
        Arc::new(Self {
            failure: Some(error),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

struct RecordingSession {
    queries: Arc<Mutex<Vec<String>>>,
    failure: Option<BackendError>,
}

impl BackendDriver for RecordingDriver {
    fn open_session(&self) -> Box<dyn Session> {
        Box::new(RecordingSession {
            queries: self.queries.clone(),
            failure: self.failure.clone(),
        })
    }
}

#[async_trait]
impl Session for RecordingSession {
    async fn run(&mut self, query: &str) -> BackendResult<QueryResult> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        let allowed = query
            .lines()
            .any(|line| line.trim_start().starts_with("WITH true AS is_allowed"));
        Ok(QueryResult::new(vec![Record::single("result", json!(allowed))]))
    }
}

/// Registry with fixed-answer, resource-id and subject-id conditions
pub fn condition_registry() -> Arc<ConditionRegistry> {
    let mut registry = ConditionRegistry::new();
    registry
        .register("item:conditiontrue", |_, _| "WITH true AS is_allowed".to_string())
        .register("item:conditionfalse", |_, _| "WITH false AS is_allowed".to_string())
        .register("item:answer", |_, item| {
            format!("WITH {} AS is_allowed", item == Some("42"))
        })
        .register("user:self", |subject, user| {
            format!(
                "WITH {} AS is_allowed",
                subject.is_some() && subject == user
            )
        });
    Arc::new(registry)
}

pub fn token(claims: Value) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

/// Headers carrying a bearer token for `claims`, or nothing
pub fn request(claims: Option<Value>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(claims) = claims {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token(claims))).unwrap(),
        );
    }
    headers
}
