//! Shared fixtures for the HTTP tests. Every test builds its own in-memory
//! store so no state leaks between them.

#![allow(dead_code)]

use std::sync::Arc;

use actix_http::Request;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::{header, StatusCode},
    test,
    web::Data,
};
use gearguard_api::{auth::AuthResponse, models::AppState, session::Sessions, store::MemoryStore};
use serde_json::{json, Value};
use time::Duration;

pub const SECRET: &str = "integration-test-secret";

pub fn state() -> Data<AppState> {
    Data::new(AppState {
        store: Arc::new(MemoryStore::with_default_stages()),
        // Minimum bcrypt cost keeps the suite fast.
        sessions: Sessions::new(SECRET, Duration::hours(24), 4),
    })
}

pub fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {token}"))
}

pub async fn signup<S, B>(app: &S, name: &str, email: &str, password: &str) -> AuthResponse
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let request = test::TestRequest::post()
        .uri("/api/signup")
        .set_json(json!({ "name": name, "email": email, "password": password }))
        .to_request();
    let response = test::call_service(app, request).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    test::read_body_json(response).await
}

pub async fn send<S, B>(
    app: &S,
    request: test::TestRequest,
    token: &str,
) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let response = test::call_service(app, request.insert_header(bearer(token)).to_request()).await;
    let status = response.status();
    let body = test::read_body(response).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, value)
}
