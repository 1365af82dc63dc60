//! Shared helpers for router-level tests against the in-memory backends.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::{CONTENT_TYPE, COOKIE, ORIGIN, SET_COOKIE};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use serde_json::Value;
use snipbox_api::AppState;
use snipbox_api::config::ApiConfig;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct horse battery staple";
pub const FRONTEND_ORIGIN: &str = "https://component-management.vercel.app";

/// Peer address used when a test does not pick one.
pub const DEFAULT_PEER: [u8; 4] = [127, 0, 0, 1];

/// Config with a fixed signing secret and admin password, plus overrides.
pub fn config_with(overrides: &[(&str, &str)]) -> ApiConfig {
    let mut vars = vec![
        ("JWT_SECRET".to_string(), "test-signing-secret".to_string()),
        ("ADMIN_PASSWORD".to_string(), PASSWORD.to_string()),
    ];
    for (key, value) in overrides {
        vars.retain(|(k, _)| k != key);
        vars.push((key.to_string(), value.to_string()));
    }
    ApiConfig::from_lookup(
        move |key| {
            vars.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        },
        || unreachable!("tests always set JWT_SECRET"),
    )
}

pub fn app() -> Router {
    app_with(config_with(&[]))
}

pub fn app_with(config: ApiConfig) -> Router {
    snipbox_api::router(AppState::in_memory(config))
}

/// A request carrying the origin and `X-Requested-With` CSRF signals.
pub fn trusted(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(ORIGIN, FRONTEND_ORIGIN)
        .header("x-requested-with", "XMLHttpRequest")
        .header(CONTENT_TYPE, "application/json")
}

pub fn json(builder: axum::http::request::Builder, body: Value) -> Request<Body> {
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty(builder: axum::http::request::Builder) -> Request<Body> {
    builder.body(Body::empty()).unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Attach the socket peer address the server would see for this request.
pub fn from_peer(mut request: Request<Body>, ip: [u8; 4]) -> Request<Body> {
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((ip, 40_000))));
    request
}

pub async fn send(app: &Router, mut request: Request<Body>) -> TestResponse {
    if request.extensions().get::<ConnectInfo<SocketAddr>>().is_none() {
        request = from_peer(request, DEFAULT_PEER);
    }
    let response = app.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    TestResponse {
        status,
        headers,
        body,
    }
}

/// `name=value` pair from the response's `Set-Cookie`, ready for a `Cookie` header.
pub fn session_cookie(response: &TestResponse) -> String {
    response
        .headers
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .expect("set-cookie header")
        .to_string()
}

pub fn with_cookie(
    builder: axum::http::request::Builder,
    cookie: &str,
) -> axum::http::request::Builder {
    builder.header(COOKIE, cookie)
}

/// Log in with the test password and return the response.
pub async fn login(app: &Router) -> TestResponse {
    let response = send(
        app,
        json(
            trusted(Method::POST, "/api/auth/login"),
            serde_json::json!({ "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);
    response
}

/// Create a component through the public endpoint and return its JSON.
pub async fn create_component(app: &Router, body: Value) -> Value {
    let response = send(app, json(trusted(Method::POST, "/api/components"), body)).await;
    assert_eq!(
        response.status,
        StatusCode::CREATED,
        "create failed: {}",
        response.body
    );
    response.body
}
