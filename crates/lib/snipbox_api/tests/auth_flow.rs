//! Integration tests: login, status, refresh and logout through the router.

mod common;

use axum::http::header::{AUTHORIZATION, RETRY_AFTER, SET_COOKIE};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::*;
use serde_json::json;
use snipbox_api::config::ApiConfig;

#[tokio::test]
async fn login_status_logout_round_trip() {
    let app = app();

    let login = login(&app).await;
    assert!(login.body["accessToken"].is_string());
    assert!(login.body["refreshToken"].is_string());
    assert_eq!(login.body["expiresIn"], 3600);
    assert_eq!(login.body["tokenType"], "Bearer");

    let set_cookie = login.headers[SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with("snipbox_session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Secure"));
    assert!(set_cookie.contains("SameSite=Lax"));
    let cookie = session_cookie(&login);

    let status = send(
        &app,
        empty(with_cookie(trusted(Method::GET, "/api/auth/status"), &cookie)),
    )
    .await;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.body["authenticated"], true);
    assert_eq!(status.body["method"], "session_cookie");

    let logout = send(
        &app,
        empty(with_cookie(trusted(Method::POST, "/api/auth/logout"), &cookie)),
    )
    .await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(logout.body["success"], true);
    let cleared = logout.headers[SET_COOKIE].to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));

    let status = send(
        &app,
        empty(with_cookie(trusted(Method::GET, "/api/auth/status"), &cookie)),
    )
    .await;
    assert_eq!(status.body["authenticated"], false);

    let admin_call = send(
        &app,
        empty(with_cookie(
            trusted(
                Method::DELETE,
                "/api/components/0190a0a0-0000-7000-8000-000000000000",
            ),
            &cookie,
        )),
    )
    .await;
    assert_eq!(admin_call.status, StatusCode::UNAUTHORIZED);
    assert_eq!(admin_call.body["error"], "unauthenticated");
    assert!(admin_call.body["details"]["acceptedMethods"].is_array());
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = app();
    let response = send(
        &app,
        json(
            trusted(Method::POST, "/api/auth/login"),
            json!({ "password": "nope" }),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "unauthenticated");
    assert!(response.headers.get(SET_COOKIE).is_none());
}

#[tokio::test]
async fn repeated_failures_are_rate_limited() {
    let app = app();
    let attempt = || {
        json(
            trusted(Method::POST, "/api/auth/login"),
            json!({ "password": "wrong" }),
        )
    };

    for _ in 0..5 {
        assert_eq!(send(&app, attempt()).await.status, StatusCode::UNAUTHORIZED);
    }
    let blocked = send(&app, attempt()).await;
    assert_eq!(blocked.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(blocked.body["error"], "rate_limited");
    assert!(blocked.headers.contains_key(RETRY_AFTER));
}

fn login_request(password: &str, forwarded_for: Option<String>) -> Request<Body> {
    let mut builder = trusted(Method::POST, "/api/auth/login");
    if let Some(ip) = forwarded_for {
        builder = builder.header("x-forwarded-for", ip);
    }
    json(builder, json!({ "password": password }))
}

#[tokio::test]
async fn rotating_forwarded_for_does_not_evade_the_limit() {
    let app = app();
    let mut statuses = Vec::new();
    for i in 0..8 {
        let request = login_request("wrong", Some(format!("10.0.0.{i}")));
        statuses.push(send(&app, request).await.status);
    }
    assert_eq!(statuses[..5], [StatusCode::UNAUTHORIZED; 5]);
    assert_eq!(statuses[5..], [StatusCode::TOO_MANY_REQUESTS; 3]);
}

#[tokio::test]
async fn lockout_is_scoped_to_the_client_address() {
    let app = app();
    for _ in 0..6 {
        send(&app, from_peer(login_request("wrong", None), [198, 51, 100, 1])).await;
    }
    let blocked = send(&app, from_peer(login_request(PASSWORD, None), [198, 51, 100, 1])).await;
    assert_eq!(blocked.status, StatusCode::TOO_MANY_REQUESTS);

    let other = send(&app, from_peer(login_request(PASSWORD, None), [198, 51, 100, 2])).await;
    assert_eq!(other.status, StatusCode::OK);
}

#[tokio::test]
async fn trusted_proxy_keys_on_the_forwarded_address() {
    let app = app_with(config_with(&[("TRUST_PROXY_HEADERS", "true")]));
    for _ in 0..6 {
        send(&app, login_request("wrong", Some("192.0.2.10".into()))).await;
    }
    let blocked = send(&app, login_request(PASSWORD, Some("192.0.2.10".into()))).await;
    assert_eq!(blocked.status, StatusCode::TOO_MANY_REQUESTS);

    let other = send(&app, login_request(PASSWORD, Some("192.0.2.11".into()))).await;
    assert_eq!(other.status, StatusCode::OK);
}

#[tokio::test]
async fn login_without_configured_password_is_misconfigured() {
    let config = ApiConfig::from_lookup(
        |key| (key == "JWT_SECRET").then(|| "test-signing-secret".to_string()),
        || unreachable!(),
    );
    let app = app_with(config);
    let response = send(
        &app,
        json(
            trusted(Method::POST, "/api/auth/login"),
            json!({ "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["error"], "misconfigured");

    let status = send(&app, empty(trusted(Method::GET, "/api/auth/status"))).await;
    assert_eq!(status.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn login_requires_csrf_signals() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "password": PASSWORD }).to_string()))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "forbidden_csrf");
    assert_eq!(response.body["details"]["passed"], 0);
    assert_eq!(response.body["details"]["required"], 2);
}

#[tokio::test]
async fn malformed_login_body_is_a_validation_error() {
    let app = app();
    let request = trusted(Method::POST, "/api/auth/login")
        .body(Body::from("{not json"))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "validation_failed");
    assert_eq!(response.body["details"]["fields"][0]["field"], "body");
}

#[tokio::test]
async fn refresh_issues_a_new_pair_and_rejects_access_tokens() {
    let app = app();
    let login = login(&app).await;

    let refreshed = send(
        &app,
        json(
            trusted(Method::POST, "/api/auth/refresh"),
            json!({ "refreshToken": login.body["refreshToken"] }),
        ),
    )
    .await;
    assert_eq!(refreshed.status, StatusCode::OK);
    assert!(refreshed.body["accessToken"].is_string());
    assert_ne!(refreshed.body["refreshToken"], login.body["refreshToken"]);

    let misuse = send(
        &app,
        json(
            trusted(Method::POST, "/api/auth/refresh"),
            json!({ "refreshToken": login.body["accessToken"] }),
        ),
    )
    .await;
    assert_eq!(misuse.status, StatusCode::UNAUTHORIZED);
    assert_eq!(misuse.body["error"], "unauthenticated");
}

#[tokio::test]
async fn bearer_token_authenticates_status() {
    let app = app();
    let login = login(&app).await;
    let token = login.body["accessToken"].as_str().unwrap();

    let status = send(
        &app,
        empty(
            trusted(Method::GET, "/api/auth/status")
                .header(AUTHORIZATION, format!("Bearer {token}")),
        ),
    )
    .await;
    assert_eq!(status.body["authenticated"], true);
    assert_eq!(status.body["method"], "bearer_token");
}

#[tokio::test]
async fn status_without_credentials_is_unauthenticated() {
    let app = app();
    let status = send(&app, empty(trusted(Method::GET, "/api/auth/status"))).await;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.body["authenticated"], false);
    assert!(status.body.get("method").is_none());
}

#[tokio::test]
async fn dev_mode_cookie_is_not_secure() {
    let app = app_with(config_with(&[("SNIPBOX_DEV_MODE", "true")]));
    let login = login(&app).await;
    let set_cookie = login.headers[SET_COOKIE].to_str().unwrap();
    assert!(!set_cookie.contains("Secure"));
}
