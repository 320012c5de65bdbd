// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity gate authentication and CORS tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without valid access tokens
//! 2. Protected routes accept provider tokens from header or cookie
//! 3. CORS preflight requests return correct headers

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use bazaar_auth::middleware::auth::{create_access_token, ACCESS_TOKEN_COOKIE};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

mod common;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(get("/api/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            get("/api/me")
                .header(header::AUTHORIZATION, "Bearer invalid.token.here")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_valid_bearer_token() {
    let (app, state) = common::create_test_app();
    let token =
        create_access_token("user-123", Some("ann@example.com"), &state.config.jwt_secret, 3600)
            .unwrap();

    let response = app
        .oneshot(
            get("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );
    let body = body_json(response).await;
    assert_eq!(body["provider"], "remote");
    assert_eq!(body["user_id"], "user-123");
    assert_eq!(body["email"], "ann@example.com");
}

#[tokio::test]
async fn test_protected_route_with_cookie_token() {
    let (app, state) = common::create_test_app();
    let token = create_access_token("user-456", None, &state.config.jwt_secret, 3600).unwrap();

    let response = app
        .oneshot(
            get("/api/me")
                .header(header::COOKIE, format!("{}={}", ACCESS_TOKEN_COOKIE, token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user_id"], "user-456");
    assert!(body["email"].is_null());
}

#[tokio::test]
async fn test_token_for_wrong_audience_rejected() {
    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: usize,
        iat: usize,
        aud: String,
    }

    let (app, state) = common::create_test_app();
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;
    let token = encode(
        &Header::new(Algorithm::HS256),
        &Claims {
            sub: "service".to_string(),
            exp: now + 3600,
            iat: now,
            aud: "anon".to_string(),
        },
        &EncodingKey::from_secret(&state.config.jwt_secret),
    )
    .unwrap();

    let response = app
        .oneshot(
            get("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let (app, state) = common::create_test_app();

    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: usize,
        iat: usize,
        aud: String,
    }
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;
    let token = encode(
        &Header::new(Algorithm::HS256),
        &Claims {
            sub: "user-123".to_string(),
            exp: now - 3600,
            iat: now - 7200,
            aud: "authenticated".to_string(),
        },
        &EncodingKey::from_secret(&state.config.jwt_secret),
    )
    .unwrap();

    let response = app
        .oneshot(
            get("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/me")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_public_route_no_auth_required() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}
