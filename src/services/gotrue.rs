// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client for the hosted identity provider's GoTrue REST API.
//!
//! Handles:
//! - Email/password sign-up and sign-in
//! - Refresh-token exchange
//! - Access-token revocation (logout)
//! - Password recovery emails
//! - Fetching the account behind an access token

use crate::error::AuthError;
use crate::models::{RemoteIdentity, RemoteSession, SessionTokens};
use crate::time_utils::expiry_from_unix;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Provider error codes that mean the email is already registered.
const DUPLICATE_ERROR_CODES: &[&str] = &["user_already_exists", "email_exists"];

/// GoTrue API client.
#[derive(Clone)]
pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoTrueClient {
    /// Create a client for the project at `project_url` (auth lives under
    /// `/auth/v1`).
    pub fn new(project_url: &str, api_key: String) -> Self {
        Self::with_base_url(
            format!("{}/auth/v1", project_url.trim_end_matches('/')),
            api_key,
        )
    }

    /// Create a client against an explicit auth API root (tests point this
    /// at a mock server).
    pub fn with_base_url(base_url: impl Into<String>, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    /// Register a new account.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> Result<SignUpResponse, AuthError> {
        let mut body = serde_json::json!({
            "email": email,
            "password": password,
        });
        if let Some(username) = username {
            body["data"] = serde_json::json!({ "username": username });
        }

        let response = self
            .post("/signup")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        check_response_json(response).await.map_err(|e| match e {
            AuthError::DuplicateIdentifier(_) => AuthError::DuplicateIdentifier(email.to_string()),
            other => other,
        })
    }

    /// Password grant.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TokenResponse, AuthError> {
        let response = self
            .post("/token")
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await
            .map_err(transport_error)?;

        check_response_json(response).await
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// Any rejection by the provider is reported as an expired session.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let response = self
            .post("/token")
            .query(&[("grant_type", "refresh_token")])
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(transport_error)?;

        check_response_json(response).await.map_err(expired_on_rejection)
    }

    /// Fetch the account behind `access_token`.
    pub async fn get_user(&self, access_token: &str) -> Result<RemoteIdentity, AuthError> {
        let response = self
            .http
            .get(format!("{}/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;

        check_response_json(response).await.map_err(expired_on_rejection)
    }

    /// Revoke the session behind `access_token`.
    pub async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .post("/logout")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;

        check_response(response).await?;
        tracing::info!("Provider session revoked");
        Ok(())
    }

    /// Ask the provider to email a password-reset link.
    pub async fn recover(&self, email: &str, redirect_to: Option<&str>) -> Result<(), AuthError> {
        let mut path = "/recover".to_string();
        if let Some(redirect_to) = redirect_to {
            path.push_str("?redirect_to=");
            path.push_str(&urlencoding::encode(redirect_to));
        }

        let response = self
            .post(&path)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await
            .map_err(transport_error)?;

        check_response(response).await
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .header("apikey", &self.api_key)
    }
}

/// Session payload returned by the token endpoints (and by sign-up when
/// the provider confirms accounts automatically).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: RemoteIdentity,
}

impl TokenResponse {
    pub fn into_session(self, now: DateTime<Utc>) -> RemoteSession {
        RemoteSession {
            tokens: SessionTokens {
                access_token: self.access_token,
                refresh_token: self.refresh_token,
                expires_at: expiry_from_unix(self.expires_at, self.expires_in, now),
            },
            user: self.user,
        }
    }
}

/// Sign-up returns a session when the account is usable immediately, or
/// just the account when email confirmation is pending.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    Session(Box<TokenResponse>),
    User(RemoteIdentity),
}

/// Error body shapes used across provider versions.
#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    error: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error_code: Option<String>,
}

impl ProviderErrorBody {
    fn message(self, status: reqwest::StatusCode) -> String {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .unwrap_or_else(|| format!("HTTP {}", status))
    }
}

fn transport_error(e: reqwest::Error) -> AuthError {
    AuthError::Network(e.to_string())
}

fn expired_on_rejection(e: AuthError) -> AuthError {
    match e {
        AuthError::Auth(msg) => {
            tracing::info!(reason = %msg, "Provider rejected session");
            AuthError::Auth(AuthError::SESSION_EXPIRED.to_string())
        }
        other => other,
    }
}

/// Map a non-success provider response to an error.
fn status_error(status: reqwest::StatusCode, body: &str) -> AuthError {
    let parsed: ProviderErrorBody = serde_json::from_str(body).unwrap_or_default();

    if status.as_u16() == 429 {
        tracing::warn!("Identity provider rate limit hit (429)");
        return AuthError::Network("Too many requests, try again later".to_string());
    }
    if status.is_server_error() {
        return AuthError::Network(format!("HTTP {}: {}", status, parsed.message(status)));
    }

    let duplicate = parsed
        .error_code
        .as_deref()
        .is_some_and(|code| DUPLICATE_ERROR_CODES.contains(&code));
    if duplicate {
        return AuthError::DuplicateIdentifier(parsed.message(status));
    }

    match status.as_u16() {
        422 => AuthError::Validation(parsed.message(status)),
        _ => AuthError::Auth(parsed.message(status)),
    }
}

/// Check response status and return error if not successful.
async fn check_response(response: reqwest::Response) -> Result<(), AuthError> {
    if response.status().is_success() {
        return Ok(());
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

/// Check response and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AuthError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, &body));
    }

    response
        .json()
        .await
        .map_err(|e| AuthError::Network(format!("Unexpected provider response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_error_mapping() {
        let err = status_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert!(matches!(err, AuthError::Auth(ref m) if m == "Invalid login credentials"));

        let err = status_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"code":422,"error_code":"weak_password","msg":"Password should be at least 6 characters"}"#,
        );
        assert!(matches!(err, AuthError::Validation(_)));

        let err = status_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"code":422,"error_code":"user_already_exists","msg":"User already registered"}"#,
        );
        assert!(matches!(err, AuthError::DuplicateIdentifier(_)));

        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, ""),
            AuthError::Network(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "<html>"),
            AuthError::Network(_)
        ));
    }

    #[test]
    fn test_sign_up_response_shapes() {
        let session: SignUpResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":3600,
                "user":{"id":"u1","email":"a@example.com"}}"#,
        )
        .unwrap();
        assert!(matches!(session, SignUpResponse::Session(_)));

        let pending: SignUpResponse =
            serde_json::from_str(r#"{"id":"u1","email":"a@example.com","confirmation_sent_at":"2026-01-01T00:00:00Z"}"#)
                .unwrap();
        assert!(matches!(pending, SignUpResponse::User(ref u) if u.id == "u1"));
    }

    #[test]
    fn test_into_session_uses_expires_in_fallback() {
        let now = Utc::now();
        let response = TokenResponse {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_in: Some(3600),
            expires_at: None,
            user: RemoteIdentity {
                id: "u1".to_string(),
                email: "a@example.com".to_string(),
                metadata: Default::default(),
                email_confirmed_at: None,
            },
        };
        let session = response.into_session(now);
        assert_eq!((session.tokens.expires_at - now).num_seconds(), 3600);
    }
}
