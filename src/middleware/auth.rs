// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access-token middleware for the identity gate.
//!
//! Accepts the hosted provider's HS256 access tokens, either as a bearer
//! token or in the provider's session cookie.

use crate::error::{AuthError, Result};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cookie the provider's browser client stores the access token in.
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";

/// Audience the provider stamps on user access tokens.
pub const AUTHENTICATED_AUDIENCE: &str = "authenticated";

/// Access token claims issued by the provider.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (provider user id)
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    pub aud: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Authenticated caller extracted from the access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
}

/// Middleware that requires a valid provider access token.
pub async fn require_identity(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    // Explicit header wins over the ambient cookie.
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    let token = bearer
        .or_else(|| jar.get(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_string()))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::Auth("Missing access token".to_string()))?;

    let claims = verify_access_token(&token, &state.config.jwt_secret)?;
    tracing::debug!(user_id = %claims.sub, "Access token accepted");

    request.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
        email: claims.email,
    });

    Ok(next.run(request).await)
}

/// Decode and validate an access token signed with `secret`.
pub fn verify_access_token(token: &str, secret: &[u8]) -> Result<Claims> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[AUTHENTICATED_AUDIENCE]);

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected");
            AuthError::Auth("Invalid access token".to_string())
        })
}

/// Sign an access token the way the provider does (local tooling and tests).
pub fn create_access_token(
    user_id: &str,
    email: Option<&str>,
    secret: &[u8],
    ttl_secs: usize,
) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.map(String::from),
        iat: now,
        exp: now + ttl_secs,
        aud: AUTHENTICATED_AUDIENCE.to_string(),
        role: Some(AUTHENTICATED_AUDIENCE.to_string()),
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )?)
}
