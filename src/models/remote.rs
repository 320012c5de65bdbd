// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote identity and session as mirrored from the hosted provider.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free-form profile data kept by the provider next to the account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Any other keys the provider returns
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Account as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteIdentity {
    /// Opaque provider id
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, rename = "user_metadata")]
    pub metadata: UserMetadata,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
}

/// Access/refresh token pair carried on authenticated requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionTokens {
    /// Whether the access token expires within `margin` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin >= self.expires_at
    }
}

/// Signed-in session: identity plus the tokens proving it.
///
/// This is also the document persisted under the remote session key, so a
/// restart can restore it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSession {
    pub user: RemoteIdentity,
    pub tokens: SessionTokens,
}
