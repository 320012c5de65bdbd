// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Blog identity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Blog author record, as stored in the blog directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogUser {
    pub id: String,
    /// Display name, unique under case-insensitive comparison
    pub name: String,
    /// Salted PBKDF2 hash
    pub password_hash: String,
    #[serde(default)]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}
