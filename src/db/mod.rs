// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence layer for identity documents.

pub mod document_store;

pub use document_store::DocumentStore;

/// Storage keys as constants. Each identity domain owns distinct keys so the
/// documents can never collide.
pub mod storage_keys {
    pub const MARKETPLACE_USERS: &str = "marketplace_users";
    pub const MARKETPLACE_CURRENT: &str = "marketplace_current_user";
    pub const BLOG_USERS: &str = "blog_users";
    pub const BLOG_CURRENT: &str = "blog_current_user";
    /// Persisted remote session (identity + token pair)
    pub const REMOTE_SESSION: &str = "remote_session";
}
