// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Blog credential store: name/password authors with an optional email.

use crate::db::{storage_keys, DocumentStore};
use crate::error::AuthError;
use crate::models::BlogUser;
use crate::notify::Notifier;
use crate::services::directory::{DirectorySchema, LocalDirectory};
use crate::services::password::PasswordHasher;
use crate::services::session::SessionStore;
use chrono::{DateTime, Utc};

/// Blog rules: names compare case-insensitively, four-character passwords.
pub struct BlogSchema;

impl DirectorySchema for BlogSchema {
    type Record = BlogUser;
    type Extra = Option<String>;

    const DOMAIN: &'static str = "blog";
    const DIRECTORY_KEY: &'static str = storage_keys::BLOG_USERS;
    const CURRENT_KEY: &'static str = storage_keys::BLOG_CURRENT;
    const MIN_PASSWORD_LEN: usize = 4;

    fn same_identifier(a: &str, b: &str) -> bool {
        a.to_lowercase() == b.to_lowercase()
    }

    fn id(record: &BlogUser) -> &str {
        &record.id
    }

    fn identifier(record: &BlogUser) -> &str {
        &record.name
    }

    fn password_hash(record: &BlogUser) -> &str {
        &record.password_hash
    }

    fn set_password_hash(record: &mut BlogUser, hash: String) {
        record.password_hash = hash;
    }

    fn new_record(
        id: String,
        identifier: &str,
        password_hash: String,
        email: Option<String>,
        now: DateTime<Utc>,
    ) -> BlogUser {
        BlogUser {
            id,
            name: identifier.to_string(),
            password_hash,
            email,
            created_at: now,
        }
    }
}

/// Blog author store.
pub struct BlogStore {
    directory: LocalDirectory<BlogSchema>,
}

impl BlogStore {
    pub async fn open(
        storage: DocumentStore,
        hasher: PasswordHasher,
        notifier: Notifier,
    ) -> Result<Self, AuthError> {
        let directory = LocalDirectory::open(storage, hasher, notifier).await?;
        Ok(Self { directory })
    }

    /// Create an author and sign in as them.
    pub async fn sign_up(
        &self,
        name: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<BlogUser, AuthError> {
        let email = email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        self.directory.register(name, password, email).await
    }

    pub async fn sign_in(&self, name: &str, password: &str) -> Result<BlogUser, AuthError> {
        self.directory.login(name, password).await
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.directory.logout().await
    }

    pub fn current(&self) -> Option<BlogUser> {
        self.directory.current()
    }

    pub fn session(&self) -> &SessionStore<BlogUser> {
        self.directory.session()
    }
}
