// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local credential directory shared by the marketplace and blog stores.
//!
//! A directory is a persisted list of name/password identities plus a
//! persisted pointer to the identity that is currently signed in. The
//! per-domain differences (storage keys, identifier comparison, password
//! policy, derived fields) live in a [`DirectorySchema`].
//!
//! Handles:
//! - Registration with uniqueness and policy checks
//! - Login against salted hashes
//! - Logout (pointer only, the entry survives)
//! - In-place mutation of the current identity

use crate::db::DocumentStore;
use crate::error::AuthError;
use crate::notify::Notifier;
use crate::services::password::PasswordHasher;
use crate::services::session::{SessionStore, Ticket};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::Mutex;

/// Minimum identifier length (after trimming) for every schema.
pub const MIN_IDENTIFIER_LEN: usize = 3;

/// Per-domain rules for a [`LocalDirectory`].
pub trait DirectorySchema: Send + Sync + 'static {
    /// Stored identity record.
    type Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;
    /// Registration data beyond identifier and password.
    type Extra: Send;

    /// Human-readable domain name for logs and notices.
    const DOMAIN: &'static str;
    const DIRECTORY_KEY: &'static str;
    const CURRENT_KEY: &'static str;
    const MIN_PASSWORD_LEN: usize;

    /// Whether two identifiers name the same identity.
    fn same_identifier(a: &str, b: &str) -> bool;

    fn id(record: &Self::Record) -> &str;
    fn identifier(record: &Self::Record) -> &str;
    fn password_hash(record: &Self::Record) -> &str;
    fn set_password_hash(record: &mut Self::Record, hash: String);

    fn new_record(
        id: String,
        identifier: &str,
        password_hash: String,
        extra: Self::Extra,
        now: DateTime<Utc>,
    ) -> Self::Record;

    /// Recompute derived fields on login. Returns true if the record changed.
    fn on_login(_record: &mut Self::Record) -> bool {
        false
    }
}

/// Persisted current-identity pointer.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CurrentPointer {
    id: String,
    signed_in_at: DateTime<Utc>,
}

/// Persisted directory of identities for one schema.
pub struct LocalDirectory<S: DirectorySchema> {
    storage: DocumentStore,
    hasher: PasswordHasher,
    notifier: Notifier,
    session: SessionStore<S::Record>,
    /// Serializes read-modify-write of the directory document.
    write_lock: Mutex<()>,
}

impl<S: DirectorySchema> LocalDirectory<S> {
    /// Open the directory and restore the persisted current identity.
    ///
    /// A pointer to an entry that no longer exists resolves to anonymous.
    pub async fn open(
        storage: DocumentStore,
        hasher: PasswordHasher,
        notifier: Notifier,
    ) -> Result<Self, AuthError> {
        let directory = Self {
            storage,
            hasher,
            notifier,
            session: SessionStore::new(),
            write_lock: Mutex::new(()),
        };

        directory.session.begin_loading();
        let ticket = directory.session.ticket();

        let restored = match directory.restore_current().await {
            Ok(record) => record,
            Err(e) => {
                // Never leave the store stuck in loading.
                directory.session.resolve(ticket, None);
                return Err(e);
            }
        };

        tracing::info!(
            domain = S::DOMAIN,
            signed_in = restored.is_some(),
            "Local identity directory opened"
        );
        directory.session.resolve(ticket, restored);
        Ok(directory)
    }

    async fn restore_current(&self) -> Result<Option<S::Record>, AuthError> {
        let Some(pointer) = self
            .storage
            .load::<CurrentPointer>(S::CURRENT_KEY)
            .await?
        else {
            return Ok(None);
        };

        let record = self
            .load_records()
            .await?
            .into_iter()
            .find(|r| S::id(r) == pointer.id);

        if record.is_none() {
            tracing::warn!(
                domain = S::DOMAIN,
                id = %pointer.id,
                "Current identity pointer is dangling, clearing it"
            );
            self.storage.remove(S::CURRENT_KEY).await?;
        }
        Ok(record)
    }

    /// Register a new identity and make it current.
    pub async fn register(
        &self,
        identifier: &str,
        password: &str,
        extra: S::Extra,
    ) -> Result<S::Record, AuthError> {
        let result = self.register_inner(identifier, password, extra).await;
        self.notifier
            .report(result, |r| format!("Welcome, {}!", S::identifier(r)))
    }

    async fn register_inner(
        &self,
        identifier: &str,
        password: &str,
        extra: S::Extra,
    ) -> Result<S::Record, AuthError> {
        let identifier = identifier.trim();
        validate_credentials::<S>(identifier, password)?;

        let ticket = self.session.ticket();
        let _guard = self.write_lock.lock().await;

        let mut records = self.load_records().await?;
        if records
            .iter()
            .any(|r| S::same_identifier(S::identifier(r), identifier))
        {
            return Err(AuthError::DuplicateIdentifier(identifier.to_string()));
        }

        let hash = self.hasher.hash_async(password).await?;
        let record = S::new_record(
            uuid::Uuid::new_v4().to_string(),
            identifier,
            hash,
            extra,
            Utc::now(),
        );

        records.push(record.clone());
        self.storage.replace(S::DIRECTORY_KEY, &records).await?;
        if let Err(e) = self.persist_pointer(S::id(&record)).await {
            // Registration is all or nothing: drop the entry again.
            records.pop();
            if let Err(rollback) = self.storage.replace(S::DIRECTORY_KEY, &records).await {
                tracing::error!(
                    domain = S::DOMAIN,
                    error = %rollback,
                    "Failed to roll back registration"
                );
            }
            return Err(e);
        }
        self.session.resolve(ticket, Some(record.clone()));

        tracing::info!(
            domain = S::DOMAIN,
            id = S::id(&record),
            "Identity registered"
        );
        Ok(record)
    }

    /// Sign in with identifier and password.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<S::Record, AuthError> {
        let result = self.login_inner(identifier, password).await;
        self.notifier
            .report(result, |r| format!("Signed in as {}", S::identifier(r)))
    }

    async fn login_inner(&self, identifier: &str, password: &str) -> Result<S::Record, AuthError> {
        let identifier = identifier.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "username and password are required".to_string(),
            ));
        }

        let ticket = self.session.ticket();
        let _guard = self.write_lock.lock().await;

        let mut records = self.load_records().await?;
        let Some(index) = records
            .iter()
            .position(|r| S::same_identifier(S::identifier(r), identifier))
        else {
            return Err(AuthError::Auth(AuthError::INVALID_CREDENTIALS.to_string()));
        };

        let record = &mut records[index];
        if !self
            .hasher
            .verify_async(password, S::password_hash(record))
            .await?
        {
            tracing::info!(domain = S::DOMAIN, "Login rejected: password mismatch");
            return Err(AuthError::Auth(AuthError::INVALID_CREDENTIALS.to_string()));
        }

        let changed = S::on_login(record);
        let record = record.clone();
        if changed {
            self.storage.replace(S::DIRECTORY_KEY, &records).await?;
        }
        self.finish_login(ticket, record).await
    }

    async fn finish_login(&self, ticket: Ticket, record: S::Record) -> Result<S::Record, AuthError> {
        self.persist_pointer(S::id(&record)).await?;
        self.session.resolve(ticket, Some(record.clone()));
        tracing::info!(domain = S::DOMAIN, id = S::id(&record), "Signed in");
        Ok(record)
    }

    /// Clear the current-identity pointer. The directory entry is untouched.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let ticket = self.session.ticket();
        let result = self.storage.remove(S::CURRENT_KEY).await;
        // The in-memory identity is cleared even if the pointer could not
        // be removed, so the UI never shows a stale signed-in state.
        self.session.resolve(ticket, None);
        tracing::info!(domain = S::DOMAIN, "Signed out");
        self.notifier.report(result, |_| "Signed out".to_string())
    }

    /// Mutate the current identity in place and persist it.
    ///
    /// Returns `Ok(None)` without doing anything when nobody is signed in.
    pub async fn update_current<T>(
        &self,
        mutate: impl FnOnce(&mut S::Record) -> Result<T, AuthError>,
    ) -> Result<Option<(S::Record, T)>, AuthError> {
        let Some(current) = self.session.current() else {
            return Ok(None);
        };

        let ticket = self.session.ticket();
        let _guard = self.write_lock.lock().await;

        let mut records = self.load_records().await?;
        let record = records
            .iter_mut()
            .find(|r| S::id(r) == S::id(&current))
            .ok_or_else(|| AuthError::NotFound(format!("{} identity", S::DOMAIN)))?;

        let output = mutate(record)?;
        let updated = record.clone();

        self.storage.replace(S::DIRECTORY_KEY, &records).await?;
        self.session.resolve(ticket, Some(updated.clone()));
        Ok(Some((updated, output)))
    }

    /// Mutate the entry for `identifier` (signed in or not) and persist it.
    pub async fn update_entry<T>(
        &self,
        identifier: &str,
        mutate: impl FnOnce(&mut S::Record) -> Result<T, AuthError>,
    ) -> Result<T, AuthError> {
        let ticket = self.session.ticket();
        let _guard = self.write_lock.lock().await;

        let mut records = self.load_records().await?;
        let record = records
            .iter_mut()
            .find(|r| S::same_identifier(S::identifier(r), identifier.trim()))
            .ok_or_else(|| AuthError::NotFound(format!("{} account", S::DOMAIN)))?;

        let output = mutate(record)?;
        let updated = record.clone();
        self.storage.replace(S::DIRECTORY_KEY, &records).await?;

        // Keep the in-memory copy in step if this is the signed-in identity.
        if let Some(current) = self.session.current() {
            if S::id(&current) == S::id(&updated) {
                self.session.resolve(ticket, Some(updated));
            }
        }
        Ok(output)
    }

    /// Hash a replacement password under this schema's password policy.
    pub async fn hash_password(&self, new_password: &str) -> Result<String, AuthError> {
        if new_password.chars().count() < S::MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "password must be at least {} characters",
                S::MIN_PASSWORD_LEN
            )));
        }
        self.hasher.hash_async(new_password).await
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn current(&self) -> Option<S::Record> {
        self.session.current()
    }

    pub fn session(&self) -> &SessionStore<S::Record> {
        &self.session
    }

    /// Every registered identity.
    pub async fn records(&self) -> Result<Vec<S::Record>, AuthError> {
        self.load_records().await
    }

    async fn load_records(&self) -> Result<Vec<S::Record>, AuthError> {
        Ok(self
            .storage
            .load::<Vec<S::Record>>(S::DIRECTORY_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn persist_pointer(&self, id: &str) -> Result<(), AuthError> {
        let pointer = CurrentPointer {
            id: id.to_string(),
            signed_in_at: Utc::now(),
        };
        self.storage.replace(S::CURRENT_KEY, &pointer).await
    }
}

fn validate_credentials<S: DirectorySchema>(
    identifier: &str,
    password: &str,
) -> Result<(), AuthError> {
    if identifier.chars().count() < MIN_IDENTIFIER_LEN {
        return Err(AuthError::Validation(format!(
            "username must be at least {} characters",
            MIN_IDENTIFIER_LEN
        )));
    }
    if password.chars().count() < S::MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {} characters",
            S::MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
