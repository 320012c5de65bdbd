// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Marketplace credential store: local identities with subscription tiers
//! and ad quotas.
//!
//! Password recovery issues a one-time reset token instead of ever handing
//! back a stored password; the token is delivered out of band by the caller
//! and redeemed with [`MarketplaceStore::reset_password`].

use crate::config::Config;
use crate::db::{storage_keys, DocumentStore};
use crate::error::AuthError;
use crate::models::{MarketplaceUser, ResetTicket, SubscriptionTier};
use crate::notify::Notifier;
use crate::services::directory::{DirectorySchema, LocalDirectory};
use crate::services::password::{token_matches, PasswordHasher};
use crate::services::session::SessionStore;
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Duration, Utc};

/// Registration extras for a marketplace identity.
#[derive(Debug, Clone, Default)]
pub struct NewMarketplaceUser {
    /// Contact address; derived from the username when absent
    pub email: Option<String>,
    pub is_admin: bool,
}

/// Marketplace rules: case-sensitive usernames, six-character passwords,
/// quota recomputed from the tier on every login.
pub struct MarketplaceSchema;

impl DirectorySchema for MarketplaceSchema {
    type Record = MarketplaceUser;
    type Extra = NewMarketplaceUser;

    const DOMAIN: &'static str = "marketplace";
    const DIRECTORY_KEY: &'static str = storage_keys::MARKETPLACE_USERS;
    const CURRENT_KEY: &'static str = storage_keys::MARKETPLACE_CURRENT;
    const MIN_PASSWORD_LEN: usize = 6;

    fn same_identifier(a: &str, b: &str) -> bool {
        a == b
    }

    fn id(record: &MarketplaceUser) -> &str {
        &record.id
    }

    fn identifier(record: &MarketplaceUser) -> &str {
        &record.username
    }

    fn password_hash(record: &MarketplaceUser) -> &str {
        &record.password_hash
    }

    fn set_password_hash(record: &mut MarketplaceUser, hash: String) {
        record.password_hash = hash;
    }

    fn new_record(
        id: String,
        identifier: &str,
        password_hash: String,
        extra: NewMarketplaceUser,
        now: DateTime<Utc>,
    ) -> MarketplaceUser {
        let tier = SubscriptionTier::Free;
        MarketplaceUser {
            id,
            username: identifier.to_string(),
            password_hash,
            email: extra
                .email
                .unwrap_or_else(|| MarketplaceUser::derived_email(identifier)),
            is_admin: extra.is_admin,
            subscription_tier: tier,
            ads_used: 0,
            ads_quota: tier.ad_quota(),
            subscription_end: None,
            created_at: now,
            reset_ticket: None,
        }
    }

    fn on_login(record: &mut MarketplaceUser) -> bool {
        record.refresh_quota()
    }
}

/// Reset token handed to the caller for out-of-band delivery.
#[derive(Debug, Clone)]
pub struct PasswordRecovery {
    pub username: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Marketplace identity store.
pub struct MarketplaceStore {
    directory: LocalDirectory<MarketplaceSchema>,
    admins: Vec<String>,
    reset_token_ttl: Duration,
}

impl MarketplaceStore {
    /// Open the store and restore the persisted current identity.
    pub async fn open(
        storage: DocumentStore,
        hasher: PasswordHasher,
        notifier: Notifier,
        config: &Config,
    ) -> Result<Self, AuthError> {
        let directory = LocalDirectory::open(storage, hasher, notifier).await?;
        Ok(Self {
            directory,
            admins: config.marketplace_admins.clone(),
            reset_token_ttl: Duration::minutes(config.reset_token_ttl_minutes),
        })
    }

    /// Register with a derived email address.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<MarketplaceUser, AuthError> {
        self.register_with_email(username, password, None).await
    }

    pub async fn register_with_email(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<MarketplaceUser, AuthError> {
        let extra = NewMarketplaceUser {
            email: email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
            is_admin: self.admins.iter().any(|admin| admin == username.trim()),
        };
        self.directory.register(username, password, extra).await
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<MarketplaceUser, AuthError> {
        self.directory.login(username, password).await
    }

    pub async fn logout(&self) -> Result<(), AuthError> {
        self.directory.logout().await
    }

    pub fn current(&self) -> Option<MarketplaceUser> {
        self.directory.current()
    }

    pub fn session(&self) -> &SessionStore<MarketplaceUser> {
        self.directory.session()
    }

    /// Every registered marketplace identity.
    pub async fn users(&self) -> Result<Vec<MarketplaceUser>, AuthError> {
        self.directory.records().await
    }

    /// Start password recovery for `username`.
    ///
    /// Issues a fresh single-use token (replacing any earlier one) and
    /// returns it for delivery. Only its digest is stored.
    pub async fn recover_password(&self, username: &str) -> Result<PasswordRecovery, AuthError> {
        let result = self.recover_password_inner(username).await;
        self.directory.notifier().report(result, |recovery| {
            format!(
                "Recovery instructions issued, valid until {}",
                format_utc_rfc3339(recovery.expires_at)
            )
        })
    }

    async fn recover_password_inner(&self, username: &str) -> Result<PasswordRecovery, AuthError> {
        if username.trim().is_empty() {
            return Err(AuthError::Validation("username is required".to_string()));
        }

        let (token, digest) = self.directory.hasher().issue_reset_token()?;
        let expires_at = Utc::now() + self.reset_token_ttl;

        let username = self
            .directory
            .update_entry(username, |user| {
                user.reset_ticket = Some(ResetTicket {
                    token_digest: digest,
                    expires_at,
                });
                Ok(user.username.clone())
            })
            .await
            .map_err(|e| match e {
                AuthError::NotFound(_) => AuthError::NotFound("Account".to_string()),
                other => other,
            })?;

        tracing::info!(username = %username, "Password reset token issued");
        Ok(PasswordRecovery {
            username,
            token,
            expires_at,
        })
    }

    /// Redeem a reset token and set a new password.
    pub async fn reset_password(
        &self,
        username: &str,
        token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let result = self.reset_password_inner(username, token, new_password).await;
        self.directory
            .notifier()
            .report(result, |_| "Password updated, please sign in".to_string())
    }

    async fn reset_password_inner(
        &self,
        username: &str,
        token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let new_hash = self.directory.hash_password(new_password).await?;
        let now = Utc::now();
        let rejected = || AuthError::Auth("Reset link is invalid or has expired".to_string());

        self.directory
            .update_entry(username, |user| {
                let ticket = user.reset_ticket.take().ok_or_else(rejected)?;
                if ticket.expires_at <= now || !token_matches(token, &ticket.token_digest) {
                    return Err(rejected());
                }
                MarketplaceSchema::set_password_hash(user, new_hash);
                Ok(())
            })
            .await
            .map_err(|e| match e {
                // Don't reveal whether the account exists.
                AuthError::NotFound(_) => rejected(),
                other => other,
            })?;

        tracing::info!(username = %username.trim(), "Password reset completed");
        Ok(())
    }

    /// Change the current identity's tier and start a 30-day period.
    ///
    /// Returns `Ok(None)` without doing anything when nobody is signed in.
    pub async fn upgrade_subscription(
        &self,
        tier: SubscriptionTier,
    ) -> Result<Option<MarketplaceUser>, AuthError> {
        let result = self
            .directory
            .update_current(|user| user.apply_tier(tier, Utc::now()))
            .await
            .map(|updated| updated.map(|(user, ())| user));

        match result {
            Ok(None) => {
                tracing::debug!("Subscription change ignored: nobody signed in");
                Ok(None)
            }
            other => self
                .directory
                .notifier()
                .report(other, |_| format!("Subscription changed to {}", tier)),
        }
    }

    /// Whether the current identity may post another ad.
    pub fn can_create_ad(&self) -> bool {
        self.current().is_some_and(|user| user.can_create_ad())
    }

    /// Count one posted ad for the current identity. Returns the new count.
    pub async fn increment_ad_count(&self) -> Result<u32, AuthError> {
        let result = self
            .directory
            .update_current(|user| user.record_ad())
            .await
            .and_then(|updated| {
                updated
                    .map(|(_, count)| count)
                    .ok_or_else(|| AuthError::Auth("Sign in to post ads".to_string()))
            });

        self.directory
            .notifier()
            .report(result, |count| format!("Ad posted ({} so far)", count))
    }
}
