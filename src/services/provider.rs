// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider selection: one capability type over the three identity domains.
//!
//! The domains are never reconciled. A consumer asks [`Providers`] for the
//! provider that owns its feature area and works with whatever identity (or
//! none) that provider reports.

use crate::config::Config;
use crate::db::DocumentStore;
use crate::error::AuthError;
use crate::notify::Notifier;
use crate::services::blog::BlogStore;
use crate::services::gotrue::GoTrueClient;
use crate::services::marketplace::MarketplaceStore;
use crate::services::password::PasswordHasher;
use crate::services::remote::RemoteAuthAdapter;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Which identity domain a principal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Remote,
    Marketplace,
    Blog,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Remote => "remote",
            ProviderKind::Marketplace => "marketplace",
            ProviderKind::Blog => "blog",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product area, each owned by exactly one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureArea {
    Listings,
    Blog,
    Chat,
    Courses,
    Donations,
}

impl FeatureArea {
    pub fn provider(self) -> ProviderKind {
        match self {
            FeatureArea::Listings => ProviderKind::Marketplace,
            FeatureArea::Blog => ProviderKind::Blog,
            FeatureArea::Chat | FeatureArea::Courses | FeatureArea::Donations => {
                ProviderKind::Remote
            }
        }
    }
}

impl FromStr for FeatureArea {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "listings" => Ok(FeatureArea::Listings),
            "blog" => Ok(FeatureArea::Blog),
            "chat" => Ok(FeatureArea::Chat),
            "courses" => Ok(FeatureArea::Courses),
            "donations" => Ok(FeatureArea::Donations),
            other => Err(AuthError::Validation(format!(
                "unknown feature area: {}",
                other
            ))),
        }
    }
}

/// Minimal view of whoever is signed in, whatever the domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub provider: ProviderKind,
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
}

/// One identity provider, selected per feature area.
#[derive(Clone)]
pub enum IdentityProvider {
    Remote(Arc<RemoteAuthAdapter>),
    Marketplace(Arc<MarketplaceStore>),
    Blog(Arc<BlogStore>),
}

impl IdentityProvider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            IdentityProvider::Remote(_) => ProviderKind::Remote,
            IdentityProvider::Marketplace(_) => ProviderKind::Marketplace,
            IdentityProvider::Blog(_) => ProviderKind::Blog,
        }
    }

    /// Current principal, or `None` when anonymous or still loading.
    pub fn principal(&self) -> Option<Principal> {
        match self {
            IdentityProvider::Remote(adapter) => adapter.current_identity().map(|user| Principal {
                provider: ProviderKind::Remote,
                display_name: user
                    .metadata
                    .username
                    .clone()
                    .unwrap_or_else(|| user.email.clone()),
                id: user.id,
                email: Some(user.email).filter(|e| !e.is_empty()),
            }),
            IdentityProvider::Marketplace(store) => store.current().map(|user| Principal {
                provider: ProviderKind::Marketplace,
                id: user.id,
                display_name: user.username,
                email: Some(user.email),
            }),
            IdentityProvider::Blog(store) => store.current().map(|user| Principal {
                provider: ProviderKind::Blog,
                id: user.id,
                display_name: user.name,
                email: user.email,
            }),
        }
    }

    pub fn is_loading(&self) -> bool {
        match self {
            IdentityProvider::Remote(adapter) => adapter.session().is_loading(),
            IdentityProvider::Marketplace(store) => store.session().is_loading(),
            IdentityProvider::Blog(store) => store.session().is_loading(),
        }
    }

    /// Current principal, failing when nobody is signed in.
    pub fn require_principal(&self) -> Result<Principal, AuthError> {
        self.principal().ok_or_else(|| {
            AuthError::Auth(format!("Sign in to continue ({})", self.kind()))
        })
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        match self {
            IdentityProvider::Remote(adapter) => adapter.sign_out().await,
            IdentityProvider::Marketplace(store) => store.logout().await,
            IdentityProvider::Blog(store) => store.sign_out().await,
        }
    }
}

/// The constructed providers of an application.
///
/// Any subset may be present; asking for a missing one fails with
/// [`AuthError::ProviderUnavailable`].
#[derive(Clone, Default)]
pub struct Providers {
    remote: Option<Arc<RemoteAuthAdapter>>,
    marketplace: Option<Arc<MarketplaceStore>>,
    blog: Option<Arc<BlogStore>>,
    notifier: Notifier,
}

impl Providers {
    /// Empty set sharing `notifier`; add providers with the `with_*` methods.
    pub fn new(notifier: Notifier) -> Self {
        Self {
            notifier,
            ..Self::default()
        }
    }

    pub fn with_remote(mut self, adapter: RemoteAuthAdapter) -> Self {
        self.remote = Some(Arc::new(adapter));
        self
    }

    pub fn with_marketplace(mut self, store: MarketplaceStore) -> Self {
        self.marketplace = Some(Arc::new(store));
        self
    }

    pub fn with_blog(mut self, store: BlogStore) -> Self {
        self.blog = Some(Arc::new(store));
        self
    }

    /// Construct and initialize all three providers from configuration.
    ///
    /// A remote restore failure is logged and leaves the remote provider
    /// anonymous; local storage failures are fatal.
    pub async fn from_config(config: &Config) -> Result<Self, AuthError> {
        let notifier = Notifier::new();
        let storage = DocumentStore::open(&config.storage_dir).await?;
        let hasher = PasswordHasher::new(config.password_hash_iterations)?;

        let client = GoTrueClient::new(&config.supabase_url, config.supabase_anon_key.clone());
        let remote = RemoteAuthAdapter::new(client, storage.clone(), notifier.clone());
        if let Err(e) = remote.initialize().await {
            tracing::warn!(error = %e, "Remote provider starts anonymous");
        }

        let marketplace =
            MarketplaceStore::open(storage.clone(), hasher.clone(), notifier.clone(), config)
                .await?;
        let blog = BlogStore::open(storage, hasher, notifier.clone()).await?;

        tracing::info!("Identity providers ready");
        Ok(Self::new(notifier)
            .with_remote(remote)
            .with_marketplace(marketplace)
            .with_blog(blog))
    }

    pub fn remote(&self) -> Result<Arc<RemoteAuthAdapter>, AuthError> {
        self.remote
            .clone()
            .ok_or(AuthError::ProviderUnavailable(ProviderKind::Remote.as_str()))
    }

    pub fn marketplace(&self) -> Result<Arc<MarketplaceStore>, AuthError> {
        self.marketplace
            .clone()
            .ok_or(AuthError::ProviderUnavailable(ProviderKind::Marketplace.as_str()))
    }

    pub fn blog(&self) -> Result<Arc<BlogStore>, AuthError> {
        self.blog
            .clone()
            .ok_or(AuthError::ProviderUnavailable(ProviderKind::Blog.as_str()))
    }

    pub fn get(&self, kind: ProviderKind) -> Result<IdentityProvider, AuthError> {
        match kind {
            ProviderKind::Remote => self.remote().map(IdentityProvider::Remote),
            ProviderKind::Marketplace => self.marketplace().map(IdentityProvider::Marketplace),
            ProviderKind::Blog => self.blog().map(IdentityProvider::Blog),
        }
    }

    /// Provider that owns `area`.
    pub fn for_area(&self, area: FeatureArea) -> Result<IdentityProvider, AuthError> {
        self.get(area.provider())
    }

    /// Shared notification channel.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}
