// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider selection and the consumer-facing identity contract.

use bazaar_auth::config::Config;
use bazaar_auth::db::DocumentStore;
use bazaar_auth::error::AuthError;
use bazaar_auth::notify::Notifier;
use bazaar_auth::services::{FeatureArea, ProviderKind, Providers};

mod common;

async fn local_providers() -> Providers {
    let storage = DocumentStore::new_memory();
    let notifier = Notifier::new();
    let marketplace = common::marketplace_store(&storage, &notifier).await;
    let blog = common::blog_store(&storage, &notifier).await;
    Providers::new(notifier)
        .with_marketplace(marketplace)
        .with_blog(blog)
}

#[tokio::test]
async fn test_feature_areas_resolve_to_their_provider() {
    let providers = local_providers().await;

    let listings = providers.for_area(FeatureArea::Listings).unwrap();
    assert_eq!(listings.kind(), ProviderKind::Marketplace);

    let blog = providers.for_area(FeatureArea::Blog).unwrap();
    assert_eq!(blog.kind(), ProviderKind::Blog);

    // No remote adapter was constructed.
    for area in [FeatureArea::Chat, FeatureArea::Courses, FeatureArea::Donations] {
        assert!(matches!(
            providers.for_area(area),
            Err(AuthError::ProviderUnavailable("remote"))
        ));
    }
}

#[tokio::test]
async fn test_principal_per_domain() {
    let providers = local_providers().await;
    let listings = providers.for_area(FeatureArea::Listings).unwrap();
    let blog = providers.for_area(FeatureArea::Blog).unwrap();

    assert!(!listings.is_loading());
    assert!(listings.principal().is_none());
    assert!(matches!(
        listings.require_principal(),
        Err(AuthError::Auth(_))
    ));

    providers
        .marketplace()
        .unwrap()
        .register("alice", "secret1")
        .await
        .unwrap();
    providers
        .blog()
        .unwrap()
        .sign_up("Bob", "pass1", Some("bob@example.com"))
        .await
        .unwrap();

    let seller = listings.require_principal().unwrap();
    assert_eq!(seller.provider, ProviderKind::Marketplace);
    assert_eq!(seller.display_name, "alice");
    assert_eq!(seller.email.as_deref(), Some("alice@users.bazaar.local"));

    let author = blog.require_principal().unwrap();
    assert_eq!(author.provider, ProviderKind::Blog);
    assert_eq!(author.display_name, "Bob");
    assert_eq!(author.email.as_deref(), Some("bob@example.com"));
}

#[tokio::test]
async fn test_sign_out_through_provider_is_scoped() {
    let providers = local_providers().await;
    providers
        .marketplace()
        .unwrap()
        .register("alice", "secret1")
        .await
        .unwrap();
    providers
        .blog()
        .unwrap()
        .sign_up("Bob", "pass1", None)
        .await
        .unwrap();

    providers
        .for_area(FeatureArea::Blog)
        .unwrap()
        .sign_out()
        .await
        .unwrap();

    // The domains are never reconciled.
    assert!(providers
        .for_area(FeatureArea::Blog)
        .unwrap()
        .principal()
        .is_none());
    assert!(providers
        .for_area(FeatureArea::Listings)
        .unwrap()
        .principal()
        .is_some());
}

#[tokio::test]
async fn test_from_config_builds_every_provider() {
    let dir = tempfile::tempdir().unwrap();
    let server = mockito::Server::new_async().await;
    let config = Config {
        supabase_url: server.url(),
        storage_dir: dir.path().to_path_buf(),
        ..Config::test_default()
    };

    let providers = Providers::from_config(&config).await.unwrap();

    for area in [
        FeatureArea::Listings,
        FeatureArea::Blog,
        FeatureArea::Chat,
        FeatureArea::Courses,
        FeatureArea::Donations,
    ] {
        let provider = providers.for_area(area).unwrap();
        assert_eq!(provider.kind(), area.provider());
        assert!(!provider.is_loading());
        assert!(provider.principal().is_none());
    }
}
