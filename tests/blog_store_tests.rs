// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Blog credential store behaviour.

use bazaar_auth::db::DocumentStore;
use bazaar_auth::error::AuthError;
use bazaar_auth::models::SessionPhase;
use bazaar_auth::notify::{NoticeLevel, Notifier};

mod common;

#[tokio::test]
async fn test_names_are_case_insensitive() {
    let store = common::blog_store(&DocumentStore::new_memory(), &Notifier::new()).await;

    let bob = store.sign_up("Bob", "pass1", None).await.unwrap();
    assert_eq!(bob.name, "Bob");
    store.sign_out().await.unwrap();

    let signed_in = store.sign_in("bob", "pass1").await.unwrap();
    assert_eq!(signed_in.id, bob.id);
    assert_eq!(signed_in.name, "Bob");

    let duplicate = store.sign_up("BOB", "pass2", None).await;
    assert!(matches!(duplicate, Err(AuthError::DuplicateIdentifier(ref n)) if n == "BOB"));
    assert_eq!(store.current().unwrap().id, bob.id);
}

#[tokio::test]
async fn test_optional_email() {
    let store = common::blog_store(&DocumentStore::new_memory(), &Notifier::new()).await;

    let with_email = store
        .sign_up("carol", "pw12", Some(" carol@example.com "))
        .await
        .unwrap();
    assert_eq!(with_email.email.as_deref(), Some("carol@example.com"));

    let blank = store.sign_up("dave", "pw12", Some("  ")).await.unwrap();
    assert_eq!(blank.email, None);
}

#[tokio::test]
async fn test_password_policy() {
    let store = common::blog_store(&DocumentStore::new_memory(), &Notifier::new()).await;
    assert!(matches!(
        store.sign_up("bob", "abc", None).await,
        Err(AuthError::Validation(_))
    ));
    // Four characters is enough for the blog.
    store.sign_up("bob", "abcd", None).await.unwrap();
}

#[tokio::test]
async fn test_sign_out_keeps_entry() {
    let storage = DocumentStore::new_memory();
    let notifier = Notifier::new();
    let store = common::blog_store(&storage, &notifier).await;
    let mut rx = notifier.subscribe();

    store.sign_up("Bob", "pass1", None).await.unwrap();
    assert_eq!(store.session().phase(), SessionPhase::Authenticated);

    store.sign_out().await.unwrap();
    assert_eq!(store.session().phase(), SessionPhase::Anonymous);
    assert!(store.current().is_none());

    // Idempotent.
    store.sign_out().await.unwrap();

    let reopened = common::blog_store(&storage, &notifier).await;
    assert!(reopened.current().is_none());
    reopened.sign_in("BOB", "pass1").await.unwrap();

    let notices = common::drain(&mut rx);
    assert!(notices.iter().all(|n| n.level == NoticeLevel::Success));
    assert_eq!(notices.last().unwrap().message, "Signed in as Bob");
}

#[tokio::test]
async fn test_stores_are_independent() {
    let storage = DocumentStore::new_memory();
    let notifier = Notifier::new();
    let blog = common::blog_store(&storage, &notifier).await;
    let marketplace = common::marketplace_store(&storage, &notifier).await;

    blog.sign_up("alice", "pw12", None).await.unwrap();
    assert!(marketplace.current().is_none());
    assert!(matches!(
        marketplace.login("alice", "pw12").await,
        Err(AuthError::Auth(_))
    ));

    // Same name, separate directory.
    marketplace.register("alice", "secret1").await.unwrap();
    assert_eq!(blog.current().unwrap().name, "alice");
}
