// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use bazaar_auth::config::Config;
use bazaar_auth::db::DocumentStore;
use bazaar_auth::notify::{Notice, Notifier};
use bazaar_auth::routes::create_router;
use bazaar_auth::services::{
    BlogStore, GoTrueClient, MarketplaceStore, PasswordHasher, RemoteAuthAdapter,
};
use bazaar_auth::AppState;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Cheap hasher so tests don't spend their time in PBKDF2.
#[allow(dead_code)]
pub fn test_hasher() -> PasswordHasher {
    PasswordHasher::new(Config::test_default().password_hash_iterations)
        .expect("Failed to create hasher")
}

/// Open a marketplace store over `storage`.
#[allow(dead_code)]
pub async fn marketplace_store(storage: &DocumentStore, notifier: &Notifier) -> MarketplaceStore {
    MarketplaceStore::open(
        storage.clone(),
        test_hasher(),
        notifier.clone(),
        &Config::test_default(),
    )
    .await
    .expect("Failed to open marketplace store")
}

/// Open a blog store over `storage`.
#[allow(dead_code)]
pub async fn blog_store(storage: &DocumentStore, notifier: &Notifier) -> BlogStore {
    BlogStore::open(storage.clone(), test_hasher(), notifier.clone())
        .await
        .expect("Failed to open blog store")
}

/// Remote adapter talking to a mock provider at `server_url`.
#[allow(dead_code)]
pub fn remote_adapter(server_url: &str, storage: &DocumentStore) -> RemoteAuthAdapter {
    let client = GoTrueClient::with_base_url(server_url, "test_anon_key".to_string());
    RemoteAuthAdapter::new(client, storage.clone(), Notifier::new())
}

/// Drain every notice published so far.
#[allow(dead_code)]
pub fn drain(rx: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        notices.push(notice);
    }
    notices
}

/// Create a test gate app.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState {
        config: Config::test_default(),
    });
    (create_router(state.clone()), state)
}
