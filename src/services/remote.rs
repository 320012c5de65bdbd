// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote identity provider adapter.
//!
//! Mirrors the hosted provider's session into a [`SessionStore`] and keeps a
//! copy of it in local storage so a restart can restore it.
//!
//! Two paths can resolve the session after [`RemoteAuthAdapter::initialize`]:
//! the event listener (sign-in/out, token refresh, out-of-band events) and
//! the restore of the persisted session. Each resolution carries the ticket
//! taken when its operation began, and the session store keeps only the
//! newest one.

use crate::db::{storage_keys, DocumentStore};
use crate::error::AuthError;
use crate::models::{RemoteIdentity, RemoteSession, SessionSnapshot};
use crate::notify::Notifier;
use crate::services::gotrue::{GoTrueClient, SignUpResponse};
use crate::services::session::{SessionStore, Ticket};
use chrono::{Duration, Utc};
use std::sync::OnceLock;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use validator::Validate;

/// Margin before expiry at which the access token is refreshed.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Buffered events per subscriber.
const EVENT_CAPACITY: usize = 32;

/// Session change reported by the adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(RemoteSession),
    SignedOut,
    TokenRefreshed(RemoteSession),
    /// The provider refused to refresh the session.
    SessionExpired,
}

impl AuthEvent {
    /// Session state this event leaves behind.
    fn session(&self) -> Option<RemoteSession> {
        match self {
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => {
                Some(session.clone())
            }
            AuthEvent::SignedOut | AuthEvent::SessionExpired => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn(_) => "signed_in",
            AuthEvent::SignedOut => "signed_out",
            AuthEvent::TokenRefreshed(_) => "token_refreshed",
            AuthEvent::SessionExpired => "session_expired",
        }
    }
}

/// An event together with the ticket of the operation that produced it.
#[derive(Debug, Clone)]
pub struct StampedEvent {
    pub ticket: Ticket,
    pub event: AuthEvent,
}

/// Result of a successful sign-up.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// The provider confirmed the account immediately; the session is live.
    SignedIn(RemoteIdentity),
    /// The account exists but the email must be confirmed before sign-in.
    ConfirmationRequired(RemoteIdentity),
}

#[derive(Debug, Validate)]
struct SignUpRequest {
    #[validate(email)]
    email: String,
    #[validate(length(min = 6))]
    password: String,
}

#[derive(Debug, Validate)]
struct EmailRequest {
    #[validate(email)]
    email: String,
}

/// Adapter over the hosted identity provider.
pub struct RemoteAuthAdapter {
    client: GoTrueClient,
    storage: DocumentStore,
    notifier: Notifier,
    session: SessionStore<RemoteSession>,
    events: broadcast::Sender<StampedEvent>,
    /// Serializes token refresh.
    refresh_lock: Mutex<()>,
    listener: OnceLock<JoinHandle<()>>,
}

impl RemoteAuthAdapter {
    pub fn new(client: GoTrueClient, storage: DocumentStore, notifier: Notifier) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client,
            storage,
            notifier,
            session: SessionStore::new(),
            events,
            refresh_lock: Mutex::new(()),
            listener: OnceLock::new(),
        }
    }

    /// Start listening for session events and restore the persisted session.
    ///
    /// Safe to call more than once, concurrently or not: only one listener
    /// is ever installed, and the loading phase ends exactly once. A failed
    /// restore leaves the adapter anonymous and returns the error.
    pub async fn initialize(&self) -> Result<Option<RemoteIdentity>, AuthError> {
        self.listener.get_or_init(|| {
            let rx = self.events.subscribe();
            tokio::spawn(listen(rx, self.session.clone(), self.storage.clone()))
        });

        self.session.begin_loading();
        let ticket = self.session.ticket();

        let result = match self.restore().await {
            Ok(restored) => {
                let applied = self.session.resolve(ticket, restored.clone());
                let user = restored.as_ref().map(|s| s.user.clone());
                if applied {
                    self.store_document(restored.as_ref())
                        .await
                        .map(|()| user)
                } else {
                    Ok(self.current_identity())
                }
            }
            Err(e) => {
                self.session.resolve(ticket, None);
                tracing::warn!(error = %e, "Failed to restore remote session");
                Err(e)
            }
        };

        match &result {
            Ok(Some(user)) => self.notifier.success(format!("Welcome back, {}", user.email)),
            Ok(None) => {}
            Err(e) => self.notifier.failure(e),
        }
        tracing::info!(
            signed_in = matches!(result, Ok(Some(_))),
            "Remote session initialized"
        );
        result
    }

    /// Load the persisted session, refresh it if needed, and confirm it
    /// with the provider. Storage is left for the caller to update.
    async fn restore(&self) -> Result<Option<RemoteSession>, AuthError> {
        let Some(mut stored) = self
            .storage
            .load::<RemoteSession>(storage_keys::REMOTE_SESSION)
            .await?
        else {
            return Ok(None);
        };

        let now = Utc::now();
        if stored
            .tokens
            .expires_within(now, Duration::seconds(TOKEN_REFRESH_MARGIN_SECS))
        {
            tracing::debug!("Persisted session expiring, refreshing");
            match self.client.refresh_session(&stored.tokens.refresh_token).await {
                Ok(response) => stored = response.into_session(now),
                Err(e) if e.is_session_expired() => return Ok(None),
                Err(e) => return Err(e),
            }
        }

        match self.client.get_user(&stored.tokens.access_token).await {
            Ok(user) => {
                stored.user = user;
                Ok(Some(stored))
            }
            Err(e) if e.is_session_expired() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create an account. Only an immediately confirmed account changes the
    /// session.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> Result<SignUpOutcome, AuthError> {
        let result = self.sign_up_inner(email, password, username).await;
        self.notifier.report(result, |outcome| match outcome {
            SignUpOutcome::SignedIn(user) => format!("Welcome, {}!", user.email),
            SignUpOutcome::ConfirmationRequired(user) => {
                format!("Check {} for a confirmation link", user.email)
            }
        })
    }

    async fn sign_up_inner(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> Result<SignUpOutcome, AuthError> {
        let request = SignUpRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        request.validate()?;
        let username = username.map(str::trim).filter(|u| !u.is_empty());

        let ticket = self.session.ticket();
        match self
            .client
            .sign_up(&request.email, &request.password, username)
            .await?
        {
            SignUpResponse::Session(response) => {
                let session = (*response).into_session(Utc::now());
                let user = session.user.clone();
                self.apply(ticket, AuthEvent::SignedIn(session)).await?;
                tracing::info!(user_id = %user.id, "Remote account created and signed in");
                Ok(SignUpOutcome::SignedIn(user))
            }
            SignUpResponse::User(user) => {
                tracing::info!(user_id = %user.id, "Remote account created, confirmation pending");
                Ok(SignUpOutcome::ConfirmationRequired(user))
            }
        }
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<RemoteIdentity, AuthError> {
        let result = self.sign_in_inner(email, password).await;
        self.notifier
            .report(result, |user| format!("Signed in as {}", user.email))
    }

    async fn sign_in_inner(&self, email: &str, password: &str) -> Result<RemoteIdentity, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "email and password are required".to_string(),
            ));
        }

        let ticket = self.session.ticket();
        let response = self.client.sign_in_with_password(email, password).await?;
        let session = response.into_session(Utc::now());
        let user = session.user.clone();
        self.apply(ticket, AuthEvent::SignedIn(session)).await?;
        tracing::info!(user_id = %user.id, "Remote sign-in");
        Ok(user)
    }

    /// Sign out. Local state is always cleared; the error reports a failed
    /// remote revoke.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let ticket = self.session.ticket();
        let revoked = match self.session.current() {
            Some(current) => self.client.logout(&current.tokens.access_token).await,
            None => Ok(()),
        };
        if let Err(e) = &revoked {
            tracing::warn!(error = %e, "Remote revoke failed, clearing local session anyway");
        }

        let cleared = self.apply(ticket, AuthEvent::SignedOut).await;
        let result = revoked.and(cleared);
        self.notifier.report(result, |_| "Signed out".to_string())
    }

    /// Ask the provider to send a reset link.
    ///
    /// Succeeds whether or not the address has an account; only a transport
    /// failure (or a malformed address) is reported.
    pub async fn reset_password(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AuthError> {
        let result = self.reset_password_inner(email, redirect_to).await;
        self.notifier.report(result, |_| {
            "If that address has an account, a reset link is on its way".to_string()
        })
    }

    async fn reset_password_inner(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AuthError> {
        let request = EmailRequest {
            email: email.trim().to_string(),
        };
        request.validate()?;

        match self.client.recover(&request.email, redirect_to).await {
            Ok(()) => Ok(()),
            Err(AuthError::Network(msg)) => Err(AuthError::Network(msg)),
            Err(e) => {
                tracing::info!(error = %e, "Provider rejected recovery request, not reported");
                Ok(())
            }
        }
    }

    /// Exchange the refresh token for a new token pair now.
    ///
    /// A rejected refresh signs the adapter out with `SessionExpired`.
    pub async fn refresh_session(&self) -> Result<RemoteIdentity, AuthError> {
        let result = async {
            let _guard = self.refresh_lock.lock().await;
            let current = self.require_session()?;
            self.refresh_locked(current).await.map(|s| s.user)
        }
        .await;
        self.notifier.report(result, |_| "Session refreshed".to_string())
    }

    /// A valid access token for the current session, refreshed first when
    /// it expires within the refresh margin.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        let current = self.require_session()?;
        if !current.tokens.expires_within(Utc::now(), margin) {
            return Ok(current.tokens.access_token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another task may have refreshed while we waited.
        let current = self.require_session()?;
        if !current.tokens.expires_within(Utc::now(), margin) {
            return Ok(current.tokens.access_token);
        }

        tracing::info!("Access token expiring, refreshing");
        let refreshed = self.refresh_locked(current).await;
        if let Err(e) = &refreshed {
            self.notifier.failure(e);
        }
        refreshed.map(|s| s.tokens.access_token)
    }

    /// Refresh with the refresh lock held.
    async fn refresh_locked(&self, current: RemoteSession) -> Result<RemoteSession, AuthError> {
        let ticket = self.session.ticket();
        match self.client.refresh_session(&current.tokens.refresh_token).await {
            Ok(response) => {
                let session = response.into_session(Utc::now());
                self.apply(ticket, AuthEvent::TokenRefreshed(session.clone()))
                    .await?;
                Ok(session)
            }
            Err(e) if e.is_session_expired() => {
                tracing::info!(user_id = %current.user.id, "Refresh rejected, session expired");
                if let Err(clear) = self.apply(ticket, AuthEvent::SessionExpired).await {
                    tracing::warn!(error = %clear, "Failed to clear expired session");
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Inject an out-of-band session event (e.g. a sign-out in another
    /// window). It is applied and persisted by the listener installed in
    /// [`initialize`](Self::initialize); without one the event is refused.
    pub fn publish(&self, event: AuthEvent) -> Result<(), AuthError> {
        let name = event.name();
        if self.listener.get().is_none() {
            tracing::warn!(event = name, "Event published before initialize, dropped");
            return Err(AuthError::Internal(anyhow::anyhow!(
                "Session listener not running"
            )));
        }

        let ticket = self.session.ticket();
        tracing::debug!(event = name, ticket = ticket.generation(), "Event published");
        self.events
            .send(StampedEvent { ticket, event })
            .map(|_| ())
            .map_err(|_| {
                tracing::warn!(event = name, "Session listener gone, event dropped");
                AuthError::Internal(anyhow::anyhow!("Session listener not running"))
            })
    }

    /// Apply a locally produced event: update memory, persist, broadcast.
    async fn apply(&self, ticket: Ticket, event: AuthEvent) -> Result<(), AuthError> {
        let session = event.session();
        let applied = self.session.resolve(ticket, session.clone());

        let persisted = if applied {
            self.store_document(session.as_ref()).await
        } else {
            Ok(())
        };

        tracing::debug!(event = event.name(), applied, "Session event");
        let _ = self.events.send(StampedEvent { ticket, event });
        persisted
    }

    async fn store_document(&self, session: Option<&RemoteSession>) -> Result<(), AuthError> {
        store_session_document(&self.storage, session).await
    }

    fn require_session(&self) -> Result<RemoteSession, AuthError> {
        self.session
            .current()
            .ok_or_else(|| AuthError::Auth("Not signed in".to_string()))
    }

    pub fn current_identity(&self) -> Option<RemoteIdentity> {
        self.session.current().map(|s| s.user)
    }

    pub fn snapshot(&self) -> SessionSnapshot<RemoteSession> {
        self.session.snapshot()
    }

    pub fn session(&self) -> &SessionStore<RemoteSession> {
        &self.session
    }

    /// Watch session state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot<RemoteSession>> {
        self.session.subscribe()
    }

    /// Receive every session event from now on.
    pub fn events(&self) -> broadcast::Receiver<StampedEvent> {
        self.events.subscribe()
    }
}

impl Drop for RemoteAuthAdapter {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get() {
            listener.abort();
        }
    }
}

/// Write (or clear) the persisted session document.
async fn store_session_document(
    storage: &DocumentStore,
    session: Option<&RemoteSession>,
) -> Result<(), AuthError> {
    match session {
        Some(session) => storage.replace(storage_keys::REMOTE_SESSION, session).await,
        None => storage.remove(storage_keys::REMOTE_SESSION).await,
    }
}

/// Mirror broadcast events into the session store, and into storage when
/// they win.
///
/// Events from the adapter's own operations were already applied under the
/// same ticket, so only out-of-band events land here.
async fn listen(
    mut rx: broadcast::Receiver<StampedEvent>,
    session: SessionStore<RemoteSession>,
    storage: DocumentStore,
) {
    loop {
        match rx.recv().await {
            Ok(StampedEvent { ticket, event }) => {
                let state = event.session();
                if !session.resolve(ticket, state.clone()) {
                    continue;
                }
                tracing::info!(event = event.name(), "Out-of-band session event applied");
                if let Err(e) = store_session_document(&storage, state.as_ref()).await {
                    tracing::warn!(error = %e, "Failed to persist out-of-band session event");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Session listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_up_request_validation() {
        let ok = SignUpRequest {
            email: "ann@example.com".to_string(),
            password: "secret".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad = SignUpRequest {
            email: "not-an-email".to_string(),
            password: "12345".to_string(),
        };
        let err: AuthError = bad.validate().unwrap_err().into();
        assert!(matches!(err, AuthError::Validation(ref m) if m == "invalid email, password"));
    }

    #[test]
    fn events_map_to_session_state() {
        assert_eq!(AuthEvent::SignedOut.session(), None);
        assert_eq!(AuthEvent::SessionExpired.session(), None);
    }
}
