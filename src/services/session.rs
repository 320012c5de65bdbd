// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session store: current identity (or none) plus loading state.
//!
//! Writers take a [`Ticket`] when they *start* an operation and resolve with
//! it when the operation completes. A resolution is applied only if its
//! ticket is newer than the one that produced the current snapshot, so a
//! slow response can never overwrite state written by a later operation.

use crate::models::{SessionPhase, SessionSnapshot};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Monotonic generation number handed out by [`SessionStore::ticket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    pub fn generation(self) -> u64 {
        self.0
    }
}

struct Inner<I> {
    state: watch::Sender<SessionSnapshot<I>>,
    next_ticket: AtomicU64,
}

/// Shared handle to one provider's session state. Clones observe the same
/// state.
pub struct SessionStore<I> {
    inner: Arc<Inner<I>>,
}

impl<I> Clone for SessionStore<I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I: Clone + Send + Sync + 'static> Default for SessionStore<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Clone + Send + Sync + 'static> SessionStore<I> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: watch::Sender::new(SessionSnapshot::initial()),
                next_ticket: AtomicU64::new(0),
            }),
        }
    }

    /// Issue the next generation ticket.
    pub fn ticket(&self) -> Ticket {
        Ticket(self.inner.next_ticket.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Enter `loading`. Only the first call does anything; a store that is
    /// already loading or resolved never goes back.
    pub fn begin_loading(&self) -> bool {
        self.inner.state.send_if_modified(|snapshot| {
            if snapshot.phase == SessionPhase::Uninitialized {
                snapshot.phase = SessionPhase::Loading;
                true
            } else {
                false
            }
        })
    }

    /// Apply a resolution issued under `ticket`. Returns false when a newer
    /// resolution already landed and this one was dropped.
    pub fn resolve(&self, ticket: Ticket, identity: Option<I>) -> bool {
        let applied = self.inner.state.send_if_modified(|snapshot| {
            if ticket.0 <= snapshot.generation {
                return false;
            }
            snapshot.phase = if identity.is_some() {
                SessionPhase::Authenticated
            } else {
                SessionPhase::Anonymous
            };
            snapshot.identity = identity;
            snapshot.generation = ticket.0;
            true
        });

        if !applied {
            tracing::debug!(
                ticket = ticket.0,
                current = self.inner.state.borrow().generation,
                "Dropped stale session resolution"
            );
        }
        applied
    }

    /// Resolve with a freshly issued ticket (for operations with no
    /// suspension point between start and completion).
    pub fn set(&self, identity: Option<I>) -> bool {
        let ticket = self.ticket();
        self.resolve(ticket, identity)
    }

    pub fn snapshot(&self) -> SessionSnapshot<I> {
        self.inner.state.borrow().clone()
    }

    pub fn current(&self) -> Option<I> {
        self.inner.state.borrow().identity.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.state.borrow().phase
    }

    /// Watch every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot<I>> {
        self.inner.state.subscribe()
    }
}
