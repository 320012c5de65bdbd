// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session lifecycle state shared by every provider.

use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// `uninitialized → loading → {authenticated, anonymous}`, then
/// `authenticated ⇄ anonymous` for the rest of the provider's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Uninitialized,
    Loading,
    Authenticated,
    Anonymous,
}

/// Point-in-time view of a session store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot<I> {
    pub phase: SessionPhase,
    pub identity: Option<I>,
    /// Ticket of the resolution that produced this snapshot
    pub generation: u64,
}

impl<I> SessionSnapshot<I> {
    pub fn initial() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            identity: None,
            generation: 0,
        }
    }

    /// True until the first resolution, including before initialization.
    pub fn is_loading(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Uninitialized | SessionPhase::Loading
        )
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated
    }
}
