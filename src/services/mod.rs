// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - identity providers and their building blocks.

pub mod blog;
pub mod directory;
pub mod gotrue;
pub mod marketplace;
pub mod password;
pub mod provider;
pub mod remote;
pub mod session;

pub use blog::BlogStore;
pub use directory::{DirectorySchema, LocalDirectory};
pub use gotrue::GoTrueClient;
pub use marketplace::{MarketplaceStore, PasswordRecovery};
pub use password::PasswordHasher;
pub use provider::{FeatureArea, IdentityProvider, Principal, ProviderKind, Providers};
pub use remote::{AuthEvent, RemoteAuthAdapter, SignUpOutcome, StampedEvent};
pub use session::{SessionStore, Ticket};
