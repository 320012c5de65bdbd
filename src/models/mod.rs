// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity data models for the three independent identity domains.

pub mod blog;
pub mod marketplace;
pub mod remote;
pub mod session;

pub use blog::BlogUser;
pub use marketplace::{AdQuota, MarketplaceUser, ResetTicket, SubscriptionTier};
pub use remote::{RemoteIdentity, RemoteSession, SessionTokens, UserMetadata};
pub use session::{SessionPhase, SessionSnapshot};
