// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Bazaar-Auth: session and identity management for the bazaar platform
//!
//! This crate provides the three independent identity providers the
//! platform's feature areas sign in against (a hosted remote provider plus
//! local marketplace and blog credential stores), the session store they
//! share, and a small HTTP gate that verifies remote access tokens.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;

/// Shared state of the identity gate.
pub struct AppState {
    pub config: Config,
}
