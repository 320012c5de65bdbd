//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honoured for local development.

use std::env;
use std::path::PathBuf;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Hosted identity provider ---
    /// Project URL of the hosted auth service (e.g. `https://xyz.supabase.co`)
    pub supabase_url: String,
    /// Public (anon) API key sent with every provider request
    pub supabase_anon_key: String,
    /// Secret the provider signs access tokens with (HS256, raw bytes)
    pub jwt_secret: Vec<u8>,

    // --- Identity gate ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,

    // --- Local credential stores ---
    /// Directory holding the persisted identity documents
    pub storage_dir: PathBuf,
    /// PBKDF2 iteration count for local password hashes
    pub password_hash_iterations: u32,
    /// Lifetime of a local password-reset token
    pub reset_token_ttl_minutes: i64,
    /// Marketplace usernames that receive the admin flag on registration
    pub marketplace_admins: Vec<String>,
}

impl Config {
    /// Default PBKDF2 work factor for local stores.
    pub const DEFAULT_PASSWORD_HASH_ITERATIONS: u32 = 100_000;
    /// Default lifetime for marketplace reset tokens.
    pub const DEFAULT_RESET_TOKEN_TTL_MINUTES: i64 = 30;

    /// Config for testing only: in-memory friendly values and a cheap hash.
    pub fn test_default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test_anon_key".to_string(),
            jwt_secret: b"test_jwt_secret_32_bytes_minimum!".to_vec(),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            storage_dir: env::temp_dir().join("bazaar-auth-test"),
            password_hash_iterations: 1_000,
            reset_token_ttl_minutes: Self::DEFAULT_RESET_TOKEN_TTL_MINUTES,
            marketplace_admins: vec!["admin".to_string()],
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let password_hash_iterations = match env::var("PASSWORD_HASH_ITERATIONS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .ok()
                .filter(|n: &u32| *n > 0)
                .ok_or(ConfigError::Invalid("PASSWORD_HASH_ITERATIONS"))?,
            Err(_) => Self::DEFAULT_PASSWORD_HASH_ITERATIONS,
        };

        let reset_token_ttl_minutes = match env::var("RESET_TOKEN_TTL_MINUTES") {
            Ok(raw) => raw
                .trim()
                .parse()
                .ok()
                .filter(|n: &i64| *n > 0)
                .ok_or(ConfigError::Invalid("RESET_TOKEN_TTL_MINUTES"))?,
            Err(_) => Self::DEFAULT_RESET_TOKEN_TTL_MINUTES,
        };

        Ok(Self {
            supabase_url: env::var("SUPABASE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_URL"))?,
            supabase_anon_key: env::var("SUPABASE_ANON_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_ANON_KEY"))?,
            jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .map_err(|_| ConfigError::Missing("SUPABASE_JWT_SECRET"))?
                .into_bytes(),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            storage_dir: env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/identity")),
            password_hash_iterations,
            reset_token_ttl_minutes,
            marketplace_admins: env::var("MARKETPLACE_ADMINS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
        })
    }
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
