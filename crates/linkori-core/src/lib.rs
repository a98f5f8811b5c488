//! Core library for the Linkori leaderboard client.
//!
//! The interesting part is the session: a bearer credential that must
//! survive restarts, be checked against the backend before it is trusted,
//! be renewed silently when it expires, and never be observed half-valid.
//!
//! ```no_run
//! use linkori_core::api::HttpAuthClient;
//! use linkori_core::auth::open_store;
//! use linkori_core::config::Config;
//! use linkori_core::session::{SessionManager, SessionProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let client = HttpAuthClient::from_config(&config)?;
//! let store = open_store(config.store, &config.origin()?)?;
//! let manager = SessionManager::with_policy(client, store, config.retry_policy());
//! let provider = SessionProvider::new(manager);
//!
//! let session = provider.mount().await;
//! if let Some(header) = session.snapshot().authorization_header() {
//!     println!("Authorization: {}", header);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod session;

pub use api::{ApiError, AuthClient, HttpAuthClient, Provider, Verification};
pub use auth::{CredentialStore, StoreBackend};
pub use config::Config;
pub use session::{AuthStatus, SessionContext, SessionManager, SessionProvider, SessionSnapshot};
