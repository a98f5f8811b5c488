//! Credential persistence and local token checks.
//!
//! This module provides:
//! - `CredentialStore`: one persisted slot for the bearer credential, backed
//!   by the OS keychain, a JSON file, or memory
//! - `is_compact_token`: the structural check applied before any verify call
//!
//! Nothing here talks to the network or decides whether a credential is
//! trustworthy; that is the session manager's job.

pub mod credentials;
pub mod token;

pub use credentials::{
    open_store, CredentialStore, FileStore, KeyringStore, MemoryStore, StoreBackend,
};
pub use token::is_compact_token;
