//! Session state machine and its provider.
//!
//! This module provides:
//! - `SessionManager`: owns the single session, verifies and silently
//!   renews the credential, publishes snapshots to subscribers
//! - `SessionProvider` / `SessionContext`: the injection point consumers
//!   read state and trigger actions through
//! - `RetryPolicy`: the bounded exponential backoff used for refresh
//!
//! The transition rules live in `machine` as a pure function; the manager
//! is the only code that runs their side effects.

pub mod machine;
pub mod manager;
pub mod provider;
pub mod retry;
pub mod state;

pub use manager::SessionManager;
pub use provider::{SessionContext, SessionProvider};
pub use retry::{refresh_with_retry, RefreshFailure, RetryPolicy};
pub use state::{AuthStatus, SessionSnapshot, SessionState};
