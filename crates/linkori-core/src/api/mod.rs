//! REST client module for the Linkori backend.
//!
//! This module provides the `AuthClient` contract the session manager
//! depends on, and `HttpAuthClient`, its reqwest implementation.
//!
//! The backend issues compact signed bearer tokens. Verification is a
//! plain POST of the token; renewal relies on an HTTP-only refresh cookie
//! held in the client's cookie jar.

pub mod client;
pub mod error;

pub use client::{AuthClient, HttpAuthClient, Provider, Verification};
pub use error::ApiError;
