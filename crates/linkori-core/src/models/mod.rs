//! Data models returned by the Linkori backend.
//!
//! - `UserProfile`: the signed-in account, with its linked Discord and
//!   osu! identities

pub mod user;

pub use user::{DiscordAccount, OsuAccount, OsuProfile, UserProfile};
