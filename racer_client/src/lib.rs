//! `racer_client`
//!
//! Client-side systems:
//! - Local vehicle simulation against the shared track
//! - Rate-limited `player_update` uploads
//! - Network link on a background task
//! - Shadow table of remote players for the renderer to read

pub mod client;
pub mod input;
pub mod rate;
pub mod shadow;

pub use client::GameClient;
