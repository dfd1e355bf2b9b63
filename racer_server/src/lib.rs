//! `racer_server`
//!
//! Server-side systems:
//! - Session registry (authoritative player table)
//! - Join/leave announcements
//! - Fixed-rate `game_state` broadcast
//!
//! Networking model:
//! - HTTP `GET /`: plain-text banner
//! - WebSocket `/ws`: JSON text frames, see `racer_shared::net`

pub mod registry;
pub mod server;

pub use registry::{SessionRegistry, TrustClient, UpdatePolicy};
pub use server::GameServer;
