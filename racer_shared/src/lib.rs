//! `racer_shared`
//!
//! Code that must behave identically on client and server.
//!
//! - `terrain`: seeded track generation and ground queries.
//! - `physics`: the per-frame vehicle step.
//! - `player`: vehicle state and its broadcast projection.
//! - `net`: wire messages and codec.
//! - `config`: runtime settings.

pub mod config;
pub mod net;
pub mod physics;
pub mod player;
pub mod terrain;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::net::*;
    pub use crate::physics::*;
    pub use crate::player::*;
    pub use crate::terrain::*;
}
