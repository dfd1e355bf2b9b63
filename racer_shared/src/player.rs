//! Player/vehicle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::net::ClientId;

/// RGB display color.
pub type Color = [u8; 3];

/// Full vehicle state for one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleState {
    pub id: ClientId,
    /// Horizontal progress.
    pub x: f64,
    /// Vertical position, growing downward.
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    /// Furthest `x` reached so far. Never decreases.
    pub distance: f64,
    pub color: Color,
    pub nickname: String,
    pub on_ground: bool,
    /// Slope under the vehicle at last contact, degrees. Cosmetic.
    pub angle: f64,
    pub last_update: DateTime<Utc>,
}

impl VehicleState {
    /// A vehicle at rest at `(x, y)`, with `distance` starting at `x`.
    pub fn at_rest(id: ClientId, x: f64, y: f64, color: Color, nickname: String) -> Self {
        Self {
            id,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            distance: x.max(0.0),
            color,
            nickname,
            on_ground: true,
            angle: 0.0,
            last_update: Utc::now(),
        }
    }

    /// Raises `distance` to `candidate` if it is further.
    pub fn record_progress(&mut self, candidate: f64) {
        if candidate > self.distance {
            self.distance = candidate;
        }
    }

    /// Public projection used in broadcasts.
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            x: self.x,
            y: self.y,
            vx: self.vx,
            vy: self.vy,
            distance: self.distance,
            color: self.color,
            nickname: self.nickname.clone(),
        }
    }

    /// Restarts the vehicle at a server-issued spawn.
    ///
    /// Progress made before placement is discarded: `distance` is taken from
    /// the snapshot as is. Contact and slope are recomputed on the next step.
    pub fn place(&mut self, spawn: &PlayerSnapshot) {
        self.x = spawn.x;
        self.y = spawn.y;
        self.vx = spawn.vx;
        self.vy = spawn.vy;
        self.distance = spawn.distance;
        self.color = spawn.color;
        self.nickname = spawn.nickname.clone();
        self.on_ground = false;
        self.angle = 0.0;
    }
}

/// The broadcast view of a player. Bookkeeping fields are left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub distance: f64,
    pub color: Color,
    pub nickname: String,
}
