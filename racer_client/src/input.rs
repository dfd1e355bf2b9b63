//! Input handling.
//!
//! Real keyboard polling belongs to the renderer, which is not part of this
//! crate. Here input is already boiled down to per-frame [`Controls`], and
//! [`Autopilot`] produces them for headless runs.

use racer_shared::{net::PlayerUpdate, physics::Controls, player::VehicleState};

/// Scripted driver: full throttle, with a hop every `jump_every` frames.
#[derive(Debug, Clone, Copy)]
pub struct Autopilot {
    pub jump_every: u64,
}

impl Default for Autopilot {
    fn default() -> Self {
        Self { jump_every: 90 }
    }
}

impl Autopilot {
    pub fn controls(&self, frame: u64) -> Controls {
        Controls {
            accelerate: true,
            brake: false,
            jump: self.jump_every > 0 && frame % self.jump_every == self.jump_every - 1,
        }
    }
}

/// Turns the local vehicle into an outbound update carrying every field.
pub fn build_update(vehicle: &VehicleState) -> PlayerUpdate {
    PlayerUpdate {
        x: Some(vehicle.x),
        y: Some(vehicle.y),
        vx: Some(vehicle.vx),
        vy: Some(vehicle.vy),
        distance: Some(vehicle.distance),
        nickname: Some(vehicle.nickname.clone()),
        color: Some(vehicle.color),
    }
}
