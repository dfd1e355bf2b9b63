//! Vehicle physics.
//!
//! One call to [`PhysicsBackend::step`] is one frame. There is no fixed
//! wall-clock timestep: the simulation runs as fast as frames are produced.
//!
//! Grounded/airborne is not a stored phase; it is recomputed every tick from
//! the terrain contact test and only remembered in `on_ground`.

use crate::{player::VehicleState, terrain::TerrainProfile};

pub const ACCEL: f64 = 0.4;
pub const BRAKE: f64 = 0.3;
/// Velocity decay applied every tick.
pub const FRICTION: f64 = 0.98;
pub const MAX_SPEED: f64 = 12.0;
pub const GRAVITY: f64 = 0.5;
/// Upward impulse (y grows downward, so negative).
pub const JUMP_FORCE: f64 = -10.0;
pub const VEHICLE_HEIGHT: f64 = 30.0;

/// Physics parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsConfig {
    pub accel: f64,
    pub brake: f64,
    pub friction: f64,
    pub max_speed: f64,
    pub gravity: f64,
    pub jump_force: f64,
    pub vehicle_height: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            accel: ACCEL,
            brake: BRAKE,
            friction: FRICTION,
            max_speed: MAX_SPEED,
            gravity: GRAVITY,
            jump_force: JUMP_FORCE,
            vehicle_height: VEHICLE_HEIGHT,
        }
    }
}

/// Control inputs for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub accelerate: bool,
    pub brake: bool,
    pub jump: bool,
}

/// Physics stepper trait.
pub trait PhysicsBackend: Send + Sync {
    fn step(&self, vehicle: &mut VehicleState, controls: Controls, terrain: &TerrainProfile);
}

/// Arcade side-scroller physics: semi-implicit Euler with snap-to-ground.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArcadePhysics {
    pub cfg: PhysicsConfig,
}

impl PhysicsBackend for ArcadePhysics {
    fn step(&self, v: &mut VehicleState, controls: Controls, terrain: &TerrainProfile) {
        let cfg = &self.cfg;

        if controls.accelerate {
            v.vx += cfg.accel;
        }
        if controls.brake {
            v.vx -= cfg.brake;
        }
        v.vx *= cfg.friction;
        v.vx = v.vx.clamp(-cfg.max_speed, cfg.max_speed);

        v.vy += cfg.gravity;

        v.x += v.vx;
        v.y += v.vy;

        let jumped = controls.jump && v.on_ground;
        if jumped {
            v.vy = cfg.jump_force;
            v.on_ground = false;
        }

        v.x = terrain.clamp_x(v.x);
        match terrain.surface_at(v.x) {
            // The tick a jump fires must not be undone by this tick's contact.
            Some(ground) if !jumped && v.y + cfg.vehicle_height >= ground.height => {
                v.y = ground.height - cfg.vehicle_height;
                v.vy = 0.0;
                v.on_ground = true;
                v.angle = ground.angle_deg;
            }
            _ => v.on_ground = false,
        }

        v.record_progress(v.x);
    }
}
