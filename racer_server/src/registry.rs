//! Session registry.
//!
//! The authoritative table of connected players. Every read and write goes
//! through one mutex, so a snapshot never sees a half-applied update.
//!
//! The server does not simulate: a player's position is whatever their
//! client last reported, filtered through an [`UpdatePolicy`].

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use parking_lot::Mutex;
use racer_shared::{
    net::{ClientId, PlayerMap, PlayerUpdate},
    physics::VEHICLE_HEIGHT,
    player::{Color, VehicleState},
    terrain::TerrainProfile,
};
use rand::Rng;
use tracing::debug;

/// X of the first spawn slot.
pub const SPAWN_X: f64 = 100.0;
/// Horizontal gap between consecutive spawns.
pub const SPAWN_SPACING: f64 = 30.0;

/// Hook between an inbound update and the table.
///
/// Receives the stored state and the decoded update and returns what should
/// be merged. Stricter server-side checks plug in here without changing the
/// protocol.
pub trait UpdatePolicy: Send + Sync {
    fn admit(&self, current: &VehicleState, update: PlayerUpdate) -> PlayerUpdate;
}

/// Accepts whatever the client reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrustClient;

impl UpdatePolicy for TrustClient {
    fn admit(&self, _current: &VehicleState, update: PlayerUpdate) -> PlayerUpdate {
        update
    }
}

pub struct SessionRegistry {
    terrain: Arc<TerrainProfile>,
    policy: Box<dyn UpdatePolicy>,
    players: Mutex<HashMap<ClientId, VehicleState>>,
}

impl SessionRegistry {
    pub fn new(terrain: Arc<TerrainProfile>) -> Self {
        Self::with_policy(terrain, Box::new(TrustClient))
    }

    pub fn with_policy(terrain: Arc<TerrainProfile>, policy: Box<dyn UpdatePolicy>) -> Self {
        Self {
            terrain,
            policy,
            players: Mutex::new(HashMap::new()),
        }
    }

    pub fn terrain(&self) -> &Arc<TerrainProfile> {
        &self.terrain
    }

    /// Creates and stores a fresh vehicle for `id`, replacing any existing
    /// entry.
    pub fn spawn(&self, id: ClientId) -> VehicleState {
        let mut players = self.players.lock();
        let state = self.fresh_vehicle(id, players.len());
        players.insert(id, state.clone());
        debug!(client_id = %id, x = state.x, y = state.y, "Spawned vehicle");
        state
    }

    /// Drops `id`. Absent ids are a no-op.
    pub fn remove(&self, id: ClientId) -> Option<VehicleState> {
        self.players.lock().remove(&id)
    }

    /// Merges a client update into the table.
    ///
    /// Unknown ids are spawned first. Fields the update leaves out keep their
    /// stored value, and `distance` only ever grows.
    pub fn apply_update(&self, id: ClientId, update: PlayerUpdate) -> VehicleState {
        let mut players = self.players.lock();
        let count = players.len();
        let state = players.entry(id).or_insert_with(|| {
            debug!(client_id = %id, "Update from unknown client, spawning");
            self.fresh_vehicle(id, count)
        });

        let update = self.policy.admit(state, update);
        if let Some(x) = update.x {
            state.x = x;
        }
        if let Some(y) = update.y {
            state.y = y;
        }
        if let Some(vx) = update.vx {
            state.vx = vx;
        }
        if let Some(vy) = update.vy {
            state.vy = vy;
        }
        if let Some(distance) = update.distance {
            state.record_progress(distance);
        }
        if let Some(nickname) = update.nickname {
            state.nickname = nickname;
        }
        if let Some(color) = update.color {
            state.color = color;
        }
        state.last_update = Utc::now();
        state.clone()
    }

    /// Public view of every player.
    pub fn snapshot(&self) -> PlayerMap {
        self.players
            .lock()
            .iter()
            .map(|(id, state)| (*id, state.snapshot()))
            .collect()
    }

    pub fn get(&self, id: ClientId) -> Option<VehicleState> {
        self.players.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.players.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.lock().is_empty()
    }

    fn fresh_vehicle(&self, id: ClientId, existing: usize) -> VehicleState {
        // Late joiners past the end of the track share its last segment.
        let x = self.terrain.clamp_x(SPAWN_X + existing as f64 * SPAWN_SPACING);
        let ground = self
            .terrain
            .height_at_index(x as usize)
            .map(f64::from)
            .unwrap_or_default();
        VehicleState::at_rest(
            id,
            x,
            ground - VEHICLE_HEIGHT,
            random_color(),
            format!("Player{}", existing + 1),
        )
    }
}

/// Each channel in `50..=255` so vehicles stay visible on the sky.
fn random_color() -> Color {
    let mut rng = rand::thread_rng();
    [
        rng.gen_range(50..=255),
        rng.gen_range(50..=255),
        rng.gen_range(50..=255),
    ]
}
