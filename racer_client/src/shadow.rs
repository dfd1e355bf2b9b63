//! Shadow player table.
//!
//! The client's read-only copy of the server's session table. Only the
//! network task writes it; the frame loop reads. A `game_state` swaps the
//! whole map in place rather than merging.

use std::sync::Arc;

use parking_lot::RwLock;
use racer_shared::{
    net::{ClientId, PlayerMap, ServerMsg},
    player::PlayerSnapshot,
    terrain::TerrainProfile,
};
use tracing::debug;

#[derive(Debug, Default)]
struct ShadowState {
    my_id: Option<ClientId>,
    terrain: Option<Arc<TerrainProfile>>,
    players: PlayerMap,
}

#[derive(Debug, Default)]
pub struct ShadowTable {
    state: RwLock<ShadowState>,
}

impl ShadowTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one server message.
    pub fn apply(&self, msg: ServerMsg) {
        let mut state = self.state.write();
        match msg {
            ServerMsg::Init(init) => {
                debug!(
                    client_id = %init.your_id,
                    players = init.players.len(),
                    terrain = init.terrain.len(),
                    "Init received"
                );
                state.my_id = Some(init.your_id);
                state.terrain = Some(Arc::new(init.terrain));
                state.players = init.players;
            }
            ServerMsg::PlayerJoined { id, player } => {
                state.players.insert(id, player);
            }
            ServerMsg::PlayerLeft { id } => {
                state.players.remove(&id);
            }
            ServerMsg::GameState { players } => {
                state.players = players;
            }
        }
    }

    /// Our server-assigned id, once `init` has arrived.
    pub fn my_id(&self) -> Option<ClientId> {
        self.state.read().my_id
    }

    /// The track shipped in `init`.
    pub fn terrain(&self) -> Option<Arc<TerrainProfile>> {
        self.state.read().terrain.clone()
    }

    pub fn player(&self, id: ClientId) -> Option<PlayerSnapshot> {
        self.state.read().players.get(&id).cloned()
    }

    /// Every player the server knows, ourselves included.
    pub fn players(&self) -> PlayerMap {
        self.state.read().players.clone()
    }

    /// Every player except ourselves.
    pub fn remote_players(&self) -> Vec<(ClientId, PlayerSnapshot)> {
        let state = self.state.read();
        state
            .players
            .iter()
            .filter(|(id, _)| Some(**id) != state.my_id)
            .map(|(id, p)| (*id, p.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().players.is_empty()
    }

    /// Forgets every player; used when the connection drops.
    pub fn clear_players(&self) {
        self.state.write().players.clear();
    }
}
