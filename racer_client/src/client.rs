//! Client implementation.
//!
//! The client maintains:
//! - The local vehicle, stepped by physics once per frame
//! - A network link running on its own task (connect, send, receive)
//! - A shadow table of every player, written only by the link
//!
//! The frame loop never waits on the network: updates go out through a
//! bounded queue with `try_send`, and inbound state is read from the shadow
//! table. If the connection fails the client keeps driving offline.

use std::{sync::Arc, time::Instant};

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use racer_shared::{
    config::RacerConfig,
    net::{decode_server, encode_client, ClientId, ClientMsg, PlayerUpdate, UPDATE_HZ},
    physics::{ArcadePhysics, Controls, PhysicsBackend, VEHICLE_HEIGHT},
    player::{PlayerSnapshot, VehicleState},
    terrain::{TerrainParams, TerrainProfile},
};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::{input::build_update, rate::SendGate, shadow::ShadowTable};

/// Pending outbound updates. Older ones are worthless once a newer exists,
/// so a short queue is enough.
const OUTBOUND_QUEUE: usize = 8;

/// Where the client spawns before the server has placed it.
const LOCAL_SPAWN_X: f64 = 100.0;

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Never attempted.
    Offline,
    /// Handshake in progress.
    Connecting,
    /// Socket open.
    Connected,
    /// Connection failed or closed; the client keeps running without it.
    Disconnected,
}

/// Handle to the background network task.
pub struct NetLink {
    outbound: mpsc::Sender<PlayerUpdate>,
    state: Arc<Mutex<ClientState>>,
    task: JoinHandle<()>,
}

impl NetLink {
    /// Spawns the network task. Must be called inside a tokio runtime.
    pub fn spawn(url: String, shadow: Arc<ShadowTable>) -> Self {
        let (outbound, rx) = mpsc::channel(OUTBOUND_QUEUE);
        let state = Arc::new(Mutex::new(ClientState::Connecting));
        let task = tokio::spawn(run_link(url, shadow, rx, Arc::clone(&state)));
        Self {
            outbound,
            state,
            task,
        }
    }

    pub fn state(&self) -> ClientState {
        *self.state.lock()
    }

    /// Queues an update without waiting. Returns false if it was dropped.
    pub fn send(&self, update: PlayerUpdate) -> bool {
        match self.outbound.try_send(update) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Outbound queue full, dropping update");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

impl Drop for NetLink {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_link(
    url: String,
    shadow: Arc<ShadowTable>,
    mut outbound: mpsc::Receiver<PlayerUpdate>,
    state: Arc<Mutex<ClientState>>,
) {
    info!(server = %url, "Connecting to server");
    match pump(&url, &shadow, &mut outbound, &state).await {
        Ok(()) => info!("Disconnected from server"),
        Err(e) => warn!(error = %e, "Connection to server failed"),
    }
    *state.lock() = ClientState::Disconnected;
    shadow.clear_players();
}

/// Moves frames both ways until either side closes.
async fn pump(
    url: &str,
    shadow: &ShadowTable,
    outbound: &mut mpsc::Receiver<PlayerUpdate>,
    state: &Mutex<ClientState>,
) -> anyhow::Result<()> {
    let (ws, _) = connect_async(url).await.context("websocket connect")?;
    *state.lock() = ClientState::Connected;
    info!("Connected to server");

    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match decode_server(&text) {
                    Ok(msg) => shadow.apply(msg),
                    Err(e) => debug!(error = %e, "Dropping undecodable frame"),
                },
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("websocket read"),
            },
            update = outbound.recv() => match update {
                Some(update) => {
                    let text = encode_client(&ClientMsg::PlayerUpdate(update))?;
                    sink.send(Message::Text(text)).await.context("websocket send")?;
                }
                None => {
                    let _ = sink.close().await;
                    return Ok(());
                }
            },
        }
    }
}

/// High-level game client.
pub struct GameClient {
    pub vehicle: VehicleState,
    terrain: Arc<TerrainProfile>,
    physics: ArcadePhysics,
    gate: SendGate,
    shadow: Arc<ShadowTable>,
    link: Option<NetLink>,
    /// Overrides the server-assigned name when set.
    nickname: Option<String>,
    /// Whether the server's spawn has been taken over.
    placed: bool,
    frames: u64,
}

impl GameClient {
    /// A client with no network link, driving on the locally generated track.
    pub fn offline(cfg: &RacerConfig) -> Self {
        let terrain = Arc::new(TerrainParams::default().generate());
        let ground = terrain
            .height_at_index(LOCAL_SPAWN_X as usize)
            .map(f64::from)
            .unwrap_or_default();
        let nickname = cfg.nickname.clone();
        let vehicle = VehicleState::at_rest(
            ClientId(0),
            LOCAL_SPAWN_X,
            ground - VEHICLE_HEIGHT,
            [255, 255, 255],
            nickname.clone().unwrap_or_else(|| "Player".to_string()),
        );

        Self {
            vehicle,
            terrain,
            physics: ArcadePhysics::default(),
            gate: SendGate::new(UPDATE_HZ),
            shadow: Arc::new(ShadowTable::new()),
            link: None,
            nickname,
            placed: false,
            frames: 0,
        }
    }

    /// Starts the network link in the background and returns immediately.
    pub fn connect(cfg: &RacerConfig) -> Self {
        let mut client = Self::offline(cfg);
        client.link = Some(NetLink::spawn(
            cfg.server_url.clone(),
            Arc::clone(&client.shadow),
        ));
        client
    }

    pub fn state(&self) -> ClientState {
        self.link
            .as_ref()
            .map_or(ClientState::Offline, NetLink::state)
    }

    pub fn shadow(&self) -> &Arc<ShadowTable> {
        &self.shadow
    }

    pub fn terrain(&self) -> &Arc<TerrainProfile> {
        &self.terrain
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_placed(&self) -> bool {
        self.placed
    }

    /// Other players, as last reported by the server.
    pub fn remote_players(&self) -> Vec<(ClientId, PlayerSnapshot)> {
        self.shadow.remote_players()
    }

    /// Takes over the server's spawn once `init` has arrived.
    ///
    /// Runs once. After that the local vehicle is driven by physics only;
    /// later `game_state` entries for our own id are ignored.
    pub fn sync_from_server(&mut self) {
        if self.placed {
            return;
        }
        let Some(id) = self.shadow.my_id() else {
            return;
        };

        if let Some(terrain) = self.shadow.terrain() {
            if *terrain != *self.terrain {
                warn!("Server track differs from local generation, using server's");
            }
            self.terrain = terrain;
        }

        self.vehicle.id = id;
        if let Some(spawn) = self.shadow.player(id) {
            self.vehicle.place(&spawn);
        }
        if let Some(name) = &self.nickname {
            self.vehicle.nickname = name.clone();
        }
        self.placed = true;
        info!(
            client_id = %id,
            x = self.vehicle.x,
            nickname = %self.vehicle.nickname,
            "Placed by server"
        );
    }

    /// Advances one frame. Returns the update handed to the network, if the
    /// send gate was open.
    pub fn frame(&mut self, controls: Controls, now: Instant) -> Option<PlayerUpdate> {
        self.sync_from_server();
        self.physics.step(&mut self.vehicle, controls, &self.terrain);
        self.frames += 1;

        if !self.gate.ready(now) {
            return None;
        }
        let update = build_update(&self.vehicle);
        // Until placed, our state would overwrite the server's spawn.
        if let Some(link) = self.link.as_ref().filter(|_| self.placed) {
            link.send(update.clone());
        }
        Some(update)
    }
}
