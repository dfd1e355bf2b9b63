//! Relay server.
//!
//! The server never simulates. It keeps the latest self-reported state of
//! every player in a [`SessionRegistry`] and:
//! - answers each new connection with `init` and tells the others
//!   `player_joined`,
//! - merges `player_update`s into the registry,
//! - announces `player_left` on disconnect,
//! - broadcasts a full `game_state` on a fixed timer.
//!
//! Delivery is best-effort. Each peer has a bounded outbound queue and the
//! server only ever `try_send`s into it, so a slow client loses messages
//! instead of stalling the broadcast loop or other clients.
//!
//! Lock order: `peers` before the registry's table.

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use racer_shared::{
    net::{
        decode_client, encode_server, hz_to_period, ClientId, ClientMsg, InitPayload, ServerMsg,
        BROADCAST_HZ,
    },
    terrain::{TerrainParams, TerrainProfile},
};
use tokio::{
    net::TcpListener,
    sync::mpsc::{self, error::TrySendError},
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::registry::SessionRegistry;

/// Outbound queue depth per peer.
pub const PEER_QUEUE: usize = 64;

/// Plain-text response for `GET /`.
pub const INDEX_BANNER: &str = "Hill Climb Racing server running.";

/// Messages are shared between recipients instead of cloned per peer.
pub type Outbound = Arc<ServerMsg>;

/// Game server.
pub struct GameServer {
    registry: SessionRegistry,
    peers: Mutex<HashMap<ClientId, mpsc::Sender<Outbound>>>,
}

impl GameServer {
    /// Creates a server around the default track.
    pub fn new() -> Self {
        Self::with_terrain(TerrainParams::default().generate())
    }

    pub fn with_terrain(terrain: TerrainProfile) -> Self {
        Self::with_registry(SessionRegistry::new(Arc::new(terrain)))
    }

    pub fn with_registry(registry: SessionRegistry) -> Self {
        Self {
            registry,
            peers: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn peer_count(&self) -> usize {
        self.peers.lock().len()
    }

    /// Registers a new connection.
    ///
    /// The returned receiver already holds `init`; every other peer gets
    /// `player_joined`. Both happen under the peers lock, so no broadcast can
    /// reach the new client before its `init`.
    pub fn connect(&self) -> (ClientId, mpsc::Receiver<Outbound>) {
        let id = ClientId::new_unique();
        let (tx, rx) = mpsc::channel(PEER_QUEUE);

        let mut peers = self.peers.lock();
        let player = self.registry.spawn(id).snapshot();
        let init = ServerMsg::Init(InitPayload {
            your_id: id,
            terrain: (**self.registry.terrain()).clone(),
            players: self.registry.snapshot(),
        });
        deliver(id, &tx, Arc::new(init));

        let joined = Arc::new(ServerMsg::PlayerJoined { id, player });
        for (peer, peer_tx) in peers.iter() {
            deliver(*peer, peer_tx, Arc::clone(&joined));
        }
        peers.insert(id, tx);

        info!(client_id = %id, players = peers.len(), "Client connected");
        (id, rx)
    }

    /// Handles one decoded message from `id`.
    pub fn handle_message(&self, id: ClientId, msg: ClientMsg) {
        match msg {
            ClientMsg::PlayerUpdate(update) => {
                self.registry.apply_update(id, update);
            }
        }
    }

    /// Handles one raw text frame from `id`. Garbage is logged and dropped.
    pub fn handle_text(&self, id: ClientId, text: &str) {
        match decode_client(text) {
            Ok(msg) => self.handle_message(id, msg),
            Err(e) => debug!(client_id = %id, error = %e, "Dropping undecodable frame"),
        }
    }

    /// Forgets `id` and tells everyone else. Repeated calls are harmless.
    pub fn disconnect(&self, id: ClientId) {
        let mut peers = self.peers.lock();
        peers.remove(&id);
        if self.registry.remove(id).is_none() {
            return;
        }

        let left = Arc::new(ServerMsg::PlayerLeft { id });
        for (peer, peer_tx) in peers.iter() {
            deliver(*peer, peer_tx, Arc::clone(&left));
        }
        info!(client_id = %id, players = peers.len(), "Client disconnected");
    }

    /// Sends one `game_state` snapshot to every peer.
    pub fn broadcast_state(&self) {
        let peers = self.peers.lock();
        if peers.is_empty() {
            return;
        }
        let state = Arc::new(ServerMsg::GameState {
            players: self.registry.snapshot(),
        });
        for (peer, peer_tx) in peers.iter() {
            deliver(*peer, peer_tx, Arc::clone(&state));
        }
    }

    /// Broadcasts at `hz` forever.
    pub async fn run_broadcast_loop(self: Arc<Self>, hz: u32) {
        let mut ticker = tokio::time::interval(hz_to_period(hz));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.broadcast_state();
        }
    }

    /// HTTP routes: the index banner and the WebSocket endpoint.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/", get(index))
            .route("/ws", get(ws_upgrade))
            .with_state(self)
    }

    /// Serves HTTP/WebSocket on `listener` and runs the broadcast loop.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> anyhow::Result<()> {
        let broadcaster = tokio::spawn(Arc::clone(&self).run_broadcast_loop(BROADCAST_HZ));
        let result = axum::serve(listener, self.router())
            .await
            .context("http serve");
        broadcaster.abort();
        result
    }

    /// Drives one WebSocket connection until it closes.
    async fn handle_socket(self: Arc<Self>, socket: WebSocket) {
        let (id, mut outbound) = self.connect();
        let (mut sink, mut stream) = socket.split();

        let writer = tokio::spawn(async move {
            while let Some(msg) = outbound.recv().await {
                let text = match encode_server(&msg) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(client_id = %id, error = %e, "Failed to encode message");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    debug!(client_id = %id, error = %e, "Send failed, closing writer");
                    break;
                }
            }
        });

        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => self.handle_text(id, &text),
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(client_id = %id, error = %e, "WebSocket read error");
                    break;
                }
            }
        }

        self.disconnect(id);
        writer.abort();
    }
}

impl Default for GameServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Queues `msg` for one peer without waiting.
fn deliver(id: ClientId, tx: &mpsc::Sender<Outbound>, msg: Outbound) {
    match tx.try_send(msg) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            warn!(client_id = %id, "Outbound queue full, dropping message");
        }
        Err(TrySendError::Closed(_)) => {
            debug!(client_id = %id, "Outbound queue closed");
        }
    }
}

async fn index() -> &'static str {
    INDEX_BANNER
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(server): State<Arc<GameServer>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| server.handle_socket(socket))
}

/// Helper for tests: serve on an ephemeral localhost port.
pub async fn bind_ephemeral(server: Arc<GameServer>) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
        .await
        .context("tcp bind")?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = server.serve(listener).await {
            warn!(error = %e, "Server stopped");
        }
    });
    Ok(addr)
}
