//! Helpers shared by the socket-level integration tests.

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use racer_shared::net::{decode_server, encode_client, ClientMsg, PlayerUpdate, ServerMsg};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

/// How long a test waits for any single message.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(3);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

pub fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{addr}/ws")
}

/// A bare protocol client that exposes every message it receives.
pub struct RawClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl RawClient {
    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let (ws, _) = connect_async(ws_url(addr))
            .await
            .context("websocket connect")?;
        Ok(Self { ws })
    }

    /// Next protocol message, skipping control frames.
    pub async fn recv(&mut self) -> anyhow::Result<ServerMsg> {
        loop {
            let frame = tokio::time::timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .context("timed out waiting for message")?
                .context("socket closed")?
                .context("websocket read")?;
            if let Message::Text(text) = frame {
                return decode_server(&text);
            }
        }
    }

    /// Next message that is not a `game_state`.
    pub async fn recv_event(&mut self) -> anyhow::Result<ServerMsg> {
        loop {
            let msg = self.recv().await?;
            if !matches!(msg, ServerMsg::GameState { .. }) {
                return Ok(msg);
            }
        }
    }

    /// Waits for a `game_state` satisfying `pred`.
    pub async fn recv_state_where(
        &mut self,
        mut pred: impl FnMut(&ServerMsg) -> bool,
    ) -> anyhow::Result<ServerMsg> {
        loop {
            let msg = self.recv().await?;
            if matches!(msg, ServerMsg::GameState { .. }) && pred(&msg) {
                return Ok(msg);
            }
        }
    }

    pub async fn send_update(&mut self, update: PlayerUpdate) -> anyhow::Result<()> {
        let text = encode_client(&ClientMsg::PlayerUpdate(update))?;
        self.send_text(text).await
    }

    pub async fn send_text(&mut self, text: String) -> anyhow::Result<()> {
        self.ws
            .send(Message::Text(text))
            .await
            .context("websocket send")
    }

    pub async fn close(mut self) -> anyhow::Result<()> {
        self.ws.close(None).await.context("websocket close")
    }
}
