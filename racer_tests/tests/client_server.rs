//! Full socket-based integration tests for client <-> server communication.

use std::{sync::Arc, time::Duration};

use racer_client::{client::ClientState, GameClient};
use racer_server::{server::bind_ephemeral, GameServer};
use racer_shared::{
    config::RacerConfig,
    net::{PlayerUpdate, ServerMsg},
    physics::{Controls, VEHICLE_HEIGHT},
    terrain::TerrainParams,
};
use racer_tests::{init_tracing, ws_url, RawClient};

async fn start_server() -> anyhow::Result<(Arc<GameServer>, std::net::SocketAddr)> {
    init_tracing();
    let server = Arc::new(GameServer::new());
    let addr = bind_ephemeral(Arc::clone(&server)).await?;
    Ok((server, addr))
}

/// Join handshake: `init` first, then the others hear `player_joined`.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn join_handshake_over_websocket() -> anyhow::Result<()> {
    let (server, addr) = start_server().await?;

    let mut a = RawClient::connect(addr).await?;
    let a_id = match a.recv().await? {
        ServerMsg::Init(init) => {
            assert_eq!(init.terrain, TerrainParams::default().generate());
            assert_eq!(init.players.len(), 1);
            let me = &init.players[&init.your_id];
            assert_eq!(me.x, 100.0);
            init.your_id
        }
        other => anyhow::bail!("expected init, got {other:?}"),
    };

    let mut b = RawClient::connect(addr).await?;
    let b_id = match b.recv().await? {
        ServerMsg::Init(init) => {
            assert_eq!(init.players.len(), 2);
            assert!(init.players.contains_key(&a_id));
            init.your_id
        }
        other => anyhow::bail!("expected init, got {other:?}"),
    };

    match a.recv_event().await? {
        ServerMsg::PlayerJoined { id, player } => {
            assert_eq!(id, b_id);
            assert_eq!(player.x, 130.0);
            let ground = server
                .registry()
                .terrain()
                .height_at_index(130)
                .map(f64::from)
                .unwrap_or_default();
            assert_eq!(player.y, ground - VEHICLE_HEIGHT);
        }
        other => anyhow::bail!("expected player_joined, got {other:?}"),
    }
    Ok(())
}

/// Updates from one client reach the other through `game_state`.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn updates_fan_out_in_game_state() -> anyhow::Result<()> {
    let (_server, addr) = start_server().await?;

    let mut a = RawClient::connect(addr).await?;
    let ServerMsg::Init(init) = a.recv().await? else {
        anyhow::bail!("expected init");
    };
    let a_id = init.your_id;
    let mut b = RawClient::connect(addr).await?;
    b.recv().await?;

    a.send_update(PlayerUpdate {
        x: Some(640.0),
        distance: Some(640.0),
        nickname: Some("dune".into()),
        ..Default::default()
    })
    .await?;

    let msg = b
        .recv_state_where(|m| match m {
            ServerMsg::GameState { players } => {
                players.get(&a_id).is_some_and(|p| p.x == 640.0)
            }
            _ => false,
        })
        .await?;
    let ServerMsg::GameState { players } = msg else {
        unreachable!()
    };
    assert_eq!(players[&a_id].nickname, "dune");
    assert_eq!(players.len(), 2);
    Ok(())
}

/// A malformed field is ignored; the rest of the update still lands.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_field_does_not_drop_update() -> anyhow::Result<()> {
    let (server, addr) = start_server().await?;

    let mut a = RawClient::connect(addr).await?;
    let ServerMsg::Init(init) = a.recv().await? else {
        anyhow::bail!("expected init");
    };
    a.send_text(r#"{"event":"player_update","data":{"x":"abc","vx":4.5}}"#.into())
        .await?;
    a.send_text("not json at all".into()).await?;

    a.recv_state_where(|m| match m {
        ServerMsg::GameState { players } => {
            players.get(&init.your_id).is_some_and(|p| p.vx == 4.5)
        }
        _ => false,
    })
    .await?;
    let stored = server
        .registry()
        .get(init.your_id)
        .ok_or_else(|| anyhow::anyhow!("player missing"))?;
    assert_eq!(stored.x, 100.0);
    Ok(())
}

/// Disconnect removes the player and `player_left` is the next event.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disconnect_announces_player_left() -> anyhow::Result<()> {
    let (server, addr) = start_server().await?;

    let mut a = RawClient::connect(addr).await?;
    a.recv().await?;
    let mut b = RawClient::connect(addr).await?;
    let ServerMsg::Init(init_b) = b.recv().await? else {
        anyhow::bail!("expected init");
    };
    let b_id = init_b.your_id;
    match a.recv_event().await? {
        ServerMsg::PlayerJoined { id, .. } => assert_eq!(id, b_id),
        other => anyhow::bail!("expected player_joined, got {other:?}"),
    }

    b.close().await?;

    assert_eq!(a.recv_event().await?, ServerMsg::PlayerLeft { id: b_id });
    assert!(!server.registry().snapshot().contains_key(&b_id));

    // Later snapshots no longer list the departed player.
    let msg = a.recv_state_where(|_| true).await?;
    let ServerMsg::GameState { players } = msg else {
        unreachable!()
    };
    assert!(!players.contains_key(&b_id));
    Ok(())
}

/// The real client: placed by the server, sees a raw peer, uploads state.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn game_client_roundtrip() -> anyhow::Result<()> {
    let (server, addr) = start_server().await?;

    let mut peer = RawClient::connect(addr).await?;
    peer.recv().await?;

    let cfg = RacerConfig {
        server_url: ws_url(addr),
        nickname: Some("TestPlayer".into()),
        ..Default::default()
    };
    let mut client = GameClient::connect(&cfg);

    let controls = Controls {
        accelerate: true,
        ..Default::default()
    };
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut ticker = tokio::time::interval(Duration::from_millis(16));
    while !(client.is_placed() && client.remote_players().len() == 1 && client.frames() > 60) {
        anyhow::ensure!(
            tokio::time::Instant::now() < deadline,
            "client never synced (state {:?})",
            client.state()
        );
        ticker.tick().await;
        client.frame(controls, std::time::Instant::now());
    }
    assert_eq!(client.state(), ClientState::Connected);
    assert!(client.vehicle.x >= 130.0);

    let me = client.vehicle.id;
    let msg = peer
        .recv_state_where(|m| match m {
            ServerMsg::GameState { players } => players
                .get(&me)
                .is_some_and(|p| p.nickname == "TestPlayer" && p.x > 130.0),
            _ => false,
        })
        .await?;
    let ServerMsg::GameState { players } = msg else {
        unreachable!()
    };
    assert!(players[&me].distance >= 130.0);
    assert_eq!(server.registry().len(), 2);
    Ok(())
}
