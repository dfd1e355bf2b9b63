//! Wire protocol.
//!
//! Every frame is a JSON text message tagged as
//! `{"event": "<name>", "data": {...}}`. Player maps are keyed by
//! [`ClientId`]; BTreeMap keeps their order stable on the wire.
//!
//! The protocol is full-state: `game_state` carries every player each time,
//! and `player_update` overwrites rather than diffs, so dropped or reordered
//! messages only cost freshness.

use std::{
    collections::BTreeMap,
    fmt,
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use anyhow::Context;
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize,
};
use serde_json::Value;

use crate::{
    player::{Color, PlayerSnapshot},
    terrain::TerrainProfile,
};

/// Server fan-out rate for `game_state`.
pub const BROADCAST_HZ: u32 = 30;
/// Client upload rate for `player_update`.
pub const UPDATE_HZ: u32 = 15;
/// Client simulation/render rate.
pub const FRAME_HZ: u32 = 60;

pub fn hz_to_period(hz: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(hz.max(1)))
}

static NEXT_CLIENT_ID: AtomicU32 = AtomicU32::new(1);

/// Identifies a connected client.
///
/// Serialized as a bare number. Decoding also accepts numeric strings, since
/// ids appear as JSON object keys in player maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ClientId(pub u32);

impl<'de> Deserialize<'de> for ClientId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = ClientId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a client id")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ClientId, E> {
                u32::try_from(v)
                    .map(ClientId)
                    .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ClientId, E> {
                u32::try_from(v)
                    .map(ClientId)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ClientId, E> {
                v.parse()
                    .map(ClientId)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        d.deserialize_any(IdVisitor)
    }
}

impl ClientId {
    pub fn new_unique() -> Self {
        ClientId(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type PlayerMap = BTreeMap<ClientId, PlayerSnapshot>;

/// Join handshake payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitPayload {
    pub your_id: ClientId,
    pub terrain: TerrainProfile,
    pub players: PlayerMap,
}

/// Server -> client messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once, to the joining client only.
    Init(InitPayload),
    /// Sent to everyone except the joining client.
    PlayerJoined { id: ClientId, player: PlayerSnapshot },
    PlayerLeft { id: ClientId },
    /// Fixed-rate full snapshot.
    GameState { players: PlayerMap },
}

/// Client -> server messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMsg {
    PlayerUpdate(PlayerUpdate),
}

/// A client's self-reported state. Every field is optional.
///
/// Decoding is lenient per field: a value that cannot be read as the right
/// type decodes to `None` instead of failing the whole message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlayerUpdate {
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub x: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub y: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub vx: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub vy: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub distance: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub nickname: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_color",
        skip_serializing_if = "Option::is_none"
    )]
    pub color: Option<Color>,
}

/// Accepts JSON numbers and numeric strings; anything else, or a non-finite
/// result, is `None`.
fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let parsed = match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(parsed.filter(|v| v.is_finite()))
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Exactly three integer channels in `0..=255`.
fn lenient_color<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Color>, D::Error> {
    let Value::Array(items) = Value::deserialize(d)? else {
        return Ok(None);
    };
    if items.len() != 3 {
        return Ok(None);
    }
    let mut color = [0u8; 3];
    for (slot, item) in color.iter_mut().zip(&items) {
        match item.as_u64().and_then(|c| u8::try_from(c).ok()) {
            Some(c) => *slot = c,
            None => return Ok(None),
        }
    }
    Ok(Some(color))
}

pub fn encode_server(msg: &ServerMsg) -> anyhow::Result<String> {
    serde_json::to_string(msg).context("serialize server msg")
}

pub fn decode_server(text: &str) -> anyhow::Result<ServerMsg> {
    serde_json::from_str(text).context("deserialize server msg")
}

pub fn encode_client(msg: &ClientMsg) -> anyhow::Result<String> {
    serde_json::to_string(msg).context("serialize client msg")
}

pub fn decode_client(text: &str) -> anyhow::Result<ClientMsg> {
    serde_json::from_str(text).context("deserialize client msg")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn snap(x: f64) -> PlayerSnapshot {
        PlayerSnapshot {
            x,
            y: 250.0,
            vx: 0.0,
            vy: 0.0,
            distance: x,
            color: [50, 60, 70],
            nickname: "Player1".into(),
        }
    }

    #[test]
    fn client_ids_are_unique() {
        let a = ClientId::new_unique();
        let b = ClientId::new_unique();
        assert_ne!(a, b);
    }

    #[test]
    fn client_id_accepts_numbers_and_numeric_strings() {
        assert_eq!(serde_json::from_str::<ClientId>("5").unwrap(), ClientId(5));
        assert_eq!(serde_json::from_str::<ClientId>("\"5\"").unwrap(), ClientId(5));
        assert!(serde_json::from_str::<ClientId>("-1").is_err());
    }

    #[test]
    fn player_map_decodes_when_data_precedes_event() {
        // json! sorts keys, so "data" is written before "event".
        let text =
            json!({"event": "game_state", "data": {"players": {"8": snap(1.0)}}}).to_string();
        assert!(text.starts_with(r#"{"data""#));
        let msg = decode_server(&text).unwrap();
        assert!(matches!(
            msg,
            ServerMsg::GameState { players } if players.contains_key(&ClientId(8))
        ));
    }

    #[test]
    fn server_msgs_use_event_envelope() {
        let msg = ServerMsg::PlayerLeft { id: ClientId(9) };
        let v: Value = serde_json::from_str(&encode_server(&msg).unwrap()).unwrap();
        assert_eq!(v, json!({"event": "player_left", "data": {"id": 9}}));
    }

    #[test]
    fn game_state_keys_players_by_id() {
        let mut players = PlayerMap::new();
        players.insert(ClientId(3), snap(100.0));
        players.insert(ClientId(12), snap(130.0));
        let text = encode_server(&ServerMsg::GameState { players }).unwrap();
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["event"], "game_state");
        assert_eq!(v["data"]["players"]["12"]["x"], 130.0);

        match decode_server(&text).unwrap() {
            ServerMsg::GameState { players } => {
                assert_eq!(players.len(), 2);
                assert_eq!(players[&ClientId(3)].x, 100.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn init_carries_terrain_pairs() {
        let init = ServerMsg::Init(InitPayload {
            your_id: ClientId(4),
            terrain: TerrainProfile::from_points(vec![(0, 380), (1, 383)]),
            players: PlayerMap::new(),
        });
        let v: Value = serde_json::from_str(&encode_server(&init).unwrap()).unwrap();
        assert_eq!(v["data"]["your_id"], 4);
        assert_eq!(v["data"]["terrain"], json!([[0, 380], [1, 383]]));
    }

    #[test]
    fn update_decodes_full_payload() {
        let text = json!({
            "event": "player_update",
            "data": {
                "x": 120.5, "y": 300, "vx": 1.5, "vy": -2,
                "distance": 121, "nickname": "zoom", "color": [255, 0, 10]
            }
        })
        .to_string();
        let ClientMsg::PlayerUpdate(u) = decode_client(&text).unwrap();
        assert_eq!(u.x, Some(120.5));
        assert_eq!(u.y, Some(300.0));
        assert_eq!(u.vy, Some(-2.0));
        assert_eq!(u.nickname.as_deref(), Some("zoom"));
        assert_eq!(u.color, Some([255, 0, 10]));
    }

    #[test]
    fn update_drops_only_malformed_fields() {
        let text = json!({
            "event": "player_update",
            "data": {
                "x": "fast", "y": "42.5", "vx": null, "vy": [1],
                "distance": 500, "nickname": 17, "color": [300, 0, 0]
            }
        })
        .to_string();
        let ClientMsg::PlayerUpdate(u) = decode_client(&text).unwrap();
        assert_eq!(u.x, None);
        assert_eq!(u.y, Some(42.5));
        assert_eq!(u.vx, None);
        assert_eq!(u.vy, None);
        assert_eq!(u.distance, Some(500.0));
        assert_eq!(u.nickname, None);
        assert_eq!(u.color, None);
    }

    #[test]
    fn update_rejects_non_finite_strings() {
        let text = r#"{"event":"player_update","data":{"x":"NaN","y":"inf"}}"#;
        let ClientMsg::PlayerUpdate(u) = decode_client(text).unwrap();
        assert_eq!(u.x, None);
        assert_eq!(u.y, None);
    }

    #[test]
    fn empty_update_is_valid() {
        let ClientMsg::PlayerUpdate(u) =
            decode_client(r#"{"event":"player_update","data":{}}"#).unwrap();
        assert_eq!(u, PlayerUpdate::default());
    }

    #[test]
    fn unknown_event_is_an_error() {
        assert!(decode_client(r#"{"event":"teleport","data":{}}"#).is_err());
        assert!(decode_client("not json").is_err());
    }
}
