//! Wire protocol.
//!
//! Every message travels as a 4-byte little-endian length followed by a
//! bincode payload. The payload is an [`Envelope`] carrying the message's wire
//! name, the sender's millisecond timestamp and the message body itself. The
//! wire name is checked against the decoded body so a payload claiming one
//! type but carrying another is rejected.

use crate::entity::{Crate, Keys, Party, Player, Projectile};
use crate::map::MapObject;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const HEADER_LEN: usize = 4;
/// Frames announcing a larger payload are skipped.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame of {0} bytes exceeds the size limit")]
    FrameTooLarge(usize),
    #[error("stream ended with {0} bytes of an unfinished frame")]
    Incomplete(usize),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("envelope says {declared} but carries {actual}")]
    TypeMismatch {
        declared: String,
        actual: &'static str,
    },
}

/// Messages that know their own wire name.
pub trait WireMessage {
    fn message_type(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Urgent,
    Game,
    Server,
    Pickup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientPacket {
    Login {
        username: String,
        r: u8,
        g: u8,
        b: u8,
        #[serde(rename = "selectedGun1")]
        selected_gun1: u32,
        #[serde(rename = "selectedGun2")]
        selected_gun2: u32,
    },
    Update {
        username: String,
        keys: Option<Keys>,
        t_x: f64,
        t_y: f64,
        chat_message: Option<String>,
    },
    EquipItem {
        #[serde(rename = "itemIndex")]
        item_index: i64,
    },
    GetPlayers,
    GetParties,
    GetMap,
    GetProjectiles,
    GetCrates,
    Ping {
        #[serde(rename = "clientTime")]
        client_time: u64,
    },
}

impl WireMessage for ClientPacket {
    fn message_type(&self) -> &'static str {
        match self {
            ClientPacket::Login { .. } => "login",
            ClientPacket::Update { .. } => "update",
            ClientPacket::EquipItem { .. } => "equip_item",
            ClientPacket::GetPlayers => "get_players",
            ClientPacket::GetParties => "get_parties",
            ClientPacket::GetMap => "get_map",
            ClientPacket::GetProjectiles => "get_projectiles",
            ClientPacket::GetCrates => "get_crates",
            ClientPacket::Ping { .. } => "ping",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerPacket {
    LoginSuccess {
        username: String,
        map: MapObject,
    },
    LoginFailed {
        message: String,
    },
    PlayerData {
        players: Vec<Player>,
    },
    ProjectileData {
        projectiles: Vec<Projectile>,
    },
    CrateData {
        crates: Vec<Crate>,
    },
    PartyData {
        parties: Vec<Party>,
    },
    MapData {
        map: MapObject,
    },
    NoticeMessage {
        message: String,
        message_type: NoticeKind,
    },
    Pong {
        #[serde(rename = "clientTime")]
        client_time: u64,
    },
    PlayerDestroyed,
}

impl ServerPacket {
    pub fn notice(message: impl Into<String>, kind: NoticeKind) -> Self {
        ServerPacket::NoticeMessage {
            message: message.into(),
            message_type: kind,
        }
    }
}

impl WireMessage for ServerPacket {
    fn message_type(&self) -> &'static str {
        match self {
            ServerPacket::LoginSuccess { .. } => "login_success",
            ServerPacket::LoginFailed { .. } => "login_failed",
            ServerPacket::PlayerData { .. } => "player_data",
            ServerPacket::ProjectileData { .. } => "projectile_data",
            ServerPacket::CrateData { .. } => "crate_data",
            ServerPacket::PartyData { .. } => "party_data",
            ServerPacket::MapData { .. } => "map_data",
            ServerPacket::NoticeMessage { .. } => "notice_message",
            ServerPacket::Pong { .. } => "pong",
            ServerPacket::PlayerDestroyed => "player_destroyed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(rename = "timeSent")]
    pub time_sent: u64,
    pub body: T,
}

/// Wraps a message in an envelope and prefixes it with its length.
pub fn encode_frame<T>(message: &T, time_sent: u64) -> Result<Bytes, ProtocolError>
where
    T: WireMessage + Serialize,
{
    let envelope = Envelope {
        message_type: message.message_type().to_string(),
        time_sent,
        body: message,
    };
    let payload = bincode::serialize(&envelope)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }

    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u32_le(payload.len() as u32);
    buf.extend_from_slice(&payload);
    Ok(buf.freeze())
}

/// Decodes a frame payload (without its length prefix).
pub fn decode_payload<T>(payload: &[u8]) -> Result<Envelope<T>, ProtocolError>
where
    T: WireMessage + DeserializeOwned,
{
    let envelope: Envelope<T> = bincode::deserialize(payload)?;
    let actual = envelope.body.message_type();
    if envelope.message_type != actual {
        return Err(ProtocolError::TypeMismatch {
            declared: envelope.message_type,
            actual,
        });
    }
    Ok(envelope)
}

/// Reassembles frames from an arbitrarily chunked byte stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
    /// Bytes of an oversized frame still to be discarded.
    skipping: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Returns the next complete payload, `Ok(None)` when more bytes are
    /// needed. An oversized frame yields one `FrameTooLarge` error and its
    /// bytes are then dropped as they arrive.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        if self.skipping > 0 {
            let n = self.skipping.min(self.buf.len());
            self.buf.advance(n);
            self.skipping -= n;
            if self.skipping > 0 {
                return Ok(None);
            }
        }

        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&self.buf[..HEADER_LEN]);
        let len = u32::from_le_bytes(header) as usize;

        if len > MAX_FRAME_LEN {
            self.buf.advance(HEADER_LEN);
            let n = len.min(self.buf.len());
            self.buf.advance(n);
            self.skipping = len - n;
            return Err(ProtocolError::FrameTooLarge(len));
        }

        if self.buf.len() < HEADER_LEN + len {
            return Ok(None);
        }

        self.buf.advance(HEADER_LEN);
        Ok(Some(self.buf.split_to(len).freeze()))
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Called at end of stream; leftover bytes are an unfinished frame.
    pub fn finish(&mut self) -> Result<(), ProtocolError> {
        let leftover = self.buf.len();
        self.buf.clear();
        if leftover > 0 && self.skipping == 0 {
            return Err(ProtocolError::Incomplete(leftover));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_of(frame: &Bytes) -> &[u8] {
        &frame[HEADER_LEN..]
    }

    #[test]
    fn test_frame_length_prefix_is_little_endian() {
        let frame = encode_frame(&ClientPacket::GetMap, 7).unwrap();
        let declared = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(declared, frame.len() - HEADER_LEN);
    }

    #[test]
    fn test_envelope_carries_type_and_timestamp() {
        let packet = ClientPacket::Ping { client_time: 1234 };
        let frame = encode_frame(&packet, 99).unwrap();
        let envelope: Envelope<ClientPacket> = decode_payload(payload_of(&frame)).unwrap();
        assert_eq!(envelope.message_type, "ping");
        assert_eq!(envelope.time_sent, 99);
        assert_eq!(envelope.body, packet);
    }

    #[test]
    fn test_login_packet_fields() {
        let packet = ClientPacket::Login {
            username: "pilot".into(),
            r: 10,
            g: 20,
            b: 30,
            selected_gun1: 0,
            selected_gun2: 2,
        };
        let frame = encode_frame(&packet, 0).unwrap();
        let envelope: Envelope<ClientPacket> = decode_payload(payload_of(&frame)).unwrap();
        match envelope.body {
            ClientPacket::Login {
                username,
                selected_gun2,
                ..
            } => {
                assert_eq!(username, "pilot");
                assert_eq!(selected_gun2, 2);
            }
            other => panic!("Wrong packet after decoding: {:?}", other),
        }
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let envelope = Envelope {
            message_type: "get_crates".to_string(),
            time_sent: 0,
            body: ClientPacket::GetPlayers,
        };
        let payload = bincode::serialize(&envelope).unwrap();
        let result = decode_payload::<ClientPacket>(&payload);
        assert!(matches!(
            result,
            Err(ProtocolError::TypeMismatch { actual: "get_players", .. })
        ));
    }

    #[test]
    fn test_garbage_payload_is_a_codec_error() {
        let result = decode_payload::<ServerPacket>(&[0xff, 0x01]);
        assert!(matches!(result, Err(ProtocolError::Codec(_))));
    }

    #[test]
    fn test_decoder_reassembles_split_frames() {
        let first = encode_frame(&ClientPacket::GetPlayers, 1).unwrap();
        let second = encode_frame(&ClientPacket::Ping { client_time: 5 }, 2).unwrap();
        let mut stream = first.to_vec();
        stream.extend_from_slice(&second);

        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for chunk in stream.chunks(3) {
            decoder.push(chunk);
            while let Some(frame) = decoder.next_frame().unwrap() {
                frames.push(frame);
            }
        }

        assert_eq!(frames.len(), 2);
        let decoded: Envelope<ClientPacket> = decode_payload(&frames[1]).unwrap();
        assert_eq!(decoded.body, ClientPacket::Ping { client_time: 5 });
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn test_decoder_waits_for_header() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&[1, 0]);
        assert!(decoder.next_frame().unwrap().is_none());
        assert!(matches!(decoder.finish(), Err(ProtocolError::Incomplete(2))));
    }

    #[test]
    fn test_decoder_skips_oversized_frame() {
        let oversized = (MAX_FRAME_LEN + 10) as u32;
        let mut decoder = FrameDecoder::new();
        decoder.push(&oversized.to_le_bytes());
        decoder.push(&[0u8; 6]);

        assert!(matches!(
            decoder.next_frame(),
            Err(ProtocolError::FrameTooLarge(n)) if n == MAX_FRAME_LEN + 10
        ));
        assert!(decoder.next_frame().unwrap().is_none());

        decoder.push(&vec![0u8; MAX_FRAME_LEN + 4]);
        let valid = encode_frame(&ClientPacket::GetCrates, 3).unwrap();
        decoder.push(&valid);

        let frame = decoder.next_frame().unwrap().unwrap();
        let decoded: Envelope<ClientPacket> = decode_payload(&frame).unwrap();
        assert_eq!(decoded.body, ClientPacket::GetCrates);
    }

    #[test]
    fn test_server_packet_names() {
        assert_eq!(ServerPacket::PlayerDestroyed.message_type(), "player_destroyed");
        assert_eq!(
            ServerPacket::notice("hi", NoticeKind::Pickup).message_type(),
            "notice_message"
        );
        assert_eq!(
            ServerPacket::Pong { client_time: 1 }.message_type(),
            "pong"
        );
    }

    #[test]
    fn test_map_snapshot_survives_the_wire() {
        let packet = ServerPacket::MapData {
            map: MapObject::new(),
        };
        let frame = encode_frame(&packet, 0).unwrap();
        let decoded: Envelope<ServerPacket> = decode_payload(payload_of(&frame)).unwrap();
        assert_eq!(decoded.body, packet);
    }
}
