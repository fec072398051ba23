use serde::Deserialize;
use thiserror::Error;

/// Protocol version sent in the status handshake (1.20.4).
pub const PROTOCOL_VERSION: u32 = 764;
/// Default port game servers answer status queries on.
pub const DEFAULT_STATUS_PORT: u16 = 25565;
/// Packet id shared by the handshake and status request packets.
pub const STATUS_PACKET_ID: u32 = 0x00;
/// Handshake next-state value selecting the status flow.
pub const NEXT_STATE_STATUS: u32 = 1;

/// Bedrock players bridged into a Java server carry UUIDs with this
/// all-zero prefix; everything else is a regular Java account UUID.
pub const BEDROCK_UUID_PREFIX: &str = "00000000-0000-0000-";

const VARINT_MAX_BYTES: usize = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("varint longer than {VARINT_MAX_BYTES} bytes")]
    VarIntTooLong,
    #[error("varint value does not fit in 32 bits")]
    VarIntOverflow,
}

/// Encodes a value as a protocol varint: 7 bits per byte, least
/// significant group first, high bit set on every byte but the last.
pub fn encode_varint(mut value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(VARINT_MAX_BYTES);
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
    out
}

/// Decodes a varint from the front of `buf`.
///
/// Returns `Ok(Some((value, bytes_consumed)))` on success and `Ok(None)`
/// when the buffer ends before a terminating byte — nothing is consumed,
/// so the caller can retry with more data. Malformed input (too many
/// continuation bytes, or a value exceeding 32 bits) is an error.
pub fn decode_varint(buf: &[u8]) -> Result<Option<(u32, usize)>, WireError> {
    let mut value: u64 = 0;
    for (i, &byte) in buf.iter().take(VARINT_MAX_BYTES).enumerate() {
        value |= ((byte & 0x7f) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            let value = u32::try_from(value).map_err(|_| WireError::VarIntOverflow)?;
            return Ok(Some((value, i + 1)));
        }
    }
    if buf.len() >= VARINT_MAX_BYTES {
        Err(WireError::VarIntTooLong)
    } else {
        Ok(None)
    }
}

/// Encodes a string as a varint-length-prefixed UTF-8 byte sequence.
pub fn encode_string(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = encode_varint(bytes.len() as u32);
    out.extend_from_slice(bytes);
    out
}

/// Prefixes a packet body with its varint-encoded length.
pub fn frame_packet(body: &[u8]) -> Vec<u8> {
    let mut out = encode_varint(body.len() as u32);
    out.extend_from_slice(body);
    out
}

/// Builds the framed handshake packet opening the status flow.
pub fn handshake_packet(hostname: &str, port: u16) -> Vec<u8> {
    let mut body = encode_varint(STATUS_PACKET_ID);
    body.extend_from_slice(&encode_varint(PROTOCOL_VERSION));
    body.extend_from_slice(&encode_string(hostname));
    body.extend_from_slice(&port.to_be_bytes());
    body.extend_from_slice(&encode_varint(NEXT_STATE_STATUS));
    frame_packet(&body)
}

/// Builds the framed status request packet (empty body).
pub fn status_request_packet() -> Vec<u8> {
    frame_packet(&encode_varint(STATUS_PACKET_ID))
}

/// Parsed JSON payload of a status response. Servers vary wildly in what
/// they include, so every field tolerates absence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub version: Option<StatusVersion>,
    #[serde(default)]
    pub players: Option<StatusPlayers>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusVersion {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub protocol: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusPlayers {
    #[serde(default)]
    pub online: Option<u32>,
    #[serde(default)]
    pub max: Option<u32>,
    #[serde(default)]
    pub sample: Vec<SamplePlayer>,
}

/// One entry of the status response's connected-player sample.
#[derive(Debug, Clone, Deserialize)]
pub struct SamplePlayer {
    pub id: String,
    pub name: String,
}

impl StatusResponse {
    /// Iterates the connected-player sample, if the server included one.
    pub fn sample(&self) -> impl Iterator<Item = &SamplePlayer> {
        self.players.iter().flat_map(|p| p.sample.iter())
    }
}

/// A player identifier classified by namespace. Bedrock identifiers are
/// spotted structurally by their sentinel UUID prefix; everything else is
/// treated as a Java account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlayerIdent {
    Java(String),
    Bedrock(String),
}

impl PlayerIdent {
    pub fn classify(raw: &str) -> Self {
        if raw.starts_with(BEDROCK_UUID_PREFIX) {
            PlayerIdent::Bedrock(raw.to_string())
        } else {
            PlayerIdent::Java(raw.to_string())
        }
    }

    /// The raw identifier string, regardless of namespace.
    pub fn as_str(&self) -> &str {
        match self {
            PlayerIdent::Java(id) | PlayerIdent::Bedrock(id) => id,
        }
    }

    /// Decodes the XUID packed into the tail of a Bedrock identifier.
    /// Returns `None` for Java identifiers or an undecodable tail.
    pub fn xuid(&self) -> Option<u64> {
        let PlayerIdent::Bedrock(id) = self else {
            return None;
        };
        let tail: String = id
            .strip_prefix(BEDROCK_UUID_PREFIX)?
            .chars()
            .filter(|c| *c != '-')
            .collect();
        if tail.len() != 16 {
            return None;
        }
        u64::from_str_radix(&tail, 16).ok()
    }
}
