use std::time::Duration;

use azalea_chat::FormattedText;
use serde::Deserialize;

use super::{
    Pinger, ProbeError, ProtocolError,
    legacy::legacy_status,
    login::probe_joinable,
    varint::write_varint,
};
use crate::{
    net::tcp::TimedStream,
    scanner::{response::PingResponse, targets::Endpoint},
};

/// Pings servers over real TCP connections.
#[derive(Clone, Copy, Debug, Default)]
pub struct Minecraft;

impl Pinger for Minecraft {
    async fn standard_status(
        &self,
        endpoint: &Endpoint,
        protocol_version: i32,
        timeout: Duration,
    ) -> Result<PingResponse, ProbeError> {
        standard_status(endpoint, protocol_version, timeout).await
    }

    async fn legacy_status(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<PingResponse, ProbeError> {
        legacy_status(endpoint, timeout).await
    }

    async fn probe_joinable(&self, endpoint: &Endpoint, timeout: Duration) -> bool {
        probe_joinable(endpoint, timeout).await
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum NextState {
    Status = 1,
    Login = 2,
}

/// Build a length-prefixed handshake packet. A protocol version of -1 means
/// we don't care which version the server runs.
pub fn build_handshake(
    protocol_version: i32,
    hostname: &str,
    port: u16,
    next_state: NextState,
) -> Vec<u8> {
    // buffer for the packet's id + data part
    let mut buffer = vec![
        // 0 for handshake packet
        0x00,
    ];

    write_varint(&mut buffer, protocol_version);

    // Some server implementations require hostname and port to be properly set (Notchian does not)
    write_varint(&mut buffer, hostname.len() as i32);
    buffer.extend_from_slice(hostname.as_bytes());
    buffer.extend_from_slice(&port.to_be_bytes());
    write_varint(&mut buffer, next_state as i32);

    let mut full_buffer = Vec::with_capacity(buffer.len() + 5);
    write_varint(&mut full_buffer, buffer.len() as i32);
    full_buffer.append(&mut buffer);
    full_buffer
}

/// Length 1, packet id 0 (status request), no body.
const STATUS_REQUEST: [u8; 2] = [0x01, 0x00];

/// Longest status json we accept, in bytes. The json is a protocol string, so
/// it's at most 32767 characters of up to 4 bytes each.
pub const MAX_STATUS_JSON_LENGTH: i32 = 32767 * 4;

/// Do a modern server list ping. The returned response reports the protocol
/// version we sent, not the one the server claims to support.
pub async fn standard_status(
    endpoint: &Endpoint,
    protocol_version: i32,
    timeout: Duration,
) -> Result<PingResponse, ProbeError> {
    let mut stream = TimedStream::connect(endpoint, timeout).await?;

    let mut request = build_handshake(
        protocol_version,
        &endpoint.host,
        endpoint.port,
        NextState::Status,
    );
    request.extend_from_slice(&STATUS_REQUEST);
    stream.write_all(&request).await?;

    let packet_length = stream.read_varint().await?;
    if packet_length < 2 {
        return Err(ProtocolError::MalformedLength(packet_length).into());
    }

    let packet_id = stream.read_u8().await?;
    if packet_id != 0x00 {
        return Err(ProtocolError::UnexpectedPacketId(packet_id.into()).into());
    }

    let json_length = stream.read_varint().await?;
    if !(0..=MAX_STATUS_JSON_LENGTH).contains(&json_length) {
        return Err(ProtocolError::MalformedLength(json_length).into());
    }
    let json = stream.read_exact(json_length as usize).await?;

    Ok(parse_status_json(&json, protocol_version)?)
}

#[derive(Deserialize)]
struct StatusJson {
    description: Option<serde_json::Value>,
    version: Option<VersionJson>,
    players: Option<PlayersJson>,
}

#[derive(Deserialize)]
struct VersionJson {
    name: String,
    protocol: i32,
}

#[derive(Deserialize)]
struct PlayersJson {
    online: i32,
    max: i32,
}

/// Parse the json body of a status response.
///
/// Missing `version` and `players` objects fall back to defaults, but if
/// they're present they must have all their fields.
pub fn parse_status_json(data: &[u8], protocol_version: i32) -> Result<PingResponse, ProtocolError> {
    let status: StatusJson = serde_json::from_slice(data)
        .map_err(|err| ProtocolError::MalformedJsonPayload(err.to_string()))?;

    // a description we can't make sense of is treated the same as a missing one
    let description = status
        .description
        .and_then(|description| FormattedText::deserialize(description).ok());

    let (version_name, reported_protocol) = match status.version {
        Some(version) => (version.name, Some(version.protocol)),
        None => ("Unknown".to_string(), None),
    };
    let (online_players, max_players) = status
        .players
        .map(|players| (players.online, players.max))
        .unwrap_or_default();

    Ok(PingResponse::standard(
        version_name,
        protocol_version,
        online_players,
        max_players,
        description,
        reported_protocol,
    ))
}
