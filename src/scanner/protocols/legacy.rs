use std::time::Duration;

use super::{ProbeError, ProtocolError};
use crate::{
    net::tcp::TimedStream,
    scanner::{response::PingResponse, targets::Endpoint},
};

/// Legacy (1.4 - 1.6) server list ping request.
const LEGACY_STATUS_REQUEST: [u8; 2] = [0xfe, 0x01];
/// Kick packet id, the status comes back as a disconnect reason.
const LEGACY_RESPONSE_ID: u8 = 0xff;
/// The payload starts with `§1\0`, which we skip. Counted in UTF-16 units.
const LEGACY_MARKER_UNITS: usize = 3;
/// The length field is a character count in an i16, so a well-behaved server
/// never sends more than this many payload bytes.
pub const MAX_LEGACY_PAYLOAD_LENGTH: usize = i16::MAX as usize * 2;

pub async fn legacy_status(endpoint: &Endpoint, timeout: Duration) -> Result<PingResponse, ProbeError> {
    let mut stream = TimedStream::connect(endpoint, timeout).await?;
    stream.write_all(&LEGACY_STATUS_REQUEST).await?;

    let packet_id = stream.read_u8().await?;
    if packet_id != LEGACY_RESPONSE_ID {
        return Err(ProtocolError::UnexpectedPacketId(packet_id.into()).into());
    }

    let length = stream.read_i16().await?;
    if length <= 0 {
        return Err(ProtocolError::MalformedLength(length as i32).into());
    }

    // the length is in characters and isn't reliable, so read until the
    // server hangs up instead
    let payload = stream.read_to_end(MAX_LEGACY_PAYLOAD_LENGTH).await?;
    Ok(decode_legacy_payload(&payload)?)
}

/// Decode the UTF-16BE body of a legacy kick packet into a response.
///
/// The fields after the marker are protocol, version name, motd, online
/// players and max players, separated by NULs.
pub fn decode_legacy_payload(payload: &[u8]) -> Result<PingResponse, ProtocolError> {
    let units = payload
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .skip(LEGACY_MARKER_UNITS);
    let text = char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect::<String>();

    let fields = text.split('\0').collect::<Vec<_>>();
    let &[protocol, version, motd, online, max, ..] = fields.as_slice() else {
        return Err(ProtocolError::MalformedLegacyPayload);
    };

    let parse = |field: &str| {
        field
            .parse::<i32>()
            .map_err(|_| ProtocolError::MalformedLegacyPayload)
    };

    Ok(PingResponse::legacy(
        version.to_string(),
        parse(protocol)?,
        parse(online)?,
        parse(max)?,
        motd.to_string(),
    ))
}
