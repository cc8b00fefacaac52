use std::time::Duration;

use rand::Rng;
use tracing::trace;

use super::{
    NextState, ProbeError, ProtocolError, build_handshake,
    varint::write_varint,
};
use crate::{net::tcp::TimedStream, scanner::targets::Endpoint};

const USERNAME_LENGTH: usize = 8;

/// Start logging in to find servers that don't answer status requests.
///
/// Returns true if the server replied with a well-formed login packet with
/// id 0. That's usually a disconnect (we send protocol version -1), so this
/// only proves that something speaking the protocol is there, not that we'd
/// be allowed to join.
pub async fn probe_joinable(endpoint: &Endpoint, timeout: Duration) -> bool {
    match try_login(endpoint, timeout).await {
        Ok(()) => true,
        Err(err) => {
            trace!("login probe to {endpoint} failed: {err}");
            false
        }
    }
}

async fn try_login(endpoint: &Endpoint, timeout: Duration) -> Result<(), ProbeError> {
    let mut request = build_handshake(-1, &endpoint.host, endpoint.port, NextState::Login);
    request.extend(build_login_start(&random_username()));

    let mut stream = TimedStream::connect(endpoint, timeout).await?;
    stream.write_all(&request).await?;

    let packet_length = stream.read_varint().await?;
    if packet_length < 2 {
        return Err(ProtocolError::MalformedLength(packet_length).into());
    }
    let packet_id = stream.read_varint().await?;
    if packet_id != 0 {
        return Err(ProtocolError::UnexpectedPacketId(packet_id).into());
    }

    Ok(())
}

/// Length-prefixed login start packet with just a username.
pub fn build_login_start(username: &str) -> Vec<u8> {
    let mut buffer = vec![
        // login start
        0x00,
    ];
    write_varint(&mut buffer, username.len() as i32);
    buffer.extend_from_slice(username.as_bytes());

    let mut full_buffer = Vec::with_capacity(buffer.len() + 1);
    write_varint(&mut full_buffer, buffer.len() as i32);
    full_buffer.append(&mut buffer);
    full_buffer
}

fn random_username() -> String {
    let mut rng = rand::thread_rng();
    (0..USERNAME_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10)))
        .collect()
}
