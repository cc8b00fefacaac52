mod legacy;
mod login;
mod minecraft;
pub mod varint;

use std::{future::Future, io, time::Duration};

use thiserror::Error;

pub use legacy::{MAX_LEGACY_PAYLOAD_LENGTH, decode_legacy_payload, legacy_status};
pub use login::{build_login_start, probe_joinable};
pub use minecraft::{
    MAX_STATUS_JSON_LENGTH, Minecraft, NextState, build_handshake, parse_status_json,
    standard_status,
};

use super::{response::PingResponse, targets::Endpoint};

/// The server sent something that doesn't follow the server list ping
/// protocol.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("VarInt is too big")]
    VarIntTooLarge,
    #[error("illegal packet length: {0}")]
    MalformedLength(i32),
    #[error("illegal packet id: {0:#04x}")]
    UnexpectedPacketId(i32),
    #[error("end of stream reached")]
    UnexpectedEndOfStream,
    #[error("payload is bigger than {limit} bytes")]
    PayloadTooLarge { limit: usize },
    #[error("invalid legacy status response")]
    MalformedLegacyPayload,
    #[error("invalid status json: {0}")]
    MalformedJsonPayload(String),
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),
    #[error("timed out")]
    Timeout,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// Every step of the ping ladder failed. `last` is the error from the
    /// last step that produced one.
    #[error("all ping strategies failed")]
    PolicyExhausted {
        #[source]
        last: Option<Box<ProbeError>>,
    },
}

/// The three ways of talking to a server that the scanner can combine.
///
/// [`Minecraft`] does it over real sockets, tests swap in fakes.
pub trait Pinger: Send + Sync + 'static {
    fn standard_status(
        &self,
        endpoint: &Endpoint,
        protocol_version: i32,
        timeout: Duration,
    ) -> impl Future<Output = Result<PingResponse, ProbeError>> + Send;

    fn legacy_status(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> impl Future<Output = Result<PingResponse, ProbeError>> + Send;

    /// Never fails, any error means the server isn't joinable.
    fn probe_joinable(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> impl Future<Output = bool> + Send;
}
