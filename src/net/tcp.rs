use std::{future::Future, io, time::Duration};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time,
};

use crate::scanner::{
    protocols::{ProbeError, ProtocolError, varint::VarIntDecoder},
    targets::Endpoint,
};

/// A TCP connection where the connect and every individual read or write is
/// bounded by the same timeout. There's no deadline for the whole exchange.
///
/// The socket is closed when this is dropped.
pub struct TimedStream {
    stream: TcpStream,
    timeout: Duration,
}

impl TimedStream {
    pub async fn connect(endpoint: &Endpoint, timeout: Duration) -> Result<Self, ProbeError> {
        let stream = with_timeout(
            timeout,
            TcpStream::connect((endpoint.host.as_str(), endpoint.port)),
        )
        .await?;
        Ok(Self { stream, timeout })
    }

    pub async fn write_all(&mut self, data: &[u8]) -> Result<(), ProbeError> {
        with_timeout(self.timeout, self.stream.write_all(data)).await
    }

    pub async fn read_u8(&mut self) -> Result<u8, ProbeError> {
        with_timeout(self.timeout, self.stream.read_u8()).await
    }

    /// Big-endian signed short.
    pub async fn read_i16(&mut self) -> Result<i16, ProbeError> {
        with_timeout(self.timeout, self.stream.read_i16()).await
    }

    pub async fn read_varint(&mut self) -> Result<i32, ProbeError> {
        let mut decoder = VarIntDecoder::default();
        loop {
            let byte = self.read_u8().await?;
            if let Some(value) = decoder.push(byte)? {
                return Ok(value);
            }
        }
    }

    /// Read exactly `len` bytes, failing if the stream ends first. The buffer
    /// only grows as data arrives.
    pub async fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, ProbeError> {
        let mut data = Vec::new();
        let mut chunk = [0; 1024];
        while data.len() < len {
            let want = (len - data.len()).min(chunk.len());
            let n = with_timeout(self.timeout, self.stream.read(&mut chunk[..want])).await?;
            if n == 0 {
                return Err(ProtocolError::UnexpectedEndOfStream.into());
            }
            data.extend_from_slice(&chunk[..n]);
        }
        Ok(data)
    }

    /// Read until the other side closes the connection, giving up once more
    /// than `limit` bytes were received.
    pub async fn read_to_end(&mut self, limit: usize) -> Result<Vec<u8>, ProbeError> {
        let mut data = Vec::new();
        let mut chunk = [0; 1024];
        loop {
            let n = with_timeout(self.timeout, self.stream.read(&mut chunk)).await?;
            if n == 0 {
                return Ok(data);
            }
            if data.len() + n > limit {
                return Err(ProtocolError::PayloadTooLarge { limit }.into());
            }
            data.extend_from_slice(&chunk[..n]);
        }
    }
}

async fn with_timeout<T>(
    timeout: Duration,
    fut: impl Future<Output = io::Result<T>>,
) -> Result<T, ProbeError> {
    match time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
            Err(ProtocolError::UnexpectedEndOfStream.into())
        }
        Ok(Err(err)) => Err(ProbeError::Connection(err)),
        Err(_) => Err(ProbeError::Timeout),
    }
}
