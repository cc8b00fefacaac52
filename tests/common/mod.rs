#![allow(dead_code)]

use ngrokscan::scanner::{protocols::varint::write_varint, targets::Endpoint};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};

/// A fake server on localhost that answers each incoming connection with
/// the next canned reply, in order, and then hangs up.
pub struct MockServer {
    pub endpoint: Endpoint,
    /// Every request received, one per connection.
    pub requests: JoinHandle<Vec<Vec<u8>>>,
}

pub async fn serve(replies: Vec<Vec<u8>>) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let requests = tokio::spawn(async move {
        let mut requests = Vec::new();
        for reply in replies {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = vec![0; 1024];
            let n = stream.read(&mut request).await.unwrap_or(0);
            request.truncate(n);

            let _ = stream.write_all(&reply).await;
            let _ = stream.shutdown().await;
            // wait for the client to hang up so our close doesn't turn into a
            // reset before it read everything
            let mut rest = Vec::new();
            let _ = stream.read_to_end(&mut rest).await;
            request.extend(rest);
            requests.push(request);
        }
        requests
    });

    MockServer {
        endpoint: Endpoint::new("127.0.0.1", port),
        requests,
    }
}

/// An endpoint that refuses connections.
pub async fn closed_endpoint() -> Endpoint {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Endpoint::new("127.0.0.1", port)
}

/// A status response packet wrapping `json`.
pub fn status_reply(json: &str) -> Vec<u8> {
    let mut body = vec![0x00];
    write_varint(&mut body, json.len() as i32);
    body.extend_from_slice(json.as_bytes());

    let mut packet = Vec::new();
    write_varint(&mut packet, body.len() as i32);
    packet.extend(body);
    packet
}

/// A legacy kick packet carrying the given status fields.
pub fn legacy_reply(fields: &[&str]) -> Vec<u8> {
    let text = format!("§1\0{}", fields.join("\0"));
    let units = text.encode_utf16().collect::<Vec<_>>();

    let mut packet = vec![0xff];
    packet.extend_from_slice(&(units.len() as i16).to_be_bytes());
    for unit in units {
        packet.extend_from_slice(&unit.to_be_bytes());
    }
    packet
}

/// What a server sends when we try to log in with an unsupported version.
pub fn login_disconnect_reply() -> Vec<u8> {
    let reason = r#"{"text":"Outdated client!"}"#;
    let mut body = vec![0x00];
    write_varint(&mut body, reason.len() as i32);
    body.extend_from_slice(reason.as_bytes());

    let mut packet = Vec::new();
    write_varint(&mut packet, body.len() as i32);
    packet.extend(body);
    packet
}
