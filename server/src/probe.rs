//! Raw status probe: connects straight to a game server, performs the
//! handshake + status request, and reassembles the fragmented response.

use shared::{decode_varint, handshake_packet, status_request_packet, StatusResponse,
             STATUS_PACKET_ID};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("could not resolve {0}")]
    Resolution(String),
    #[error("connection failed: {0}")]
    Connection(#[source] std::io::Error),
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed status response: {0}")]
    Protocol(String),
}

/// Incremental reassembly of the framed status response.
///
/// TCP delivers a byte stream, not messages, so the response may arrive
/// in any number of fragments. Bytes are only accumulated here; parsing
/// restarts from the front of the buffer on every attempt and never
/// consumes anything it cannot fully interpret yet.
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    buf: Vec<u8>,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Attempts to parse `[len][packet id][json len][json]` from the
    /// accumulated bytes. `Ok(None)` means keep reading.
    pub fn try_parse(&self) -> Result<Option<StatusResponse>, ProbeError> {
        let mut offset = 0;

        let Some((_total_len, n)) = decode_wire(&self.buf[offset..])? else {
            return Ok(None);
        };
        offset += n;

        let Some((packet_id, n)) = decode_wire(&self.buf[offset..])? else {
            return Ok(None);
        };
        if packet_id != STATUS_PACKET_ID {
            return Err(ProbeError::Protocol(format!(
                "unexpected packet id {}",
                packet_id
            )));
        }
        offset += n;

        let Some((json_len, n)) = decode_wire(&self.buf[offset..])? else {
            return Ok(None);
        };
        offset += n;

        let end = offset + json_len as usize;
        if self.buf.len() < end {
            return Ok(None);
        }

        let status = serde_json::from_slice(&self.buf[offset..end])
            .map_err(|e| ProbeError::Protocol(format!("invalid status JSON: {}", e)))?;
        Ok(Some(status))
    }
}

fn decode_wire(buf: &[u8]) -> Result<Option<(u32, usize)>, ProbeError> {
    decode_varint(buf).map_err(|e| ProbeError::Protocol(e.to_string()))
}

/// Queries a game server's live status with an overall deadline.
///
/// The connection is closed on every exit path: success and protocol
/// errors drop the stream here, and a timeout cancels the inner future,
/// dropping the stream with it.
pub async fn probe(
    host: &str,
    port: u16,
    deadline: Duration,
) -> Result<StatusResponse, ProbeError> {
    match timeout(deadline, probe_inner(host, port)).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout(deadline)),
    }
}

async fn probe_inner(host: &str, port: u16) -> Result<StatusResponse, ProbeError> {
    let target = format!("{}:{}", host, port);
    let addr = lookup_host(target.as_str())
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ProbeError::Resolution(target.clone()))?;

    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(ProbeError::Connection)?;

    stream
        .write_all(&handshake_packet(host, port))
        .await
        .map_err(ProbeError::Connection)?;
    stream
        .write_all(&status_request_packet())
        .await
        .map_err(ProbeError::Connection)?;

    let mut assembler = ResponseAssembler::new();
    let mut chunk = [0u8; 4096];
    loop {
        let read = stream.read(&mut chunk).await.map_err(ProbeError::Connection)?;
        if read == 0 {
            return Err(ProbeError::Protocol(
                "connection closed before full response".to_string(),
            ));
        }
        assembler.push(&chunk[..read]);
        if let Some(status) = assembler.try_parse()? {
            return Ok(status);
        }
    }
}
