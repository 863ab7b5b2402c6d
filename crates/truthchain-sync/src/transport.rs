//! Requester-side wire transport: dial, write one JSON request line, read
//! one JSON response line (`spec.md` §6).

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::errors::SyncError;
use crate::protocol::{SyncRequest, SyncResponse};

/// Dial `address`, send `request`, and return the peer's response,
/// enforcing `timeout` end-to-end.
pub async fn request_sync(
    address: &str,
    request: &SyncRequest,
    timeout: Duration,
) -> Result<SyncResponse, SyncError> {
    tokio::time::timeout(timeout, request_sync_inner(address, request))
        .await
        .map_err(|_| SyncError::Timeout)?
}

async fn request_sync_inner(
    address: &str,
    request: &SyncRequest,
) -> Result<SyncResponse, SyncError> {
    let mut stream = TcpStream::connect(address).await?;
    let mut line = serde_json::to_vec(request)?;
    line.push(b'\n');
    stream.write_all(&line).await?;
    stream.flush().await?;

    let mut reader = BufReader::new(stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line).await?;
    Ok(serde_json::from_str(&response_line)?)
}
