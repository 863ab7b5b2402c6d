//! Connection lifecycle: handshake, self-connection suppression, and the
//! framed read/write loop over one TCP stream (`spec.md` §4.8).

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::errors::MeshError;
use crate::frame::{parse_frame, Frame};

/// Per-read deadline (`spec.md` §4.8, §5).
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);
/// Dial timeout (`spec.md` §5).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Ping cadence (`spec.md` §4.8).
pub const PING_INTERVAL: Duration = Duration::from_secs(10);

/// Exchange local addresses with the remote over `stream`: write
/// `local_address\n`, then read one line back. Returns the remote's
/// advertised address, or `MeshError::HandshakeSelf` if it equals ours —
/// the caller must close the connection without registering a peer.
pub async fn handshake<S>(stream: &mut S, local_address: &str) -> Result<String, MeshError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(&mut *stream);
    write_half
        .write_all(format!("{local_address}\n").as_bytes())
        .await?;
    write_half.flush().await?;

    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    let n = tokio::time::timeout(READ_TIMEOUT, reader.read_line(&mut line))
        .await
        .map_err(|_| MeshError::ReadTimeout)??;
    if n == 0 {
        return Err(MeshError::PeerUnreachable(
            "connection closed during handshake".into(),
        ));
    }
    let remote_address = line.trim_end_matches(['\r', '\n']).to_string();

    if remote_address == local_address {
        debug!(%remote_address, "self-connection suppressed");
        return Err(MeshError::HandshakeSelf);
    }
    Ok(remote_address)
}

/// Dial `address`, respecting [`CONNECT_TIMEOUT`].
pub async fn dial(address: &str) -> Result<TcpStream, MeshError> {
    tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
        .await
        .map_err(|_| MeshError::ConnectTimeout)?
        .map_err(MeshError::Io)
}

/// Outcome of one [`read_frame`] call. `Skipped` and `Closed` are distinct
/// so the read loop can tell "ignore this line and keep reading" apart
/// from "the peer hung up" (`spec.md` §4.8).
pub enum FrameEvent {
    Frame(Frame),
    /// A non-empty line this workspace could not parse. Already logged;
    /// the caller should continue its read loop.
    Skipped,
    /// The stream reached EOF.
    Closed,
}

/// Read one post-handshake frame, applying [`READ_TIMEOUT`]. Frames this
/// workspace cannot parse are logged and skipped rather than treated as
/// connection-fatal (`spec.md` §4.8: "anything else is logged and
/// ignored").
pub async fn read_frame<R>(reader: &mut BufReader<R>) -> Result<FrameEvent, MeshError>
where
    R: AsyncRead + Unpin,
{
    let mut line = String::new();
    let n = tokio::time::timeout(READ_TIMEOUT, reader.read_line(&mut line))
        .await
        .map_err(|_| MeshError::ReadTimeout)??;
    if n == 0 {
        return Ok(FrameEvent::Closed);
    }
    match parse_frame(&line) {
        Ok(frame) => Ok(FrameEvent::Frame(frame)),
        Err(e) => {
            warn!(%e, raw = %line.trim(), "ignoring unrecognized frame");
            Ok(FrameEvent::Skipped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn handshake_exchanges_addresses() {
        let (mut a, mut b) = duplex(1024);
        let (ra, rb) = tokio::join!(
            handshake(&mut a, "node-a:9876"),
            handshake(&mut b, "node-b:9876"),
        );
        assert_eq!(ra.unwrap(), "node-b:9876");
        assert_eq!(rb.unwrap(), "node-a:9876");
    }

    #[tokio::test]
    async fn handshake_detects_self_connection() {
        let (mut a, mut b) = duplex(1024);
        let (ra, rb) = tokio::join!(
            handshake(&mut a, "node-a:9876"),
            handshake(&mut b, "node-a:9876"),
        );
        assert!(matches!(ra, Err(MeshError::HandshakeSelf)));
        assert!(matches!(rb, Err(MeshError::HandshakeSelf)));
    }

    #[tokio::test]
    async fn unrecognized_frame_is_skipped_not_closed() {
        let (mut a, b) = duplex(1024);
        a.write_all(b"not a frame\n").await.unwrap();
        let mut reader = BufReader::new(b);
        let event = read_frame(&mut reader).await.unwrap();
        assert!(matches!(event, FrameEvent::Skipped));
    }

    #[tokio::test]
    async fn closed_stream_is_reported_distinctly_from_a_skip() {
        let (a, b) = duplex(1024);
        drop(a);
        let mut reader = BufReader::new(b);
        let event = read_frame(&mut reader).await.unwrap();
        assert!(matches!(event, FrameEvent::Closed));
    }
}
