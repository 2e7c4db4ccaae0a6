//! TCP transport for interactive Telnet sessions.

use std::io;
use std::time::Duration;

use log::{debug, trace};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::config::DeviceEndpoint;
use super::negotiation::TelnetNegotiator;
use crate::error::{Result, TransportError};

/// Size of the per-read scratch buffer.
const READ_CHUNK_SIZE: usize = 4096;

/// One raw stream connection to a device.
///
/// Holds exactly one OS-level socket, released on [`close`](Self::close)
/// or drop. All reads run through the Telnet negotiation filter, so the
/// bytes handed to callers are plain NVT text.
pub struct TcpTransport {
    stream: TcpStream,
    peer: String,
    negotiator: TelnetNegotiator,
}

impl TcpTransport {
    /// Connect to the endpoint within `timeout`.
    pub async fn connect(endpoint: &DeviceEndpoint, timeout: Duration) -> Result<Self> {
        let addr = endpoint.socket_addr();
        debug!("connecting to {}", addr);

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| TransportError::ConnectTimeout {
                host: endpoint.host.clone(),
                port: endpoint.port,
                timeout,
            })?
            .map_err(|e| {
                if e.kind() == io::ErrorKind::ConnectionRefused {
                    TransportError::ConnectionRefused {
                        host: endpoint.host.clone(),
                        port: endpoint.port,
                    }
                } else {
                    TransportError::ConnectionFailed {
                        host: endpoint.host.clone(),
                        port: endpoint.port,
                        source: e,
                    }
                }
            })?;

        // Interactive protocol: prompt fragments should not sit in Nagle's queue.
        let _ = stream.set_nodelay(true);

        Ok(Self {
            stream,
            peer: addr,
            negotiator: TelnetNegotiator::new(),
        })
    }

    /// Write raw bytes to the device.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.stream
            .write_all(data)
            .await
            .map_err(TransportError::Write)?;
        self.stream.flush().await.map_err(TransportError::Write)?;
        trace!("{}: sent {} bytes", self.peer, data.len());
        Ok(())
    }

    /// Write one text line, terminated with the NVT end-of-line (CR LF).
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        let mut bytes = Vec::with_capacity(line.len() + 2);
        bytes.extend_from_slice(line.as_bytes());
        bytes.extend_from_slice(b"\r\n");
        self.send(&bytes).await
    }

    /// Read one chunk of filtered data, waiting at most `timeout`.
    ///
    /// Negotiation refusals are written back transparently. A chunk that
    /// was entirely IAC traffic yields an empty vec, not an error; EOF
    /// yields [`TransportError::Disconnected`].
    pub async fn read_chunk(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let mut buf = [0u8; READ_CHUNK_SIZE];

        let n = tokio::time::timeout(timeout, self.stream.read(&mut buf))
            .await
            .map_err(|_| TransportError::ReadTimeout(timeout))?
            .map_err(TransportError::Read)?;

        if n == 0 {
            return Err(TransportError::Disconnected.into());
        }

        let (data, reply) = self.negotiator.absorb(&buf[..n]);
        if !reply.is_empty() {
            trace!("{}: refusing {} negotiation option(s)", self.peer, reply.len() / 3);
            self.stream
                .write_all(&reply)
                .await
                .map_err(TransportError::Write)?;
        }

        trace!("{}: read {} bytes ({} after filtering)", self.peer, n, data.len());
        Ok(data)
    }

    /// The peer address this transport is connected to.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Shut down the connection and release the socket.
    ///
    /// Consuming `self` makes double-close impossible; shutdown errors on
    /// an already-dead peer are ignored since the socket is released either
    /// way when the stream drops.
    pub async fn close(mut self) -> Result<()> {
        debug!("closing connection to {}", self.peer);
        let _ = self.stream.shutdown().await;
        Ok(())
    }
}
