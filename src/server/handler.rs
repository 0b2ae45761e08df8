//! Per-connection session.
//!
//! Reads lines, answers every `PING` with `PONG <timestamp>`. Anything else
//! is silently ignored. Every complete line in a read is answered before the
//! next read, so pipelined requests are served in order.

use crate::protocol::frame::SERVER_LINE_CAPACITY;
use crate::protocol::{message, LineBuffer, Message};
use crate::runtime::clock;
use crate::runtime::socket::peer_label;
use bytes::BytesMut;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Bytes requested from the socket per read.
const READ_CHUNK: usize = 512;

/// One client session over any byte stream.
pub struct Session<S> {
    stream: S,
    peer: String,
    inbound: LineBuffer,
    outbound: BytesMut,
    clock: fn() -> i64,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: String) -> Self {
        Self::with_capacity(stream, peer, SERVER_LINE_CAPACITY)
    }

    pub fn with_capacity(stream: S, peer: String, capacity: usize) -> Self {
        Self {
            stream,
            peer,
            inbound: LineBuffer::new(capacity),
            outbound: BytesMut::with_capacity(64),
            clock: clock::wall_clock_micros,
        }
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Serve until the peer closes or an I/O error occurs.
    ///
    /// The stream is dropped (closed) on return.
    pub async fn run(mut self) -> io::Result<()> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                trace!(peer = %self.peer, "Connection closed by client");
                return Ok(());
            }

            self.inbound.extend(&chunk[..n]);
            self.answer_buffered();

            if !self.outbound.is_empty() {
                self.stream.write_all(&self.outbound).await?;
                self.outbound.clear();
            }
        }
    }

    fn answer_buffered(&mut self) {
        loop {
            match self.inbound.next_frame() {
                Ok(Some(frame)) => match Message::parse(&frame) {
                    Message::Ping => message::encode_pong((self.clock)(), &mut self.outbound),
                    _ => trace!(peer = %self.peer, frame = ?frame, "Ignoring frame"),
                },
                Ok(None) => break,
                Err(overflow) => {
                    warn!(
                        peer = %self.peer,
                        discarded = overflow.discarded,
                        "Buffer overflow from client, clearing"
                    );
                }
            }
        }
        self.inbound.compact();
    }
}

/// Serve one accepted TCP connection to completion.
///
/// Errors end this session only; nothing is reported back to the listener.
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr) {
    let label = peer_label(&peer);
    info!(peer = %label, "Client connected");

    if let Err(e) = stream.set_nodelay(true) {
        debug!(peer = %label, error = %e, "Failed to set TCP_NODELAY");
    }

    if let Err(e) = Session::new(stream, label.clone()).run().await {
        debug!(peer = %label, error = %e, "Connection error");
    }

    info!(peer = %label, "Client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio_test::io::Builder;

    fn fixed_clock() -> i64 {
        42
    }

    #[tokio::test]
    async fn test_ping_gets_pong() {
        let mock = Builder::new().read(b"PING\n").write(b"PONG 42\n").build();
        Session::new(mock, "test".to_string())
            .with_clock(fixed_clock)
            .run()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_crlf_request() {
        let mock = Builder::new().read(b"PING\r\n").write(b"PONG 42\n").build();
        Session::new(mock, "test".to_string())
            .with_clock(fixed_clock)
            .run()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_request_split_across_reads() {
        let mock = Builder::new()
            .read(b"PI")
            .read(b"N")
            .read(b"G\n")
            .write(b"PONG 42\n")
            .build();
        Session::new(mock, "test".to_string())
            .with_clock(fixed_clock)
            .run()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_other_content_ignored() {
        // The mock fails the test on any unexpected write.
        let mock = Builder::new().read(b"HELLO\nping\nPING now\n\n").build();
        Session::new(mock, "test".to_string())
            .with_clock(fixed_clock)
            .run()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_overflow_then_valid_ping() {
        let mock = Builder::new()
            .read(&[b'A'; 100])
            .read(b"PING\n")
            .write(b"PONG 42\n")
            .build();
        Session::with_capacity(mock, "test".to_string(), 64)
            .with_clock(fixed_clock)
            .run()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_pipelined_pings_answered_in_order() {
        let (mut client, server) = tokio::io::duplex(1024);
        let session = tokio::spawn(Session::new(server, "test".to_string()).run());

        client.write_all(b"PING\nPING\nPING\n").await.unwrap();

        let mut replies = LineBuffer::new(256);
        let mut frames: Vec<Bytes> = Vec::new();
        let mut chunk = [0u8; 256];
        while frames.len() < 3 {
            let n = client.read(&mut chunk).await.unwrap();
            assert!(n > 0, "server closed early");
            replies.extend(&chunk[..n]);
            while let Ok(Some(frame)) = replies.next_frame() {
                frames.push(frame);
            }
        }

        let timestamps: Vec<i64> = frames
            .iter()
            .map(|frame| match Message::parse(frame) {
                Message::Pong {
                    timestamp: Some(ts),
                } => ts,
                other => panic!("unexpected reply: {:?}", other),
            })
            .collect();
        assert_eq!(timestamps.len(), 3);
        assert!(timestamps.windows(2).all(|pair| pair[0] <= pair[1]));

        drop(client);
        session.await.unwrap().unwrap();
    }
}
