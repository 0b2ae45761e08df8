//! Connection establishment and the client's session socket.
//!
//! Candidates are tried strictly in resolver order; the first successful
//! handshake wins. Sockets are non-blocking from the start and registered
//! for readiness, so the handshake and every later wait carry a deadline
//! and notice cancellation within one `WAIT_SLICE`.

use crate::client::report::{Event, Reporter};
use crate::client::resolver::Target;
use crate::error::Error;
use crate::protocol::LineBuffer;
use crate::runtime::clock;
use crate::runtime::socket::{self, peer_label};
use crate::runtime::{CancelToken, Readiness, WAIT_SLICE};
use mio::net::TcpStream;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::debug;

/// Bytes pulled from the socket per read call.
const READ_CHUNK: usize = 512;

/// Outcome of draining the socket into the inbound buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// This many bytes were appended.
    Data(usize),
    /// Nothing to read yet.
    Pending,
    /// The peer closed its side.
    Closed,
}

/// One established session socket. Closed when dropped.
pub struct Connection {
    stream: TcpStream,
    readiness: Readiness,
    peer: SocketAddr,
    handshake_us: u64,
}

impl Connection {
    /// Connect to `addr` and wait for the handshake.
    ///
    /// Returns `Ok(None)` if cancellation was observed first.
    fn open(
        addr: &SocketAddr,
        connect_timeout: Option<Duration>,
        token: &CancelToken,
    ) -> io::Result<Option<Self>> {
        let socket = socket::stream_socket(addr)?;

        let started = Instant::now();
        let mut stream = TcpStream::from_std(socket::start_connect(socket, addr)?);
        let readiness = Readiness::register(&mut stream)?;
        let mut conn = Self {
            stream,
            readiness,
            peer: *addr,
            handshake_us: 0,
        };

        let deadline = connect_timeout.map(|limit| started + limit);
        if !conn.await_handshake(deadline, token)? {
            return Ok(None);
        }
        conn.handshake_us = clock::micros_between(started, Instant::now());
        Ok(Some(conn))
    }

    fn await_handshake(&mut self, deadline: Option<Instant>, token: &CancelToken) -> io::Result<bool> {
        loop {
            if let Some(e) = self.stream.take_error()? {
                return Err(e);
            }
            match self.stream.peer_addr() {
                Ok(_) => return Ok(true),
                Err(ref e) if e.kind() == io::ErrorKind::NotConnected => {}
                Err(e) => return Err(e),
            }

            if token.is_cancelled() {
                return Ok(false);
            }
            let slice = slice_until(deadline)
                .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "connection timed out"))?;
            self.readiness.wait_writable(slice)?;
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// `[ip]:port` of the peer.
    pub fn peer_label(&self) -> String {
        peer_label(&self.peer)
    }

    /// Time from connect() to handshake completion.
    pub fn handshake_us(&self) -> u64 {
        self.handshake_us
    }

    /// Write all of `data`, waiting for send-buffer space as needed.
    ///
    /// Returns `Ok(false)` if cancellation was observed before everything was
    /// written. Gives up with `TimedOut` once `deadline` has passed.
    pub fn send(
        &mut self,
        mut data: &[u8],
        deadline: Option<Instant>,
        token: &CancelToken,
    ) -> io::Result<bool> {
        while !data.is_empty() {
            match self.stream.write(data) {
                Ok(0) => {
                    return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
                }
                Ok(n) => data = &data[n..],
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if token.is_cancelled() {
                        return Ok(false);
                    }
                    let slice = slice_until(deadline)
                        .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "send buffer full"))?;
                    self.readiness.wait_writable(slice)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    /// Read everything currently available into `inbound`.
    ///
    /// Stops early once a full line's worth of bytes arrived, so a peer that
    /// floods the socket cannot keep this call busy.
    pub fn fill(&mut self, inbound: &mut LineBuffer) -> io::Result<Fill> {
        let mut chunk = [0u8; READ_CHUNK];
        let mut total = 0;

        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) if total == 0 => return Ok(Fill::Closed),
                Ok(0) => return Ok(Fill::Data(total)),
                Ok(n) => {
                    inbound.extend(&chunk[..n]);
                    total += n;
                    if total >= inbound.capacity() {
                        return Ok(Fill::Data(total));
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(if total > 0 { Fill::Data(total) } else { Fill::Pending });
                }
                // Surface the error on the next call, after the bytes already
                // read have been decoded.
                Err(_) if total > 0 => return Ok(Fill::Data(total)),
                Err(e) => return Err(e),
            }
        }
    }

    /// Wait up to `timeout` for the socket to become readable.
    pub fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        self.readiness.wait_readable(timeout)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.readiness.deregister(&mut self.stream);
        debug!(peer = %self.peer, "Connection closed");
    }
}

/// Connect to the first candidate that accepts.
///
/// Each attempt opens a fresh socket with no-delay enabled; failed sockets
/// are closed before the next candidate is tried. Returns `Ok(None)` when
/// cancellation was requested before a connection was up.
pub fn establish(
    target: &Target,
    candidates: &[SocketAddr],
    connect_timeout: Option<Duration>,
    token: &CancelToken,
    reporter: &mut dyn Reporter,
) -> Result<Option<Connection>, Error> {
    let mut last = None;

    for addr in candidates {
        if token.is_cancelled() {
            return Ok(None);
        }
        reporter.report(Event::Trying { addr: *addr });

        match Connection::open(addr, connect_timeout, token) {
            Ok(Some(conn)) => {
                reporter.report(Event::Connected {
                    peer: conn.peer_label(),
                    handshake_us: conn.handshake_us(),
                });
                return Ok(Some(conn));
            }
            Ok(None) => {
                debug!(addr = %addr, "Connect attempt cancelled");
                return Ok(None);
            }
            Err(e) => {
                debug!(addr = %addr, error = %e, "Connect attempt failed");
                last = Some(e);
            }
        }
    }

    Err(Error::Connect {
        target: target.to_string(),
        last,
    })
}

/// Next wait slice before `deadline`, or `None` once it has passed.
fn slice_until(deadline: Option<Instant>) -> Option<Duration> {
    match deadline {
        Some(deadline) => {
            let now = Instant::now();
            (now < deadline).then(|| (deadline - now).min(WAIT_SLICE))
        }
        None => Some(WAIT_SLICE),
    }
}
