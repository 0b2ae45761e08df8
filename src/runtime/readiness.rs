//! Readiness waits for a single non-blocking stream.
//!
//! Readiness-based model: poll reports when the socket may be readable or
//! writable, the caller then reads or writes until `WouldBlock`. mio uses
//! epoll on Linux and kqueue on macOS. Notifications are edge-triggered, so
//! callers must try the operation before waiting again.

use mio::event::Event;
use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token};
use std::io;
use std::time::{Duration, Instant};

const STREAM_TOKEN: Token = Token(0);

/// Poll instance bound to one stream.
pub struct Readiness {
    poll: Poll,
    events: Events,
}

impl Readiness {
    /// Register `stream` for readable and writable notifications.
    pub fn register(stream: &mut TcpStream) -> io::Result<Self> {
        let poll = Poll::new()?;
        poll.registry().register(
            stream,
            STREAM_TOKEN,
            Interest::READABLE | Interest::WRITABLE,
        )?;
        Ok(Self {
            poll,
            events: Events::with_capacity(4),
        })
    }

    /// Block until the stream may be readable or `timeout` elapses.
    ///
    /// Returns `true` when a notification arrived (data, EOF, or error are
    /// all discovered by the following read). Signal interruption counts as
    /// a spurious wakeup.
    pub fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        self.wait(timeout, |event| {
            event.is_readable() || event.is_read_closed() || event.is_error()
        })
    }

    /// Block until the stream may be writable or `timeout` elapses.
    ///
    /// Also fires when a pending connect completes or fails.
    pub fn wait_writable(&mut self, timeout: Duration) -> io::Result<bool> {
        self.wait(timeout, |event| {
            event.is_writable() || event.is_write_closed() || event.is_error()
        })
    }

    fn wait(&mut self, timeout: Duration, ready: impl Fn(&Event) -> bool) -> io::Result<bool> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.poll.poll(&mut self.events, Some(remaining)) {
                Ok(()) => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => return Ok(false),
                Err(e) => return Err(e),
            }

            if self
                .events
                .iter()
                .any(|event| event.token() == STREAM_TOKEN && ready(event))
            {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
        }
    }

    /// Remove the stream's registration before it is closed.
    pub fn deregister(&self, stream: &mut TcpStream) -> io::Result<()> {
        self.poll.registry().deregister(stream)
    }
}
