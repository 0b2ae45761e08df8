//! Client events and their console rendering.
//!
//! The core emits `Event`s; a `Reporter` decides where they go. The console
//! reporter prints ping-style lines to stdout, tests collect them in a `Vec`.

use crate::client::probe::ProbeRecord;
use crate::client::resolver::{Family, Target};
use crate::client::stats::SessionStats;
use crate::runtime::clock::micros_to_millis;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::time::Duration;

/// Something the client wants the user to know.
#[derive(Debug, Clone)]
pub enum Event {
    Resolving { target: Target },
    Trying { addr: SocketAddr },
    Connected { peer: String, handshake_us: u64 },
    Started { interval: Duration },
    Reply(ProbeRecord),
    Lost { record: ProbeRecord, reason: String },
    /// The request could not be written; the session ends without a loss.
    SendFailed { seq: u64, reason: String },
    Finished { host: String, stats: SessionStats },
}

/// Sink for client events.
pub trait Reporter {
    fn report(&mut self, event: Event);
}

impl Reporter for Vec<Event> {
    fn report(&mut self, event: Event) {
        self.push(event);
    }
}

/// Prints events as ping-style text.
pub struct ConsoleReporter<W: Write> {
    out: W,
    peer_ip: String,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            peer_ip: String::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&mut self, event: &Event) -> io::Result<()> {
        match event {
            Event::Resolving { target } => {
                let only = match target.family {
                    Family::Auto => "",
                    Family::V4 => " (IPv4 only)",
                    Family::V6 => " (IPv6 only)",
                };
                writeln!(self.out, "Resolving {}{}...", target, only)
            }
            Event::Trying { addr } => {
                self.peer_ip = addr.ip().to_string();
                writeln!(self.out, "Trying {}...", self.peer_ip)
            }
            Event::Connected { peer, handshake_us } => writeln!(
                self.out,
                "Connected to {} (TCP handshake: {:.3} ms)",
                peer,
                micros_to_millis(*handshake_us)
            ),
            Event::Started { interval } => writeln!(
                self.out,
                "Starting long-connection ping (interval: {} s, press Ctrl+C to stop)...\n",
                interval.as_secs_f64()
            ),
            Event::Reply(record) => writeln!(
                self.out,
                "Reply from {}: seq={} time={:.3} ms",
                self.peer_ip,
                record.seq,
                micros_to_millis(record.rtt_us().unwrap_or_default())
            ),
            Event::Lost { record, reason } => {
                writeln!(self.out, "\n[!] seq={} lost: {}", record.seq, reason)
            }
            Event::SendFailed { seq, reason } => {
                writeln!(self.out, "\n[!] seq={} not sent: {}", seq, reason)
            }
            Event::Finished { host, stats } => match stats.summary() {
                Some(summary) => {
                    writeln!(self.out, "\n--- {} tcpping statistics ---", host)?;
                    writeln!(self.out, "{}", summary)
                }
                None => writeln!(self.out, "\nNo successful probes."),
            },
        }?;
        self.out.flush()
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn report(&mut self, event: Event) {
        // A closed stdout must not end the session.
        let _ = self.render(&event);
    }
}
