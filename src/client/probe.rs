//! Probe loop.
//!
//! One request is outstanding at a time. Each iteration walks
//!
//! ```text
//! Sending -> AwaitingReply -> Measured -> CadenceWait -> Sending
//! ```
//!
//! and any failure moves straight to `Terminated`. A missed reply ends the
//! whole session: the loop tracks the health of one continuous connection
//! rather than sampling independent probes.
//!
//! RTT comes from the local monotonic clock only. The timestamp in the
//! server's reply is used for a clock-offset diagnostic and nothing else.

use crate::client::connect::{Connection, Fill};
use crate::client::report::{Event, Reporter};
use crate::client::stats::SessionStats;
use crate::error::TransportError;
use crate::protocol::frame::CLIENT_LINE_CAPACITY;
use crate::protocol::{message, LineBuffer, Message};
use crate::runtime::{clock, CancelToken, WAIT_SLICE};
use bytes::{Bytes, BytesMut};
use std::time::{Duration, Instant};
use tracing::debug;

/// Loop parameters.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Stop after this many probes; `None` runs until cancelled.
    pub count: Option<u64>,
    /// Send-to-send period.
    pub interval: Duration,
    /// Reply deadline measured from the send; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

/// One request/reply exchange.
#[derive(Debug, Clone)]
pub struct ProbeRecord {
    /// 1-based.
    pub seq: u64,
    pub sent_at: Instant,
    /// `None` marks a lost probe.
    pub received_at: Option<Instant>,
    /// Server wall clock from the `PONG` line, microseconds.
    pub server_timestamp: Option<i64>,
}

impl ProbeRecord {
    fn lost(seq: u64, sent_at: Instant) -> Self {
        Self {
            seq,
            sent_at,
            received_at: None,
            server_timestamp: None,
        }
    }

    /// Round-trip time, if a reply arrived.
    pub fn rtt_us(&self) -> Option<u64> {
        self.received_at
            .map(|received_at| clock::micros_between(self.sent_at, received_at))
    }
}

/// Why the loop stopped.
#[derive(Debug)]
pub enum Termination {
    /// The configured probe count was reached.
    Completed,
    /// Cancellation was requested.
    Cancelled,
    /// The connection failed. An unanswered probe was counted as lost; a
    /// request that could not be written was not.
    Transport(TransportError),
}

/// Result of one session.
#[derive(Debug)]
pub struct SessionReport {
    pub stats: SessionStats,
    pub termination: Termination,
}

enum State {
    Sending,
    AwaitingReply {
        seq: u64,
        sent_at: Instant,
        sent_wall_us: i64,
    },
    Measured {
        record: ProbeRecord,
        sent_wall_us: i64,
    },
    CadenceWait {
        next_send: Instant,
    },
    Terminated(Termination),
}

/// Run probes over `conn` until the count is reached, cancellation is
/// requested, or the connection fails.
///
/// Takes ownership of the connection; it is closed when this returns.
pub fn run(
    mut conn: Connection,
    settings: &ProbeSettings,
    token: &CancelToken,
    reporter: &mut dyn Reporter,
) -> SessionReport {
    let mut stats = SessionStats::new();
    let mut inbound = LineBuffer::new(CLIENT_LINE_CAPACITY);
    let mut request = BytesMut::with_capacity(8);
    message::encode_ping(&mut request);

    let mut seq = 0u64;
    let mut state = State::Sending;

    let termination = loop {
        state = match state {
            State::Sending => {
                if token.is_cancelled() {
                    State::Terminated(Termination::Cancelled)
                } else {
                    discard_unsolicited(&mut inbound);
                    seq += 1;

                    let sent_at = Instant::now();
                    let sent_wall_us = clock::wall_clock_micros();
                    let send_deadline = settings.timeout.map(|limit| sent_at + limit);

                    match conn.send(&request, send_deadline, token) {
                        Ok(true) => State::AwaitingReply {
                            seq,
                            sent_at,
                            sent_wall_us,
                        },
                        Ok(false) => State::Terminated(Termination::Cancelled),
                        // Never reached the peer, so nothing was lost.
                        Err(e) => {
                            let error = TransportError::Send(e);
                            reporter.report(Event::SendFailed {
                                seq,
                                reason: error.to_string(),
                            });
                            State::Terminated(Termination::Transport(error))
                        }
                    }
                }
            }

            State::AwaitingReply {
                seq,
                sent_at,
                sent_wall_us,
            } => match await_reply(&mut conn, &mut inbound, sent_at, settings.timeout, token) {
                Ok(Some((frame, received_at))) => {
                    let server_timestamp = match Message::parse(&frame) {
                        Message::Pong { timestamp } => timestamp,
                        other => {
                            debug!(seq, reply = ?other, "Unexpected reply content");
                            None
                        }
                    };
                    State::Measured {
                        record: ProbeRecord {
                            seq,
                            sent_at,
                            received_at: Some(received_at),
                            server_timestamp,
                        },
                        sent_wall_us,
                    }
                }
                // Cancelled mid-wait: the probe is abandoned, not lost.
                Ok(None) => State::Terminated(Termination::Cancelled),
                Err(error) => {
                    lose(ProbeRecord::lost(seq, sent_at), &error, &mut stats, reporter);
                    State::Terminated(Termination::Transport(error))
                }
            },

            State::Measured {
                record,
                sent_wall_us,
            } => {
                let rtt_us = record.rtt_us().unwrap_or_default();
                stats.record_rtt(rtt_us);

                if let Some(server_us) = record.server_timestamp {
                    let half_rtt = i64::try_from(rtt_us / 2).unwrap_or(i64::MAX);
                    let midpoint = sent_wall_us.saturating_add(half_rtt);
                    debug!(
                        seq = record.seq,
                        offset_us = server_us.saturating_sub(midpoint),
                        "Estimated server clock offset"
                    );
                }

                let next_send = record.sent_at + settings.interval;
                let done = settings.count.is_some_and(|max| record.seq >= max);
                reporter.report(Event::Reply(record));

                if done {
                    State::Terminated(Termination::Completed)
                } else {
                    State::CadenceWait { next_send }
                }
            }

            State::CadenceWait { next_send } => {
                if token.sleep_until(next_send) {
                    State::Sending
                } else {
                    State::Terminated(Termination::Cancelled)
                }
            }

            State::Terminated(termination) => break termination,
        };
    };

    debug!(
        received = stats.received(),
        lost = stats.lost(),
        termination = ?termination,
        "Probe loop finished"
    );

    SessionReport { stats, termination }
}

fn lose(
    record: ProbeRecord,
    error: &TransportError,
    stats: &mut SessionStats,
    reporter: &mut dyn Reporter,
) {
    stats.record_loss();
    reporter.report(Event::Lost {
        record,
        reason: error.to_string(),
    });
}

/// Drop complete frames that arrived without a request in flight, so they
/// cannot be mistaken for the next reply.
fn discard_unsolicited(inbound: &mut LineBuffer) {
    while let Ok(Some(frame)) = inbound.next_frame() {
        debug!(frame = ?frame, "Discarding unsolicited frame");
    }
    inbound.compact();
}

/// Wait for one reply frame.
///
/// Returns `Ok(None)` if cancellation was observed first. Waits in slices of
/// at most `WAIT_SLICE` so cancellation is noticed promptly.
fn await_reply(
    conn: &mut Connection,
    inbound: &mut LineBuffer,
    sent_at: Instant,
    timeout: Option<Duration>,
    token: &CancelToken,
) -> Result<Option<(Bytes, Instant)>, TransportError> {
    let deadline = timeout.map(|limit| (sent_at + limit, limit));

    loop {
        match inbound.next_frame() {
            Ok(Some(frame)) => return Ok(Some((frame, Instant::now()))),
            Ok(None) => {}
            Err(overflow) => return Err(TransportError::FrameTooLarge(overflow.discarded)),
        }

        match conn.fill(inbound).map_err(TransportError::Receive)? {
            Fill::Data(_) => continue,
            Fill::Closed => return Err(TransportError::PeerClosed),
            Fill::Pending => {}
        }

        if token.is_cancelled() {
            return Ok(None);
        }

        let slice = match deadline {
            Some((deadline, limit)) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(TransportError::Timeout(limit));
                }
                (deadline - now).min(WAIT_SLICE)
            }
            None => WAIT_SLICE,
        };

        conn.wait_readable(slice).map_err(TransportError::Receive)?;
    }
}
