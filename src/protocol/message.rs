//! Request and reply messages.

use bytes::BytesMut;

/// Request keyword.
pub const PING: &[u8] = b"PING";

/// Reply keyword.
pub const PONG: &[u8] = b"PONG";

/// A decoded frame, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Probe request.
    Ping,
    /// Probe reply. `timestamp` is the server's wall clock in microseconds,
    /// when present and numeric.
    Pong { timestamp: Option<i64> },
    /// Anything else. Servers ignore it; clients still count it as a reply.
    Unknown,
}

impl Message {
    /// Classify a frame (delimiter already stripped).
    ///
    /// Keywords are matched exactly; `ping` is not a request.
    pub fn parse(frame: &[u8]) -> Message {
        if frame == PING {
            return Message::Ping;
        }

        if frame == PONG {
            return Message::Pong { timestamp: None };
        }

        match frame.strip_prefix(b"PONG ") {
            Some(rest) => {
                let timestamp = std::str::from_utf8(rest)
                    .ok()
                    .and_then(|s| s.trim().parse::<i64>().ok());
                Message::Pong { timestamp }
            }
            None => Message::Unknown,
        }
    }
}

/// Append a `PING\n` request.
pub fn encode_ping(out: &mut BytesMut) {
    out.extend_from_slice(PING);
    out.extend_from_slice(b"\n");
}

/// Append a `PONG <timestamp>\n` reply.
pub fn encode_pong(timestamp_us: i64, out: &mut BytesMut) {
    out.extend_from_slice(PONG);
    out.extend_from_slice(b" ");
    out.extend_from_slice(timestamp_us.to_string().as_bytes());
    out.extend_from_slice(b"\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ping() {
        assert_eq!(Message::parse(b"PING"), Message::Ping);
        assert_eq!(Message::parse(b"ping"), Message::Unknown);
        assert_eq!(Message::parse(b"PING extra"), Message::Unknown);
    }

    #[test]
    fn test_parse_pong() {
        assert_eq!(
            Message::parse(b"PONG 1700000000123456"),
            Message::Pong {
                timestamp: Some(1_700_000_000_123_456)
            }
        );
        assert_eq!(Message::parse(b"PONG"), Message::Pong { timestamp: None });
        assert_eq!(
            Message::parse(b"PONG soon"),
            Message::Pong { timestamp: None }
        );
    }

    #[test]
    fn test_encode() {
        let mut out = BytesMut::new();
        encode_ping(&mut out);
        encode_pong(42, &mut out);
        assert_eq!(&out[..], b"PING\nPONG 42\n");
    }
}
