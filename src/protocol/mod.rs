//! tcpping wire protocol.
//!
//! Newline-delimited ASCII over one persistent TCP connection:
//!
//! ```text
//! Request:  PING\n
//! Response: PONG <microseconds since the Unix epoch>\n
//! ```
//!
//! There is no version negotiation; each line is independent. A trailing
//! `\r` before the delimiter is tolerated on input.
//!
//! - `frame`: bounded line accumulator shared by client and server
//! - `message`: request/response encoding and recognition

pub mod frame;
pub mod message;

pub use frame::{LineBuffer, Overflow};
pub use message::Message;
