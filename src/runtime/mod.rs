//! Platform-neutral runtime primitives.
//!
//! Everything timing- or socket-option-specific lives here so the protocol
//! and probe state machine never touch the OS directly:
//! - `clock`: monotonic microsecond measurement and wall-clock timestamps
//! - `cancel`: cancellation token and sliced, cancellable sleep
//! - `readiness`: readable/writable waits with a timeout (mio, epoll/kqueue)
//! - `socket`: stream socket setup, non-blocking connect, dual-stack listener

pub mod cancel;
pub mod clock;
pub mod readiness;
pub mod socket;

pub use cancel::{CancelToken, WAIT_SLICE};
pub use readiness::Readiness;
