//! Cooperative cancellation.
//!
//! The token is set from the interrupt path and polled by the probe loop at
//! every suspension point. Every wait is cut into slices of at most
//! `WAIT_SLICE`, which bounds how long a cancellation can go unnoticed.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Longest uninterrupted wait anywhere in the client.
pub const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Sleep until `deadline` in `WAIT_SLICE` steps.
    ///
    /// Returns `false` if cancellation was observed before the deadline.
    pub fn sleep_until(&self, deadline: Instant) -> bool {
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(WAIT_SLICE));
        }
    }
}

/// Cancel `token` when the process receives an interrupt (Ctrl+C).
///
/// The signal is awaited on a dedicated thread with its own single-threaded
/// tokio runtime, leaving the caller's flow fully synchronous.
pub fn cancel_on_interrupt(token: CancelToken) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        debug!("Interrupt received, stopping");
                        token.cancel();
                    }
                    Err(e) => warn!(error = %e, "Failed to listen for interrupt"),
                }
            });
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_sleep_runs_to_completion() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert!(token.sleep_until(start + Duration::from_millis(250)));
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[test]
    fn test_sleep_interrupted_within_one_slice() {
        let token = CancelToken::new();
        let canceller = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            canceller.cancel();
        });

        let start = Instant::now();
        assert!(!token.sleep_until(start + Duration::from_secs(10)));
        let elapsed = start.elapsed();
        handle.join().unwrap();

        assert!(elapsed < Duration::from_millis(150) + WAIT_SLICE + Duration::from_millis(100));
    }
}
