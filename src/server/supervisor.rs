//! Session supervision.
//!
//! Decides how an accepted connection gets its own execution context. The
//! dispatcher only asks for a `Slot` before accepting and hands the session
//! future to it, so the fan-out strategy can change without touching the
//! handler.

use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

/// Concurrency strategy for sessions.
#[derive(Debug, Clone)]
pub enum Supervisor {
    /// One task per connection, no limit beyond the listen backlog.
    Unbounded,
    /// At most `limit` concurrent sessions; accepting pauses at the limit.
    Bounded { permits: Arc<Semaphore>, limit: usize },
}

impl Supervisor {
    pub fn new(max_sessions: Option<usize>) -> Self {
        match max_sessions {
            Some(limit) => Supervisor::Bounded {
                permits: Arc::new(Semaphore::new(limit)),
                limit,
            },
            None => Supervisor::Unbounded,
        }
    }

    /// Wait until another session may start.
    pub async fn reserve(&self) -> io::Result<Slot> {
        match self {
            Supervisor::Unbounded => Ok(Slot { permit: None }),
            Supervisor::Bounded { permits, .. } => {
                let permit = Arc::clone(permits)
                    .acquire_owned()
                    .await
                    .map_err(|_| io::Error::other("session limiter closed"))?;
                Ok(Slot {
                    permit: Some(permit),
                })
            }
        }
    }

    /// Sessions currently running, when bounded.
    pub fn active(&self) -> Option<usize> {
        match self {
            Supervisor::Unbounded => None,
            Supervisor::Bounded { permits, limit } => Some(limit - permits.available_permits()),
        }
    }
}

/// Permission to run one session. Released when the session ends.
#[derive(Debug)]
pub struct Slot {
    permit: Option<OwnedSemaphorePermit>,
}

impl Slot {
    /// Run `session` on its own task.
    pub fn spawn<F>(self, session: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = self.permit;
        tokio::spawn(async move {
            session.await;
            drop(permit);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_unbounded_always_reserves() {
        let supervisor = Supervisor::new(None);
        let a = supervisor.reserve().await.unwrap();
        let b = supervisor.reserve().await.unwrap();
        a.spawn(async {}).await.unwrap();
        b.spawn(async {}).await.unwrap();
        assert_eq!(supervisor.active(), None);
    }

    #[tokio::test]
    async fn test_bounded_waits_for_free_slot() {
        let supervisor = Supervisor::new(Some(1));

        let (release, released) = oneshot::channel::<()>();
        let first = supervisor.reserve().await.unwrap().spawn(async move {
            let _ = released.await;
        });
        assert_eq!(supervisor.active(), Some(1));

        let blocked = timeout(Duration::from_millis(50), supervisor.reserve()).await;
        assert!(blocked.is_err());

        release.send(()).unwrap();
        first.await.unwrap();

        let slot = timeout(Duration::from_secs(1), supervisor.reserve())
            .await
            .expect("slot should free up")
            .unwrap();
        assert_eq!(supervisor.active(), Some(1));
        drop(slot);
        assert_eq!(supervisor.active(), Some(0));
    }
}
