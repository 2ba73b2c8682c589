//! Session bootstrap with bounded binary exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use super::backend::{Backend, BackendError, Dialer};

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// A session is already live; opening another would leak its pool.
    #[error("a session is already established")]
    AlreadyConnected,

    #[error("no session is established")]
    NoSession,

    #[error("failed to connect after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: BackendError,
    },
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Sleep between attempt n and n+1 is `backoff_unit * 2^n`.
    pub backoff_unit: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_unit: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Owns at most one live storage session.
pub struct RetryConnector {
    dialer: Arc<dyn Dialer>,
    policy: RetryPolicy,
    opening: Mutex<()>,
    session: RwLock<Option<Arc<dyn Backend>>>,
}

impl RetryConnector {
    pub fn new(dialer: Arc<dyn Dialer>, policy: RetryPolicy) -> Self {
        Self {
            dialer,
            policy,
            opening: Mutex::new(()),
            session: RwLock::new(None),
        }
    }

    /// Dials until a session is established or the attempt budget runs out.
    pub async fn open(&self) -> Result<(), ConnectError> {
        // Serializes concurrent opens so only one pool is ever built.
        let _opening = self.opening.lock().await;
        if self.session.read().await.is_some() {
            return Err(ConnectError::AlreadyConnected);
        }

        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = tokio::time::timeout(self.policy.attempt_timeout, self.dialer.dial())
                .await
                .unwrap_or(Err(BackendError::Timeout(self.policy.attempt_timeout)));

            match result {
                Ok(session) => {
                    *self.session.write().await = Some(session);
                    tracing::info!(attempt, "Storage session established");
                    return Ok(());
                }
                Err(e) if attempt >= attempts => {
                    tracing::error!(attempts, error = %e, "Giving up on storage connection");
                    return Err(ConnectError::Exhausted {
                        attempts,
                        source: e,
                    });
                }
                Err(e) => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        attempt,
                        error = %e,
                        "Storage not ready, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Releases the live session.
    pub async fn close(&self) -> Result<(), ConnectError> {
        let session = self
            .session
            .write()
            .await
            .take()
            .ok_or(ConnectError::NoSession)?;
        session.close().await;
        tracing::info!("Storage session closed");
        Ok(())
    }

    pub async fn session(&self) -> Result<Arc<dyn Backend>, ConnectError> {
        self.session
            .read()
            .await
            .clone()
            .ok_or(ConnectError::NoSession)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::store::memory::MemoryBackend;

    /// Fails the first `failures` dials, then hands out a memory session.
    struct FlakyDialer {
        failures: u32,
        dials: AtomicU32,
    }

    impl FlakyDialer {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                dials: AtomicU32::new(0),
            })
        }

        fn dials(&self) -> u32 {
            self.dials.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Dialer for FlakyDialer {
        async fn dial(&self) -> Result<Arc<dyn Backend>, BackendError> {
            let n = self.dials.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(BackendError::Connection(format!("refused #{}", n + 1)));
            }
            let session: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
            Ok(session)
        }
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_backoff_until_success() {
        let dialer = FlakyDialer::new(2);
        let connector = RetryConnector::new(dialer.clone(), RetryPolicy::default());

        let started = Instant::now();
        connector.open().await.unwrap();

        assert_eq!(dialer.dials(), 3);
        // 2s after the first failure, 4s after the second.
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(6) && waited < Duration::from_secs(7));
        assert!(connector.session().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_when_exhausted() {
        let dialer = FlakyDialer::new(u32::MAX);
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        let connector = RetryConnector::new(dialer.clone(), policy);

        match connector.open().await {
            Err(ConnectError::Exhausted { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert_eq!(source.to_string(), "connection error: refused #3");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(dialer.dials(), 3);
        assert!(matches!(
            connector.session().await,
            Err(ConnectError::NoSession)
        ));
    }

    #[tokio::test]
    async fn open_twice_is_rejected() {
        let dialer = FlakyDialer::new(0);
        let connector = RetryConnector::new(dialer.clone(), RetryPolicy::default());

        connector.open().await.unwrap();
        assert!(matches!(
            connector.open().await,
            Err(ConnectError::AlreadyConnected)
        ));
        assert_eq!(dialer.dials(), 1);
    }

    #[tokio::test]
    async fn close_requires_a_session() {
        let connector = RetryConnector::new(FlakyDialer::new(0), RetryPolicy::default());

        assert!(matches!(connector.close().await, Err(ConnectError::NoSession)));
        connector.open().await.unwrap();
        connector.close().await.unwrap();
        assert!(matches!(connector.close().await, Err(ConnectError::NoSession)));

        // A closed connector can be opened again.
        connector.open().await.unwrap();
    }
}
