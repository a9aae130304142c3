//! A single reusable browser session guarded by a mutex.
//!
//! The lock is held for the whole lease, so overlapping scrapes queue up
//! instead of navigating the same page concurrently.

use async_trait::async_trait;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use super::BrowserSession;
use crate::error::ScraperError;

/// Opens new browser sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: BrowserSession + 'static;

    async fn open(&self) -> Result<Self::Session, ScraperError>;
}

pub struct SessionPool<F: SessionFactory> {
    factory: F,
    slot: Mutex<Option<F::Session>>,
}

impl<F: SessionFactory> SessionPool<F> {
    #[must_use]
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            slot: Mutex::new(None),
        }
    }

    /// Exclusive access to the pooled session, opening one if the slot is
    /// empty.
    ///
    /// # Errors
    ///
    /// Propagates [`SessionFactory::open`] failures.
    pub async fn lease(&self) -> Result<MappedMutexGuard<'_, F::Session>, ScraperError> {
        let mut guard = self.slot.lock().await;
        if guard.is_none() {
            tracing::debug!("opening browser session");
            *guard = Some(self.factory.open().await?);
        }
        MutexGuard::try_map(guard, Option::as_mut)
            .map_err(|_| ScraperError::Browser("browser session slot is empty".to_owned()))
    }

    /// Close and drop the pooled session. The next lease opens a fresh one.
    pub async fn teardown(&self) {
        let session = self.slot.lock().await.take();
        if let Some(mut session) = session {
            if let Err(e) = session.close().await {
                tracing::warn!(error = %e, "failed to close browser session cleanly");
            }
        }
    }

    pub async fn is_open(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::testing::FakeSession;

    struct CountingFactory {
        opened: Arc<AtomicU32>,
    }

    #[async_trait]
    impl SessionFactory for CountingFactory {
        type Session = FakeSession;

        async fn open(&self) -> Result<FakeSession, ScraperError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(FakeSession::default())
        }
    }

    #[tokio::test]
    async fn reuses_session_until_teardown() {
        let opened = Arc::new(AtomicU32::new(0));
        let pool = SessionPool::new(CountingFactory {
            opened: Arc::clone(&opened),
        });

        drop(pool.lease().await.unwrap());
        drop(pool.lease().await.unwrap());
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        pool.teardown().await;
        assert!(!pool.is_open().await);
        drop(pool.lease().await.unwrap());
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn overlapping_leases_are_serialized() {
        let pool = Arc::new(SessionPool::new(CountingFactory {
            opened: Arc::new(AtomicU32::new(0)),
        }));
        let first = pool.lease().await.unwrap();
        let contender = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                let _lease = pool.lease().await.unwrap();
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(first);
        contender.await.unwrap();
    }
}
