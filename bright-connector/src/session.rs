//! Shared, replaceable handle to the live cluster session
//!
//! Exactly one session is active at a time. Refresh builds a new one off to
//! the side and swaps it in under the lock; readers only ever hold cloned
//! `Arc`s and see either the old session or the new one.

use crate::cluster::{ClusterSession, SessionFactory};
use crate::error::{ConnectorError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

pub type Shared<T> = Arc<Mutex<T>>;

struct Active {
    session: Arc<dyn ClusterSession>,
    generation: u64,
}

#[derive(Clone)]
pub struct SessionHandle {
    active: Shared<Active>,
}

impl SessionHandle {
    pub fn new(session: Arc<dyn ClusterSession>) -> Self {
        Self {
            active: Arc::new(Mutex::new(Active { session, generation: 0 })),
        }
    }

    /// Connect once and wrap the result; used at startup where failure is fatal
    pub async fn connect(factory: &dyn SessionFactory) -> Result<Self> {
        Ok(Self::new(factory.connect().await?))
    }

    pub fn current(&self) -> Arc<dyn ClusterSession> {
        self.active.lock().session.clone()
    }

    /// Number of successful swaps since construction
    pub fn generation(&self) -> u64 {
        self.active.lock().generation
    }

    /// Run `read` with the lock held. `read` must not block or await.
    pub fn snapshot<R>(&self, read: impl FnOnce(&Arc<dyn ClusterSession>) -> R) -> R {
        let active = self.active.lock();
        debug!("Session lock acquired (generation {})", active.generation);
        let result = read(&active.session);
        debug!("Session lock released");
        result
    }

    pub fn swap(&self, session: Arc<dyn ClusterSession>) -> u64 {
        let mut active = self.active.lock();
        active.session = session;
        active.generation += 1;
        active.generation
    }

    /// Build a brand-new session and swap it in.
    ///
    /// The budget is checked once the connect returns; an over-budget session
    /// is dropped and the active one stays in place.
    pub async fn refresh(&self, factory: &dyn SessionFactory, budget: Duration) -> Result<u64> {
        let started = Instant::now();

        let fresh = factory.connect().await?;

        if started.elapsed() > budget {
            return Err(ConnectorError::RefreshTimeout { budget });
        }

        let generation = self.swap(fresh);
        info!("Cluster session swapped (generation {})", generation);
        Ok(generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{MonitoringQuery, RawEntity};
    use crate::error::ClusterError;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct EmptySession;

    #[async_trait]
    impl ClusterSession for EmptySession {
        fn entities(&self) -> &[RawEntity] {
            &[]
        }
        async fn monitoring(&self, _: MonitoringQuery, _: &[i64], _: &[i64]) -> Result<Value, ClusterError> {
            Ok(Value::Null)
        }
        async fn power_status(&self, _: &[i64]) -> Result<Value, ClusterError> {
            Ok(Value::Null)
        }
        async fn device_status(&self, _: &[i64]) -> Result<Value, ClusterError> {
            Ok(Value::Null)
        }
    }

    struct SlowFactory {
        delay: Duration,
        connects: AtomicU32,
    }

    #[async_trait]
    impl SessionFactory for SlowFactory {
        async fn connect(&self) -> Result<Arc<dyn ClusterSession>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(Arc::new(EmptySession))
        }
    }

    struct BrokenFactory;

    #[async_trait]
    impl SessionFactory for BrokenFactory {
        async fn connect(&self) -> Result<Arc<dyn ClusterSession>> {
            Err(ConnectorError::Connection("PEM or KEY files are not defined or not exist".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_swaps_within_budget() {
        let handle = SessionHandle::new(Arc::new(EmptySession));
        let factory = SlowFactory { delay: Duration::from_secs(5), connects: AtomicU32::new(0) };

        let generation = handle.refresh(&factory, Duration::from_secs(60)).await.unwrap();
        assert_eq!(generation, 1);
        assert_eq!(handle.generation(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_over_budget_keeps_active_session() {
        let handle = SessionHandle::new(Arc::new(EmptySession));
        let before = handle.current();
        let factory = SlowFactory { delay: Duration::from_secs(120), connects: AtomicU32::new(0) };

        let err = handle.refresh(&factory, Duration::from_secs(60)).await.unwrap_err();
        assert!(matches!(err, ConnectorError::RefreshTimeout { .. }));
        assert_eq!(handle.generation(), 0);
        assert!(Arc::ptr_eq(&before, &handle.current()));
        assert_eq!(factory.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_connect_keeps_active_session() {
        let handle = SessionHandle::new(Arc::new(EmptySession));
        let err = handle.refresh(&BrokenFactory, Duration::from_secs(60)).await.unwrap_err();
        assert!(matches!(err, ConnectorError::Connection(_)));
        assert_eq!(handle.generation(), 0);
    }

    #[test]
    fn test_clones_share_the_same_slot() {
        let handle = SessionHandle::new(Arc::new(EmptySession));
        let reader = handle.clone();
        handle.swap(Arc::new(EmptySession));
        assert_eq!(reader.generation(), 1);
        assert_eq!(reader.snapshot(|s| s.entities().len()), 0);
    }
}
