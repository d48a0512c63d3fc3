//! In-memory connection provider for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::core::{ConnectionProvider, Statement, SyncConnection};
use crate::error::{Result, SyncError};

type ExecuteFn = dyn Fn(&Statement) -> Result<u64> + Send + Sync;
type CountFn = dyn Fn(&Statement) -> Result<i64> + Send + Sync;

#[derive(Default)]
struct Recorder {
    executed: Mutex<Vec<Statement>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    closed: AtomicBool,
}

/// Answers `execute` and `query_count` from closures and records every
/// executed statement.
pub struct MockProvider {
    execute: Arc<ExecuteFn>,
    count: Arc<CountFn>,
    recorder: Arc<Recorder>,
    delay: Option<Duration>,
    fail_acquire: bool,
}

impl MockProvider {
    pub fn new<F>(execute: F) -> Self
    where
        F: Fn(&Statement) -> Result<u64> + Send + Sync + 'static,
    {
        Self {
            execute: Arc::new(execute),
            count: Arc::new(|_| Ok(1)),
            recorder: Arc::new(Recorder::default()),
            delay: None,
            fail_acquire: false,
        }
    }

    pub fn with_counts<F>(mut self, count: F) -> Self
    where
        F: Fn(&Statement) -> Result<i64> + Send + Sync + 'static,
    {
        self.count = Arc::new(count);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_acquire(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    pub fn executed(&self) -> Vec<Statement> {
        self.recorder
            .executed
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.recorder.peak.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.recorder.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionProvider for MockProvider {
    async fn acquire(&self) -> Result<Box<dyn SyncConnection>> {
        if self.fail_acquire {
            return Err(SyncError::pool("connection refused", "mock acquire"));
        }
        if self.is_closed() {
            return Err(SyncError::pool("pool is closed", "mock acquire"));
        }
        Ok(Box::new(MockConnection {
            execute: self.execute.clone(),
            count: self.count.clone(),
            recorder: self.recorder.clone(),
            delay: self.delay,
        }))
    }

    fn max_connections(&self) -> usize {
        usize::MAX
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }

    fn close(&self) {
        self.recorder.closed.store(true, Ordering::SeqCst);
    }
}

struct MockConnection {
    execute: Arc<ExecuteFn>,
    count: Arc<CountFn>,
    recorder: Arc<Recorder>,
    delay: Option<Duration>,
}

#[async_trait]
impl SyncConnection for MockConnection {
    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        if let Ok(mut executed) = self.recorder.executed.lock() {
            executed.push(statement.clone());
        }
        let now = self.recorder.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.recorder.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = (self.execute)(statement);
        self.recorder.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn query_count(&mut self, statement: &Statement) -> Result<i64> {
        (self.count)(statement)
    }
}
