//! Per-call context carrying a deadline and a cancellation signal.
//!
//! Store calls go through [`RequestContext::run`], which races the store
//! future against both. Losing the race only drops the future on our side; a
//! statement already sent keeps running on the server. Writes therefore run
//! inside a transaction bounded by `statement_timeout` and are committed only
//! after [`RequestContext::check`] passes. A dropped transaction is rolled
//! back when its connection goes back to the pool.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<(Instant, Duration)>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Owner side of a cancellable context.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

impl RequestContext {
    /// No deadline, never cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some((Instant::now() + timeout, timeout)),
            cancel: None,
        }
    }

    pub fn with_cancel(self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            cancel: Some(rx),
            ..self
        };
        (ctx, CancelHandle(tx))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Time left before the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|(at, _)| at.saturating_duration_since(Instant::now()))
    }

    /// Fails if the context is cancelled or past its deadline.
    pub fn check(&self) -> StoreResult<()> {
        if self.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        if let Some((at, timeout)) = self.deadline {
            if Instant::now() >= at {
                return Err(StoreError::DeadlineExceeded(timeout));
            }
        }
        Ok(())
    }

    pub async fn run<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        self.check()?;

        let cancelled = async {
            match self.cancel.clone() {
                Some(mut rx) => loop {
                    if *rx.borrow_and_update() {
                        break;
                    }
                    // Sender gone without cancelling: this context can no longer be cancelled.
                    if rx.changed().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                },
                None => std::future::pending::<()>().await,
            }
        };

        let expired = async {
            match self.deadline {
                Some((at, _)) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(StoreError::Cancelled),
            _ = expired => Err(StoreError::DeadlineExceeded(
                self.deadline.map(|(_, t)| t).unwrap_or_default(),
            )),
            res = fut => res,
        }
    }
}
