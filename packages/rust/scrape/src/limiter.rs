//! Process-wide outbound request scheduler.
//!
//! A [`RateLimiter`] is created once at startup and cloned into every
//! component that talks to the scraped site. Admission is FIFO: callers are
//! dispatched in the order they called [`RateLimiter::schedule`], subject to
//! a concurrency ceiling and a minimum spacing between dispatch times.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::trace;

use keywordscout_shared::{KeywordScoutError, LimiterConfig, Result};

/// Shared, cloneable request pacer.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    /// `None` when concurrency is unbounded. Tokio's semaphore is fair, which
    /// gives FIFO admission.
    permits: Option<Semaphore>,
    /// Earliest instant the next task may start.
    next_start: Mutex<Instant>,
    min_time: Duration,
    in_flight: AtomicUsize,
}

impl RateLimiter {
    /// Build a limiter; a zero concurrency ceiling is a configuration error.
    pub fn new(config: LimiterConfig) -> Result<Self> {
        if config.max_concurrent == Some(0) {
            return Err(KeywordScoutError::config(
                "rate limiter max_concurrent must be at least 1",
            ));
        }

        Ok(Self {
            inner: Arc::new(Inner {
                permits: config.max_concurrent.map(Semaphore::new),
                next_start: Mutex::new(Instant::now()),
                min_time: config.min_time,
                in_flight: AtomicUsize::new(0),
            }),
        })
    }

    /// A limiter that never delays or bounds anything.
    pub fn unlimited() -> Self {
        Self {
            inner: Arc::new(Inner {
                permits: None,
                next_start: Mutex::new(Instant::now()),
                min_time: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Run `task` once the limiter admits it. The task's output, including any
    /// error it carries, is returned unchanged.
    pub async fn schedule<F, Fut, T>(&self, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        // The semaphore is never closed, so acquisition only fails in theory.
        let _permit = match &self.inner.permits {
            Some(permits) => permits.acquire().await.ok(),
            None => None,
        };

        if !self.inner.min_time.is_zero() {
            let start_at = {
                let mut next = self.inner.next_start.lock().await;
                let start_at = (*next).max(Instant::now());
                *next = start_at + self.inner.min_time;
                start_at
            };
            tokio::time::sleep_until(start_at).await;
        }

        let _guard = InFlight::enter(&self.inner.in_flight);
        trace!(in_flight = self.in_flight(), "limiter dispatched task");
        task().await
    }

    /// Tasks currently running under this limiter.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field(
                "max_concurrent",
                &self.inner.permits.as_ref().map(|_| "bounded").unwrap_or("unbounded"),
            )
            .field("min_time", &self.inner.min_time)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Decrements the in-flight counter even if the task is dropped mid-flight.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
