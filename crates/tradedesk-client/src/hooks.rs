//! Before/after hooks around request execution
//!
//! Cross-cutting behavior such as a global "loading" flag is attached by
//! composition: each [`RequestObserver`] is notified when a call starts and
//! when it finishes, and [`Hooks::around`] wraps any request future with
//! those notifications.

use reqwest::Method;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Identity of one logical call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub method: Method,
    pub endpoint: String,
}

/// How a call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Failed with the classified status
    Failure(u16),
    /// The request future was dropped before completing
    Cancelled,
}

pub trait RequestObserver: Send + Sync {
    fn on_start(&self, _info: &RequestInfo) {}
    fn on_finish(&self, _info: &RequestInfo, _outcome: Outcome) {}
}

/// Loading flag that stays raised while any call is running
#[derive(Debug, Clone, Default)]
pub struct LoadingTracker {
    active: Arc<AtomicUsize>,
}

impl LoadingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.active.load(Ordering::SeqCst) > 0
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl RequestObserver for LoadingTracker {
    fn on_start(&self, _info: &RequestInfo) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    fn on_finish(&self, _info: &RequestInfo, _outcome: Outcome) {
        let _ = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

/// Ordered list of observers
#[derive(Clone, Default)]
pub struct Hooks {
    observers: Vec<Arc<dyn RequestObserver>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observer: Arc<dyn RequestObserver>) {
        self.observers.push(observer);
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Run `fut` between start and finish notifications
    ///
    /// `classify` maps the future's output to an [`Outcome`]. If the future is
    /// dropped early, observers see [`Outcome::Cancelled`].
    pub async fn around<F, T>(&self, info: RequestInfo, classify: fn(&T) -> Outcome, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        for observer in &self.observers {
            observer.on_start(&info);
        }

        let mut finish = FinishGuard {
            observers: &self.observers,
            info: &info,
            outcome: Outcome::Cancelled,
        };
        let output = fut.await;
        finish.outcome = classify(&output);
        drop(finish);
        output
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("observers", &self.observers.len())
            .finish()
    }
}

struct FinishGuard<'a> {
    observers: &'a [Arc<dyn RequestObserver>],
    info: &'a RequestInfo,
    outcome: Outcome,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        for observer in self.observers.iter().rev() {
            observer.on_finish(self.info, self.outcome);
        }
    }
}
