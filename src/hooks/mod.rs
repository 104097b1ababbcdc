//! Stateful data handles over the API client.
//!
//! A hook owns a [`FetchState`] (`data`, `loading`, `error`) published through a
//! `tokio::sync::watch` channel, plus the operations that update it. The rules
//! are the same for every hook:
//!
//! - `loading` is true only while at least one request is in flight
//! - `error` is cleared when an attempt starts and holds the error's message when
//!   it fails; for API errors that is the server's `detail` verbatim
//! - every hook owns a cancellation scope; dropping the hook cancels it, and
//!   results of requests still in flight are discarded
//!
//! [`exchange_rates`] is the only hook that fetches on its own: immediately, then
//! once per period until dropped. A failed tick is retried on the next one.
//!
//! # Example
//!
//! ```no_run
//! use polkapay::{api::{self, types::OrderType}, hooks::ActiveOrders};
//!
//! # async fn example() {
//! let orders = ActiveOrders::new(api::local(), Some(OrderType::Buy));
//! let _ = orders.refetch().await;
//!
//! let state = orders.state();
//! match (state.data, state.error) {
//!     (_, Some(error)) => eprintln!("{error}"),
//!     (Some(orders), None) => println!("{} buy orders", orders.len()),
//!     (None, None) => {}
//! }
//! # }
//! ```

mod lp;
mod orders;

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::{FutureExt, future::BoxFuture};
use tokio::{sync::watch, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub use lp::{LpProfile, lp_available_orders, lp_earnings, lp_orders};
pub use orders::{ActiveOrders, OrderActions, exchange_rates, my_orders};

use crate::api::{Error, Result};

/// Snapshot of a hook.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    /// Result of the last successful request.
    pub data: Option<T>,
    /// Whether a request is in flight.
    pub loading: bool,
    /// Message of the last failed request, cleared when a new one starts.
    pub error: Option<String>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

/// Shared state machinery behind every hook.
pub(crate) struct Tracker<T> {
    state: watch::Sender<FetchState<T>>,
    in_flight: AtomicUsize,
    scope: CancellationToken,
}

/// Decrements the in-flight count if a request is dropped before it settles.
struct InFlight<'a, T> {
    tracker: &'a Tracker<T>,
    armed: bool,
}

impl<T> InFlight<'_, T> {
    /// Marks the request as settled, returning the number still in flight.
    fn settle(mut self) -> usize {
        self.armed = false;
        self.tracker.in_flight.fetch_sub(1, Ordering::AcqRel) - 1
    }
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let remaining = self.tracker.in_flight.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining == 0 && !self.tracker.scope.is_cancelled() {
            self.tracker.state.send_if_modified(|state| {
                std::mem::replace(&mut state.loading, false)
            });
        }
    }
}

impl<T> Tracker<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: watch::Sender::new(FetchState::default()),
            in_flight: AtomicUsize::new(0),
            scope: CancellationToken::new(),
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.state.subscribe()
    }

    pub(crate) fn scope(&self) -> &CancellationToken {
        &self.scope
    }

    /// Runs one request, publishing `loading` and `error` around it.
    ///
    /// `apply` folds a successful result into the state. Nothing is published once
    /// the scope is cancelled.
    pub(crate) async fn run<R, F>(
        &self,
        fut: F,
        apply: impl FnOnce(&mut FetchState<T>, &R),
    ) -> Result<R>
    where
        F: Future<Output = Result<R>>,
    {
        if self.scope.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let guard = InFlight {
            tracker: self,
            armed: true,
        };
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });

        let res = tokio::select! {
            biased;
            _ = self.scope.cancelled() => Err(Error::Cancelled),
            res = fut => res,
        };

        let remaining = guard.settle();
        if self.scope.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.state.send_modify(|state| {
            state.loading = remaining > 0;
            match &res {
                Ok(value) => apply(state, value),
                Err(err) => state.error = Some(err.to_string()),
            }
        });
        res
    }

    /// Changes `data` without a request.
    pub(crate) fn modify_data(&self, f: impl FnOnce(&mut T)) {
        self.state.send_if_modified(|state| match state.data.as_mut() {
            Some(data) => {
                f(data);
                true
            }
            None => false,
        });
    }
}

impl<T: Clone> Tracker<T> {
    pub(crate) fn state(&self) -> FetchState<T> {
        self.state.borrow().clone()
    }
}

impl<T> Drop for Tracker<T> {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

/// Shortest period a polling [`Resource`] refetches at.
pub const MIN_POLL_PERIOD: Duration = Duration::from_secs(1);

/// Produces the request for one fetch, or `None` when it cannot be made
/// (e.g. no bearer token).
type Fetcher<T> = Arc<dyn Fn() -> Option<BoxFuture<'static, Result<T>>> + Send + Sync>;

/// A hook over a single read endpoint.
///
/// [`Resource::refetch`] runs the request and replaces `data` on success. A
/// polling resource also refetches in the background until dropped.
pub struct Resource<T> {
    tracker: Arc<Tracker<T>>,
    fetcher: Fetcher<T>,
}

impl<T> std::fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("loading", &self.tracker.state.borrow().loading)
            .finish_non_exhaustive()
    }
}

impl<T> Resource<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a resource that fetches with `fetch` on [`refetch`](Self::refetch).
    pub fn new<F, Fut>(fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self::from_fetcher(Arc::new(move || Some(fetch().boxed())))
    }

    pub(crate) fn from_fetcher(fetcher: Fetcher<T>) -> Self {
        Self {
            tracker: Arc::new(Tracker::new()),
            fetcher,
        }
    }

    /// Creates a resource that fetches immediately and then every `period` until
    /// dropped.
    ///
    /// Periods shorter than [`MIN_POLL_PERIOD`] are raised to it. Must be called
    /// within a Tokio runtime.
    pub fn polling<F, Fut>(fetch: F, period: Duration) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let period = if period < MIN_POLL_PERIOD {
            log::warn!("poll period {period:?} raised to {MIN_POLL_PERIOD:?}");
            MIN_POLL_PERIOD
        } else {
            period
        };

        let resource = Self::new(fetch);
        let tracker = Arc::clone(&resource.tracker);
        let fetcher = Arc::clone(&resource.fetcher);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = tracker.scope().cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match fetch_into(&tracker, &fetcher).await {
                    Err(err) if !err.is_cancelled() => {
                        log::debug!("poll failed, retrying in {period:?}: {err}");
                    }
                    _ => {}
                }
            }
            log::trace!("poller stopped");
        });

        resource
    }

    /// Runs the request now and returns its result.
    ///
    /// Fails with [`Error::Unauthenticated`], without touching the state, when the
    /// request cannot be made.
    pub async fn refetch(&self) -> Result<T> {
        fetch_into(&self.tracker, &self.fetcher).await
    }

    /// Returns the current state.
    pub fn state(&self) -> FetchState<T> {
        self.tracker.state()
    }

    /// Observes state changes.
    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.tracker.subscribe()
    }
}

impl<T> Drop for Resource<T> {
    fn drop(&mut self) {
        self.tracker.scope.cancel();
    }
}

async fn fetch_into<T: Clone>(tracker: &Tracker<T>, fetcher: &Fetcher<T>) -> Result<T> {
    let Some(fut) = fetcher() else {
        return Err(Error::Unauthenticated);
    };
    tracker
        .run(fut, |state, value: &T| state.data = Some(value.clone()))
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;
    use crate::api::Error;

    fn counting(calls: Arc<AtomicU32>) -> impl Fn() -> BoxFuture<'static, Result<u32>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(n) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_refetch_updates_state() {
        let calls = Arc::new(AtomicU32::new(0));
        let resource = Resource::new(counting(calls.clone()));
        assert_eq!(resource.state(), FetchState::default());

        assert_eq!(resource.refetch().await.unwrap(), 1);
        let state = resource.state();
        assert_eq!(state.data, Some(1));
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_error_is_stored_and_cleared() {
        let fail = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let flag = fail.clone();
        let resource = Resource::new(move || {
            let fail = flag.load(Ordering::SeqCst);
            async move {
                if fail {
                    Err(Error::Wallet("boom".into()))
                } else {
                    Ok(7u32)
                }
            }
        });

        assert!(resource.refetch().await.is_err());
        assert_eq!(resource.state().error.as_deref(), Some("boom"));
        assert!(!resource.state().loading);

        fail.store(false, Ordering::SeqCst);
        assert_eq!(resource.refetch().await.unwrap(), 7);
        assert!(resource.state().error.is_none());
    }

    #[tokio::test]
    async fn test_skipped_fetch_leaves_state() {
        let resource: Resource<u32> = Resource::from_fetcher(Arc::new(|| None));
        assert!(resource.refetch().await.unwrap_err().is_unauthenticated());
        assert_eq!(resource.state(), FetchState::default());
    }

    #[tokio::test]
    async fn test_loading_while_in_flight() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let rx = Arc::new(tokio::sync::Mutex::new(Some(rx)));
        let resource = Arc::new(Resource::new(move || {
            let rx = rx.clone();
            async move {
                if let Some(rx) = rx.lock().await.take() {
                    let _ = rx.await;
                }
                Ok(1u32)
            }
        }));

        let task = tokio::spawn({
            let resource = resource.clone();
            async move { resource.refetch().await }
        });

        let mut updates = resource.subscribe();
        updates.wait_for(|state| state.loading).await.unwrap();

        tx.send(()).unwrap();
        task.await.unwrap().unwrap();
        assert!(!resource.state().loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_fetches_every_period() {
        let calls = Arc::new(AtomicU32::new(0));
        let period = Duration::from_secs(30);
        let resource = Resource::polling(counting(calls.clone()), period);

        tokio::time::sleep(period + Duration::from_millis(100)).await;
        assert!(calls.load(Ordering::SeqCst) >= 2);
        assert!(resource.state().data.is_some());

        drop(resource);
        let seen = calls.load(Ordering::SeqCst);
        tokio::time::sleep(period * 3).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_zero_period_is_raised() {
        let calls = Arc::new(AtomicU32::new(0));
        let resource = Resource::polling(counting(calls.clone()), Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(resource.state().data, Some(1));

        tokio::time::sleep(MIN_POLL_PERIOD).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_retries_after_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let resource = Resource::polling(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(Error::Wallet("down".into()))
                    } else {
                        Ok(n)
                    }
                }
            },
            Duration::from_secs(5),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(resource.state().error.as_deref(), Some("down"));

        tokio::time::sleep(Duration::from_secs(5)).await;
        let state = resource.state();
        assert_eq!(state.data, Some(1));
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_dropped_resource_discards_in_flight() {
        let tracker: Tracker<u32> = Tracker::new();
        let mut updates = tracker.subscribe();
        tracker.scope().cancel();

        let res = tracker
            .run(async { Ok(5u32) }, |state, value| state.data = Some(*value))
            .await;
        assert!(res.unwrap_err().is_cancelled());
        assert!(!updates.has_changed().unwrap());
        assert!(tracker.state().data.is_none());
    }
}
