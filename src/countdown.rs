//! Async countdown event
//!
//! A countdown event tracks a number of outstanding units of work. While the
//! count is non-zero, every call to [`CountdownEvent::wait`] suspends; when a
//! decrement brings the count back to zero, all suspended waiters are woken at
//! once. The event is reusable: it can go from busy to open any number of times.
//!
//! # Example
//!
//! ```rust,no_run
//! use countdown_event::CountdownEvent;
//!
//! # async fn example() {
//! let inflight = CountdownEvent::new();
//!
//! for i in 0..10 {
//!     let guard = inflight.guard();
//!     compio::runtime::spawn(async move {
//!         let _guard = guard;
//!         println!("Handling request {}", i);
//!     })
//!     .detach();
//! }
//!
//! // Returns once every request above has dropped its guard
//! inflight.wait().await;
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use tracing::{debug, error, trace, warn};

use crate::error::{CountdownError, Result};
use crate::guard::CountdownGuard;

/// An async gate that is open while its count is zero and closed otherwise
///
/// Producers call [`increment`](Self::increment) and
/// [`decrement`](Self::decrement), or preferably hold a [`CountdownGuard`]
/// obtained from [`guard`](Self::guard). Observers await
/// [`wait`](Self::wait).
///
/// # Design
///
/// - **Broadcast release**: the 1 → 0 transition wakes every registered waiter
/// - **Generations**: a waiter released by a transition completes even if the
///   count is bumped again before it gets polled
/// - **No lost wakeups**: the zero check and waker registration happen under
///   one lock
/// - **Cloneable**: clones share the same count
///
/// # Example
///
/// ```rust
/// use countdown_event::CountdownEvent;
///
/// let event = CountdownEvent::new();
/// assert_eq!(event.increment(), 1);
/// assert_eq!(event.increment(), 2);
/// assert_eq!(event.decrement(), 1);
/// assert_eq!(event.decrement(), 0);
/// assert_eq!(event.count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct CountdownEvent {
    /// Shared state between all clones of this event
    inner: Arc<Mutex<State>>,
}

/// Mutable state behind the event's lock
#[derive(Default)]
pub(crate) struct State {
    /// Outstanding increments not yet matched by a decrement
    count: usize,
    /// Number of busy → open transitions so far
    generation: u64,
    /// Next key handed out to a registering `Wait`
    next_key: u64,
    /// Wakers of suspended waiters, keyed by their `Wait`
    waiters: Vec<(u64, Waker)>,
}

impl CountdownEvent {
    /// Create a new event in the open state (count 0)
    ///
    /// # Example
    ///
    /// ```rust
    /// use countdown_event::CountdownEvent;
    ///
    /// let event = CountdownEvent::new();
    /// assert_eq!(event.count(), 0);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the count, closing the gate if it was open
    ///
    /// Returns the new count.
    ///
    /// # Panics
    ///
    /// Panics if the count would overflow `usize`.
    pub fn increment(&self) -> usize {
        let mut state = self.lock();
        assert!(state.count < usize::MAX, "countdown event count overflowed");
        state.count += 1;
        trace!(count = state.count, op = "increment", "countdown event count changed");
        state.count
    }

    /// Decrement the count, releasing all waiters if it reaches zero
    ///
    /// Returns the new count.
    ///
    /// # Panics
    ///
    /// Panics if the count is already zero. A decrement without a matching
    /// increment is a bug in the caller; this check is active in every build
    /// profile. Use [`try_decrement`](Self::try_decrement) to get an error
    /// instead.
    pub fn decrement(&self) -> usize {
        match self.release() {
            Some(count) => count,
            None => {
                error!("decrement called on a countdown event with a zero count");
                panic!("{}", CountdownError::Underflow);
            }
        }
    }

    /// Decrement the count, reporting underflow as an error
    ///
    /// On underflow the count is left at zero.
    ///
    /// # Errors
    ///
    /// Returns [`CountdownError::Underflow`] if the count is already zero.
    ///
    /// # Example
    ///
    /// ```rust
    /// use countdown_event::{CountdownError, CountdownEvent};
    ///
    /// let event = CountdownEvent::new();
    /// assert_eq!(event.try_decrement(), Err(CountdownError::Underflow));
    ///
    /// event.increment();
    /// assert_eq!(event.try_decrement(), Ok(0));
    /// ```
    pub fn try_decrement(&self) -> Result<usize> {
        self.release().ok_or_else(|| {
            warn!("try_decrement called on a countdown event with a zero count");
            CountdownError::Underflow
        })
    }

    /// Wait until the count is zero
    ///
    /// Resolves on the first poll if the count is already zero. Otherwise it
    /// suspends until a decrement brings the count to zero. Dropping the
    /// returned future before it completes leaves the count untouched.
    ///
    /// There is no timeout; wrap the future in the runtime's timeout if one is
    /// needed.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use countdown_event::CountdownEvent;
    ///
    /// # async fn example() {
    /// let event = CountdownEvent::new();
    /// let guard = event.guard();
    ///
    /// compio::runtime::spawn(async move {
    ///     drop(guard);
    /// })
    /// .detach();
    ///
    /// event.wait().await;
    /// # }
    /// ```
    pub fn wait(&self) -> Wait {
        Wait {
            event: self.clone(),
            key: None,
            generation: None,
        }
    }

    /// Get the current count
    ///
    /// Useful for monitoring and tests. Do not use it to decide whether to
    /// wait; the value may change immediately after reading.
    #[must_use]
    pub fn count(&self) -> usize {
        self.lock().count
    }

    /// Increment now and decrement when the returned guard is dropped
    ///
    /// The guard decrements on every exit path, including early returns and
    /// panics.
    ///
    /// # Example
    ///
    /// ```rust
    /// use countdown_event::CountdownEvent;
    ///
    /// let event = CountdownEvent::new();
    /// {
    ///     let _guard = event.guard();
    ///     assert_eq!(event.count(), 1);
    /// }
    /// assert_eq!(event.count(), 0);
    /// ```
    #[must_use = "dropping the guard immediately decrements the count"]
    pub fn guard(&self) -> CountdownGuard {
        CountdownGuard::new(self.clone())
    }

    /// Run `future` with the count held up for its whole lifetime
    ///
    /// The increment happens when `scope` is called, not when the returned
    /// future is first polled. The count is restored when the future
    /// completes, panics, or is dropped unfinished.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use countdown_event::CountdownEvent;
    ///
    /// # async fn example() {
    /// let event = CountdownEvent::new();
    /// let value = event.scope(async { 42 }).await;
    /// assert_eq!(value, 42);
    /// assert_eq!(event.count(), 0);
    /// # }
    /// ```
    pub fn scope<F>(&self, future: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        let guard = self.guard();
        async move {
            let _guard = guard;
            future.await
        }
    }

    /// Decrement, waking every waiter on a transition to zero
    ///
    /// Returns `None` without touching the count if it is already zero.
    fn release(&self) -> Option<usize> {
        let woken = {
            let mut state = self.lock();
            if state.count == 0 {
                return None;
            }

            state.count -= 1;
            trace!(count = state.count, op = "decrement", "countdown event count changed");
            if state.count > 0 {
                return Some(state.count);
            }

            state.generation = state.generation.wrapping_add(1);
            debug!(
                waiters = state.waiters.len(),
                generation = state.generation,
                "countdown event reached zero"
            );
            std::mem::take(&mut state.waiters)
        };

        // Wake outside the lock so woken tasks can poll immediately
        for (_, waker) in woken {
            waker.wake();
        }
        Some(0)
    }

    /// Lock the shared state
    ///
    /// No code panics while holding this lock, so a poisoned lock can only
    /// come from elsewhere and the state is still consistent.
    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CountdownEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("CountdownEvent")
            .field("count", &state.count)
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

/// Future returned by [`CountdownEvent::wait`]
///
/// On each poll it:
/// 1. Completes if the count is zero
/// 2. Completes if the event has reached zero since this future registered
/// 3. Otherwise stores (or refreshes) its waker and returns `Poll::Pending`
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Wait {
    /// The event being waited on
    event: CountdownEvent,
    /// Key of this future's entry in the waiter list, once registered
    key: Option<u64>,
    /// Generation observed at first registration
    generation: Option<u64>,
}

impl Future for Wait {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut state = this.event.lock();

        let released = match this.generation {
            Some(generation) => generation != state.generation,
            None => false,
        };
        if state.count == 0 || released {
            if let Some(key) = this.key.take() {
                state.waiters.retain(|(k, _)| *k != key);
            }
            return Poll::Ready(());
        }

        if this.generation.is_none() {
            this.generation = Some(state.generation);
        }

        let key = match this.key {
            Some(key) => key,
            None => {
                let key = state.next_key;
                state.next_key = state.next_key.wrapping_add(1);
                this.key = Some(key);
                key
            }
        };

        match state.waiters.iter_mut().find(|(k, _)| *k == key) {
            Some((_, waker)) => {
                if !waker.will_wake(cx.waker()) {
                    *waker = cx.waker().clone();
                }
            }
            None => state.waiters.push((key, cx.waker().clone())),
        }

        Poll::Pending
    }
}

impl Drop for Wait {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.event.lock().waiters.retain(|(k, _)| *k != key);
        }
    }
}

impl fmt::Debug for Wait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wait")
            .field("registered", &self.key.is_some())
            .field("generation", &self.generation)
            .finish()
    }
}
