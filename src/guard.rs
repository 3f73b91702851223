//! Scoped acquisition of a countdown event

use crate::countdown::CountdownEvent;

/// RAII guard that holds one count on a [`CountdownEvent`]
///
/// Returned by [`CountdownEvent::guard`]. The count is incremented when the
/// guard is created and decremented when it is dropped, whether the owning
/// scope ends normally, returns early with an error, or unwinds from a panic.
///
/// The guard owns a handle to the event, so it can be moved into a spawned
/// task.
///
/// # Example
///
/// ```rust,no_run
/// use countdown_event::CountdownEvent;
///
/// # async fn example() {
/// let inflight = CountdownEvent::new();
///
/// let guard = inflight.guard();
/// compio::runtime::spawn(async move {
///     let _guard = guard;
///     // Do work...
/// }) // Count released when the task finishes
/// .detach();
///
/// inflight.wait().await;
/// # }
/// ```
#[derive(Debug)]
#[must_use = "dropping the guard immediately decrements the count"]
pub struct CountdownGuard {
    /// The event this guard holds a count on
    event: CountdownEvent,
}

impl CountdownGuard {
    pub(crate) fn new(event: CountdownEvent) -> Self {
        event.increment();
        Self { event }
    }

    /// The event this guard holds a count on
    #[must_use]
    pub fn event(&self) -> &CountdownEvent {
        &self.event
    }
}

impl Drop for CountdownGuard {
    fn drop(&mut self) {
        self.event.decrement();
    }
}
