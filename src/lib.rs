//! Async countdown event
//!
//! This crate provides [`CountdownEvent`], a gate that stays closed while a
//! count of outstanding work is non-zero and releases every waiter when the
//! count drops back to zero. It works with any executor and is tested on the
//! [compio](https://github.com/compio-rs/compio) runtime.
//!
//! # Primitives
//!
//! - [`CountdownEvent`] - Counter plus broadcast wait signal
//! - [`CountdownGuard`] - RAII guard holding one count
//! - [`Wait`] - Future returned by [`CountdownEvent::wait`]
//!
//! # Example
//!
//! ```rust,no_run
//! use countdown_event::CountdownEvent;
//!
//! #[compio::main]
//! async fn main() {
//!     let inflight = CountdownEvent::new();
//!
//!     for i in 0..100 {
//!         let guard = inflight.guard();
//!         compio::runtime::spawn(async move {
//!             let _guard = guard;
//!             println!("Request {}", i);
//!         })
//!         .detach();
//!     }
//!
//!     // Drain before shutting down
//!     inflight.wait().await;
//! }
//! ```

mod countdown;
mod error;
mod guard;

pub use countdown::{CountdownEvent, Wait};
pub use error::{CountdownError, Result};
pub use guard::CountdownGuard;
