// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Synchronous multicast signal used for in-process event wiring.
//!
//! Handlers run on whatever thread calls [`Signal::emit`], in registration
//! order. A panicking handler never unwinds into the emitter; the panic is
//! caught and reported via `tracing`.

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A synchronous multicast event source.
pub struct Signal<T> {
    handlers: Mutex<Vec<Handler<T>>>,
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// Register a handler. Handlers are invoked in registration order.
    pub fn listen(&self, handler: impl Fn(&T) + Send + Sync + 'static) {
        self.handlers.lock().push(Arc::new(handler));
    }

    /// Invoke every registered handler with `arg`.
    ///
    /// The handler list is snapshotted before the calls, so a handler may
    /// safely call `listen` or `disconnect_all` on this same signal.
    pub fn emit(&self, arg: &T) {
        let snapshot: Vec<Handler<T>> = self.handlers.lock().clone();
        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(arg))).is_err() {
                tracing::warn!("signal handler panicked; continuing");
            }
        }
    }

    /// Remove all registered handlers.
    pub fn disconnect_all(&self) {
        self.handlers.lock().clear();
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal").field("handlers", &self.len()).finish()
    }
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
