// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The contract between the dispatcher and order-submitting daemons.

use crate::order::Order;
use convoy_core::{Clock, IdGen, OrderId, Signal, SystemClock, UuidIdGen};
use std::sync::Arc;

/// A network-facing endpoint that feeds orders into the dispatcher.
///
/// The transport lives outside the core; the dispatcher only binds its
/// admission path to `order_incoming_event`.
pub trait Daemon: Send + Sync {
    fn name(&self) -> &str;

    /// Fires with each submitted order.
    fn order_incoming_event(&self) -> &Signal<Arc<Order>>;
}

/// In-process submission endpoint.
///
/// Stands where a network transport would: callers hand it a service name
/// and descriptor, it mints the order and fires the incoming event.
pub struct LocalDaemon {
    name: String,
    incoming: Signal<Arc<Order>>,
    ids: UuidIdGen,
    clock: Arc<dyn Clock>,
}

impl LocalDaemon {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_clock(name, Arc::new(SystemClock))
    }

    pub fn with_clock(name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            incoming: Signal::new(),
            ids: UuidIdGen,
            clock,
        }
    }

    /// Submit an order for `service` with the given descriptor payload.
    pub fn submit(&self, service: &str, descriptor: serde_json::Value) -> Arc<Order> {
        let order = Order::new(
            service,
            descriptor,
            OrderId::new(self.ids.next()),
            self.clock.epoch_ms(),
        );
        self.incoming.emit(&order);
        order
    }
}

impl Daemon for LocalDaemon {
    fn name(&self) -> &str {
        &self.name
    }

    fn order_incoming_event(&self) -> &Signal<Arc<Order>> {
        &self.incoming
    }
}
