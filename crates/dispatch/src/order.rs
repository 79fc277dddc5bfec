// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live order entity shared between the dispatcher and service code.

use convoy_core::{OrderId, OrderRecord, OrderStatus};
use parking_lot::Mutex;
use std::sync::Arc;

/// An order under dispatch. Shared as `Arc<Order>`; the wrapped record is
/// the unit of persistence.
pub struct Order {
    record: Mutex<OrderRecord>,
}

impl Order {
    pub fn new(
        service: impl Into<String>,
        descriptor: serde_json::Value,
        id: OrderId,
        created_at_ms: u64,
    ) -> Arc<Self> {
        Self::from_record(OrderRecord::new(id, service, descriptor, created_at_ms))
    }

    pub fn from_record(record: OrderRecord) -> Arc<Self> {
        Arc::new(Self {
            record: Mutex::new(record),
        })
    }

    pub fn id(&self) -> OrderId {
        self.record.lock().id.clone()
    }

    /// Name of the service this order is addressed to.
    pub fn service(&self) -> String {
        self.record.lock().service.clone()
    }

    pub fn status(&self) -> OrderStatus {
        self.record.lock().status
    }

    pub fn descriptor(&self) -> serde_json::Value {
        self.record.lock().descriptor.clone()
    }

    /// Snapshot of the persisted form.
    pub fn record(&self) -> OrderRecord {
        self.record.lock().clone()
    }

    pub(crate) fn set_status(&self, status: OrderStatus) {
        self.record.lock().status = status;
    }

    /// Stamp the closed timestamp. Idempotent.
    pub fn close(&self, now_ms: u64) {
        self.record.lock().close(now_ms);
    }

    pub fn is_closed(&self) -> bool {
        self.record.lock().is_closed()
    }
}

impl std::fmt::Debug for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let record = self.record.lock();
        f.debug_struct("Order")
            .field("id", &record.id)
            .field("service", &record.service)
            .field("status", &record.status)
            .finish()
    }
}
