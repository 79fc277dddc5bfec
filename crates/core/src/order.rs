// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Order record and lifecycle status.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an order.
    pub struct OrderId;
}

/// Lifecycle status of an order.
///
/// Admission moves `incoming → accepted → saving → enter-start → entered`;
/// every other state is terminal and closes the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Incoming,
    ServiceNotFound,
    Error,
    Rejected,
    Accepted,
    Saving,
    EnterStart,
    EnterException,
    EnterError,
    Entered,
    Completed,
}

impl OrderStatus {
    /// True for states that end the order's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::ServiceNotFound
                | OrderStatus::Error
                | OrderStatus::Rejected
                | OrderStatus::EnterException
                | OrderStatus::EnterError
                | OrderStatus::Completed
        )
    }

    /// True for transient admission states that a crash can strand an
    /// order in. Startup recovery closes these.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Incoming
                | OrderStatus::Accepted
                | OrderStatus::Saving
                | OrderStatus::EnterStart
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Incoming => "incoming",
            OrderStatus::ServiceNotFound => "service-not-found",
            OrderStatus::Error => "error",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Saving => "saving",
            OrderStatus::EnterStart => "enter-start",
            OrderStatus::EnterException => "enter-exception",
            OrderStatus::EnterError => "enter-error",
            OrderStatus::Entered => "entered",
            OrderStatus::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// Persisted form of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    /// Name of the service this order is addressed to.
    pub service: String,
    pub status: OrderStatus,
    /// Arbitrary descriptor payload supplied by the submitting daemon.
    #[serde(default)]
    pub descriptor: serde_json::Value,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at_ms: Option<u64>,
}

impl OrderRecord {
    pub fn new(
        id: OrderId,
        service: impl Into<String>,
        descriptor: serde_json::Value,
        created_at_ms: u64,
    ) -> Self {
        Self {
            id,
            service: service.into(),
            status: OrderStatus::Incoming,
            descriptor,
            created_at_ms,
            closed_at_ms: None,
        }
    }

    /// Stamp the closed timestamp. Idempotent.
    pub fn close(&mut self, now_ms: u64) {
        if self.closed_at_ms.is_none() {
            self.closed_at_ms = Some(now_ms);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at_ms.is_some()
    }
}

#[cfg(test)]
#[path = "order_tests.rs"]
mod tests;
