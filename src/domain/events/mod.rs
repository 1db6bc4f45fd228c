//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::order::{ConfirmationSource, OrderStatus, PaymentMethod};

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, order_number: String, total: Decimal, payment_method: PaymentMethod },
    Paid { order_id: Uuid, payment_id: String, source: ConfirmationSource },
    PaymentFailed { order_id: Uuid, reason: Option<String> },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Order(OrderEvent::Placed { .. }) => "storefront.orders.placed",
            Self::Order(OrderEvent::Paid { .. }) => "storefront.payments.captured",
            Self::Order(OrderEvent::PaymentFailed { .. }) => "storefront.payments.failed",
            Self::Order(OrderEvent::StatusChanged { .. }) => "storefront.orders.status_changed",
        }
    }
}
