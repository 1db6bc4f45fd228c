//! Order views and customer order tracking.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use crate::domain::aggregates::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentPhase, PaymentStatus};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Full order as the admin panel sees it.
#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub payment_phase: PaymentPhase,
    pub formatted_total: String,
    pub item_count: u32,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            payment_phase: order.payment_phase(),
            formatted_total: order.total_money().to_string(),
            item_count: order.item_count(),
            order,
        }
    }
}

/// What a customer sees when looking an order up by number. Contact and address details are
/// left out.
#[derive(Debug, Serialize)]
pub struct OrderTracking {
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_phase: PaymentPhase,
    pub payment_method: PaymentMethod,
    pub items: Vec<OrderItem>,
    pub total: Decimal,
    pub currency: String,
    pub formatted_total: String,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderTracking {
    fn from(order: Order) -> Self {
        Self {
            payment_phase: order.payment_phase(),
            formatted_total: order.total_money().to_string(),
            order_number: order.order_number,
            status: order.status,
            payment_status: order.payment_status,
            payment_method: order.payment_method,
            items: order.items,
            total: order.total,
            currency: order.currency,
            created_at: order.created_at,
        }
    }
}

#[instrument(skip(state), err(Display))]
pub async fn track_order(state: &AppState, order_number: &str) -> Result<OrderTracking> {
    let order = state.repo.order_by_number(order_number).await?
        .ok_or_else(|| AppError::NotFound(format!("Order {}", order_number)))?;
    Ok(order.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Address, Customer};
    use uuid::Uuid;

    #[test]
    fn test_tracking_hides_contact_details() {
        let items = vec![OrderItem::new(Uuid::new_v4(), Uuid::new_v4(), "Musk".into(), "Regular".into(), 6, "MUSK-6".into(), Decimal::new(450, 0), 2)];
        let customer = Customer { name: "Ravi".into(), phone: "9123456780".into(), email: Some("ravi@example.com".into()) };
        let order = Order::place("ORD-00000042".into(), customer, Address::default(), PaymentMethod::Online, items, "INR").unwrap();
        let json = serde_json::to_value(OrderTracking::from(order)).unwrap();
        assert_eq!(json["formatted_total"], "₹900");
        assert_eq!(json["payment_phase"], "created");
        assert!(json.get("customer").is_none());
    }
}
