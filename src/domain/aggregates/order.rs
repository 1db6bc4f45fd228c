//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer: Customer,
    pub shipping_address: Address,
    pub payment_method: PaymentMethod,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// Catalog data frozen at the time of purchase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub product_name: String,
    pub quality: String,
    pub volume_ml: i32,
    pub sku: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
}

impl OrderItem {
    pub fn new(product_id: Uuid, variant_id: Uuid, product_name: String, quality: String, volume_ml: i32, sku: String, unit_price: Decimal, quantity: u32) -> Self {
        let line_total = unit_price * Decimal::from(quantity);
        Self { product_id, variant_id, product_name, quality, volume_ml, sku, unit_price, quantity, line_total }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer { pub name: String, pub phone: String, pub email: Option<String> }

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address { pub line1: String, pub line2: Option<String>, pub city: String, pub state: String, pub pincode: String }

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.line1)?;
        if let Some(l2) = self.line2.as_deref().filter(|l| !l.is_empty()) { write!(f, ", {}", l2)?; }
        write!(f, ", {}, {} - {}", self.city, self.state, self.pincode)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Cancelled }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] Pending, Paid, Failed, Refunded }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod { Online, Cod }

/// Where an online payment currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPhase { Created, AwaitingGatewayConfirmation, Paid, Failed, Refunded, CashOnDelivery }

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str { match self { $(Self::$variant => $text),+ } }
        }
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
        }
        impl FromStr for $ty {
            type Err = OrderError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s { $($text => Ok(Self::$variant),)+ other => Err(OrderError::UnknownValue(other.to_string())) }
            }
        }
    };
}

text_enum!(OrderStatus { Pending => "pending", Confirmed => "confirmed", Processing => "processing", Shipped => "shipped", Delivered => "delivered", Cancelled => "cancelled" });
text_enum!(PaymentStatus { Pending => "pending", Paid => "paid", Failed => "failed", Refunded => "refunded" });
text_enum!(PaymentMethod { Online => "online", Cod => "cod" });

/// Which path reported a payment result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationSource { ClientCallback, Webhook }

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentOutcome { Captured { payment_id: String }, Failed { payment_id: Option<String>, reason: Option<String> } }

/// A verified payment report. Both the client callback and the gateway webhook produce one;
/// the order merges them regardless of arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentConfirmation { pub source: ConfirmationSource, pub outcome: PaymentOutcome }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition { Applied, AlreadyApplied, Ignored }

impl Order {
    pub fn place(order_number: String, customer: Customer, shipping_address: Address, payment_method: PaymentMethod, items: Vec<OrderItem>, currency: &str) -> Result<Self, OrderError> {
        if items.is_empty() { return Err(OrderError::NoItems); }
        let subtotal: Decimal = items.iter().map(|i| i.line_total).sum();
        let now = Utc::now();
        let status = match payment_method { PaymentMethod::Cod => OrderStatus::Confirmed, PaymentMethod::Online => OrderStatus::Pending };
        let mut order = Self {
            id: Uuid::now_v7(), order_number, customer, shipping_address, payment_method, items,
            subtotal, total: subtotal, currency: currency.to_string(), status, payment_status: PaymentStatus::Pending,
            gateway_order_id: None, gateway_payment_id: None, created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id, order_number: order.order_number.clone(), total: order.total, payment_method,
        }));
        Ok(order)
    }

    /// Rebuilds an order from storage without raising events.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid, order_number: String, customer: Customer, shipping_address: Address, payment_method: PaymentMethod,
        items: Vec<OrderItem>, subtotal: Decimal, total: Decimal, currency: String, status: OrderStatus,
        payment_status: PaymentStatus, gateway_order_id: Option<String>, gateway_payment_id: Option<String>,
        created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id, order_number, customer, shipping_address, payment_method, items, subtotal, total, currency, status,
            payment_status, gateway_order_id, gateway_payment_id, created_at, updated_at, events: vec![],
        }
    }

    pub fn total_money(&self) -> Money { Money::new(self.total, &self.currency) }
    pub fn item_count(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }

    pub fn payment_phase(&self) -> PaymentPhase {
        match (self.payment_method, self.payment_status, &self.gateway_order_id) {
            (_, PaymentStatus::Paid, _) => PaymentPhase::Paid,
            (_, PaymentStatus::Failed, _) => PaymentPhase::Failed,
            (_, PaymentStatus::Refunded, _) => PaymentPhase::Refunded,
            (PaymentMethod::Cod, _, _) => PaymentPhase::CashOnDelivery,
            (PaymentMethod::Online, PaymentStatus::Pending, Some(_)) => PaymentPhase::AwaitingGatewayConfirmation,
            (PaymentMethod::Online, PaymentStatus::Pending, None) => PaymentPhase::Created,
        }
    }

    /// Binds the gateway order created for this order's payment. Once bound, the id never
    /// changes: confirmations are resolved through it.
    pub fn attach_gateway_order(&mut self, gateway_order_id: impl Into<String>) -> Result<(), OrderError> {
        if self.payment_method != PaymentMethod::Online { return Err(OrderError::NotOnlinePayment); }
        if self.payment_status == PaymentStatus::Paid { return Err(OrderError::AlreadyPaid); }
        if self.status == OrderStatus::Cancelled { return Err(OrderError::Cancelled); }
        let gateway_order_id = gateway_order_id.into();
        match self.gateway_order_id.as_deref() {
            Some(existing) if existing == gateway_order_id => return Ok(()),
            Some(existing) => return Err(OrderError::GatewayOrderBound(existing.to_string())),
            None => {}
        }
        self.gateway_order_id = Some(gateway_order_id);
        self.touch();
        Ok(())
    }

    /// Merges a verified payment report. `Paid` absorbs every later report; a capture may
    /// still follow a failure on the same gateway order.
    pub fn apply_payment(&mut self, confirmation: &PaymentConfirmation) -> Transition {
        match (&confirmation.outcome, self.payment_status) {
            (PaymentOutcome::Captured { payment_id }, PaymentStatus::Paid) => {
                if self.gateway_payment_id.as_deref() == Some(payment_id.as_str()) { Transition::AlreadyApplied } else { Transition::Ignored }
            }
            (PaymentOutcome::Captured { payment_id }, PaymentStatus::Pending | PaymentStatus::Failed) => {
                self.payment_status = PaymentStatus::Paid;
                self.gateway_payment_id = Some(payment_id.clone());
                if self.status == OrderStatus::Pending { self.status = OrderStatus::Confirmed; }
                self.touch();
                self.raise_event(DomainEvent::Order(OrderEvent::Paid {
                    order_id: self.id, payment_id: payment_id.clone(), source: confirmation.source,
                }));
                Transition::Applied
            }
            (PaymentOutcome::Failed { .. }, PaymentStatus::Failed) => Transition::AlreadyApplied,
            (PaymentOutcome::Failed { payment_id, reason }, PaymentStatus::Pending) => {
                self.payment_status = PaymentStatus::Failed;
                if payment_id.is_some() { self.gateway_payment_id = payment_id.clone(); }
                self.touch();
                self.raise_event(DomainEvent::Order(OrderEvent::PaymentFailed { order_id: self.id, reason: reason.clone() }));
                Transition::Applied
            }
            (PaymentOutcome::Failed { .. }, PaymentStatus::Paid) | (_, PaymentStatus::Refunded) => Transition::Ignored,
        }
    }

    /// Manual status change from the admin panel.
    pub fn set_status(&mut self, status: OrderStatus) -> Result<(), OrderError> {
        if self.status == status { return Ok(()); }
        match (self.status, status) {
            (OrderStatus::Delivered, OrderStatus::Cancelled) => return Err(OrderError::CannotCancel),
            (OrderStatus::Cancelled, _) => return Err(OrderError::Cancelled),
            _ => {}
        }
        let from = self.status;
        self.status = status;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to: status }));
        Ok(())
    }

    /// Manual payment-status override from the admin panel.
    pub fn set_payment_status(&mut self, payment_status: PaymentStatus) {
        if self.payment_status != payment_status {
            self.payment_status = payment_status;
            self.touch();
        }
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// `ORD-` followed by eight random digits.
pub fn generate_order_number() -> String {
    format!("ORD-{:08}", rand::random::<u32>() % 100_000_000)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Order has no items")]
    NoItems,
    #[error("Delivered orders cannot be cancelled")]
    CannotCancel,
    #[error("Order is cancelled")]
    Cancelled,
    #[error("Order is already paid")]
    AlreadyPaid,
    #[error("Order is not paid online")]
    NotOnlinePayment,
    #[error("Order is already bound to gateway order {0}")]
    GatewayOrderBound(String),
    #[error("Unknown value: {0}")]
    UnknownValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<OrderItem> {
        vec![
            OrderItem::new(Uuid::new_v4(), Uuid::new_v4(), "Rose".into(), "Regular".into(), 6, "ROSE-6".into(), Decimal::new(500, 0), 2),
            OrderItem::new(Uuid::new_v4(), Uuid::new_v4(), "Oud".into(), "Premium".into(), 12, "OUD-12".into(), Decimal::new(1200, 0), 1),
        ]
    }

    fn online_order() -> Order {
        Order::place("ORD-00000001".into(), Customer::default(), Address::default(), PaymentMethod::Online, items(), "INR").unwrap()
    }

    fn captured(source: ConfirmationSource, id: &str) -> PaymentConfirmation {
        PaymentConfirmation { source, outcome: PaymentOutcome::Captured { payment_id: id.into() } }
    }

    #[test]
    fn test_total_is_sum_of_snapshots() {
        let order = online_order();
        assert_eq!(order.total, Decimal::new(2200, 0));
        assert_eq!(order.item_count(), 3);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_cod_is_confirmed_immediately() {
        let order = Order::place("ORD-1".into(), Customer::default(), Address::default(), PaymentMethod::Cod, items(), "INR").unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.payment_phase(), PaymentPhase::CashOnDelivery);
    }

    #[test]
    fn test_empty_order_rejected() {
        let err = Order::place("ORD-1".into(), Customer::default(), Address::default(), PaymentMethod::Cod, vec![], "INR").unwrap_err();
        assert_eq!(err, OrderError::NoItems);
    }

    #[test]
    fn test_payment_phases() {
        let mut order = online_order();
        assert_eq!(order.payment_phase(), PaymentPhase::Created);
        order.attach_gateway_order("order_abc").unwrap();
        assert_eq!(order.payment_phase(), PaymentPhase::AwaitingGatewayConfirmation);
        assert_eq!(order.apply_payment(&captured(ConfirmationSource::ClientCallback, "pay_1")), Transition::Applied);
        assert_eq!(order.payment_phase(), PaymentPhase::Paid);
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[test]
    fn test_gateway_order_binding_is_permanent() {
        let mut order = online_order();
        order.attach_gateway_order("order_abc").unwrap();
        assert_eq!(order.attach_gateway_order("order_abc"), Ok(()));
        assert_eq!(order.attach_gateway_order("order_xyz"), Err(OrderError::GatewayOrderBound("order_abc".into())));
        assert_eq!(order.gateway_order_id.as_deref(), Some("order_abc"));
    }

    #[test]
    fn test_replayed_capture_is_idempotent() {
        let mut order = online_order();
        order.attach_gateway_order("order_abc").unwrap();
        order.take_events();
        assert_eq!(order.apply_payment(&captured(ConfirmationSource::ClientCallback, "pay_1")), Transition::Applied);
        assert_eq!(order.apply_payment(&captured(ConfirmationSource::Webhook, "pay_1")), Transition::AlreadyApplied);
        assert_eq!(order.apply_payment(&captured(ConfirmationSource::Webhook, "pay_1")), Transition::AlreadyApplied);
        assert_eq!(order.take_events().len(), 1);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_failure_after_capture_is_ignored() {
        let mut order = online_order();
        order.apply_payment(&captured(ConfirmationSource::Webhook, "pay_1"));
        let failed = PaymentConfirmation { source: ConfirmationSource::Webhook, outcome: PaymentOutcome::Failed { payment_id: Some("pay_0".into()), reason: None } };
        assert_eq!(order.apply_payment(&failed), Transition::Ignored);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.gateway_payment_id.as_deref(), Some("pay_1"));
    }

    #[test]
    fn test_capture_after_failure_wins() {
        let mut order = online_order();
        let failed = PaymentConfirmation { source: ConfirmationSource::Webhook, outcome: PaymentOutcome::Failed { payment_id: Some("pay_0".into()), reason: Some("declined".into()) } };
        assert_eq!(order.apply_payment(&failed), Transition::Applied);
        assert_eq!(order.apply_payment(&failed), Transition::AlreadyApplied);
        assert_eq!(order.apply_payment(&captured(ConfirmationSource::ClientCallback, "pay_1")), Transition::Applied);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_status_changes() {
        let mut order = online_order();
        order.set_status(OrderStatus::Shipped).unwrap();
        order.set_status(OrderStatus::Delivered).unwrap();
        assert_eq!(order.set_status(OrderStatus::Cancelled), Err(OrderError::CannotCancel));
    }

    #[test]
    fn test_text_round_trip() {
        assert_eq!("awaiting".parse::<PaymentStatus>(), Err(OrderError::UnknownValue("awaiting".into())));
        assert_eq!("cod".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cod);
        assert_eq!(OrderStatus::Shipped.to_string(), "shipped");
    }

    #[test]
    fn test_order_number_format() {
        let n = generate_order_number();
        assert!(n.starts_with("ORD-"));
        assert_eq!(n.len(), 12);
    }
}
