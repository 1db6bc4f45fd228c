//! Order notifications through the messaging relay.
//!
//! Delivery is best-effort: failures are logged and dropped, and nothing here can fail an
//! order.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::domain::aggregates::{Order, PaymentMethod};
use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience { Business, Customer }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub phone: String,
    pub message: String,
    #[serde(rename = "type")]
    pub audience: Audience,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("relay request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("relay answered {0}")]
    Status(u16),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

pub struct RelayNotifier {
    http: reqwest::Client,
    url: String,
}

impl RelayNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { http, url: url.into() })
    }
}

#[async_trait]
impl Notifier for RelayNotifier {
    #[instrument(name = "relay::send", skip(self, notification), fields(audience = ?notification.audience), err(Display))]
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self.http.post(&self.url).json(notification).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Used when no relay URL is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(audience = ?notification.audience, "Messaging relay not configured; notification skipped");
        Ok(())
    }
}

fn method_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Online => "Online (Paid)",
        PaymentMethod::Cod => "Cash on Delivery",
    }
}

pub fn business_message(order: &Order) -> String {
    let items: Vec<String> = order.items.iter().map(|i| {
        format!("- {} ({}, {}ml) x{} = {}", i.product_name, i.quality, i.volume_ml, i.quantity, Money::new(i.line_total, &order.currency))
    }).collect();
    let mut lines = vec![
        format!("New order {}", order.order_number),
        String::new(),
        format!("Customer: {}", order.customer.name),
        format!("Phone: {}", order.customer.phone),
    ];
    if let Some(email) = order.customer.email.as_deref() {
        lines.push(format!("Email: {}", email));
    }
    lines.push(format!("Address: {}", order.shipping_address));
    lines.push(String::new());
    lines.push("Items:".to_string());
    lines.extend(items);
    lines.push(String::new());
    lines.push(format!("Total: {}", order.total_money()));
    lines.push(format!("Payment: {}", method_label(order.payment_method)));
    lines.join("\n")
}

pub fn customer_message(order: &Order) -> String {
    format!(
        "Thank you for your order, {}!\n\nOrder number: {}\nTotal: {}\nPayment: {}\n\nWe will let you know when it ships.",
        order.customer.name,
        order.order_number,
        order.total_money(),
        method_label(order.payment_method),
    )
}

/// Sends the merchant and customer messages on a spawned task.
pub fn dispatch_order_notifications(notifier: Arc<dyn Notifier>, business_phone: &str, order: &Order) {
    let mut outbox = Vec::with_capacity(2);
    if business_phone.is_empty() {
        warn!(order_number = %order.order_number, "BUSINESS_PHONE not set; merchant notification skipped");
    } else {
        outbox.push(Notification { phone: business_phone.to_string(), message: business_message(order), audience: Audience::Business });
    }
    outbox.push(Notification { phone: order.customer.phone.clone(), message: customer_message(order), audience: Audience::Customer });

    let order_number = order.order_number.clone();
    tokio::spawn(async move {
        for notification in outbox {
            if let Err(e) = notifier.send(&notification).await {
                warn!(order_number = %order_number, audience = ?notification.audience, error = %e, "Order notification failed");
            }
        }
    });
}
