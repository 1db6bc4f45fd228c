//! Payment gateway integration.
//!
//! Orders paid online get a gateway order first; the checkout widget talks to the gateway
//! directly and hands back `(order id, payment id, signature)`. Card and UPI details never
//! reach this service.

pub mod razorpay;
pub mod signature;
pub mod webhook;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use razorpay::RazorpayClient;

/// Order object as returned by the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Minor units (paise).
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Key id the checkout widget must be opened with.
    fn key_id(&self) -> &str;

    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> Result<GatewayOrder, GatewayError>;
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
}
