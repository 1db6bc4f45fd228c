//! Razorpay Orders API client.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{GatewayError, GatewayOrder, PaymentGateway};
use crate::config::RazorpayConfig;

#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    config: RazorpayConfig,
}

#[derive(Serialize)]
struct CreateOrderBody<'a> { amount: i64, currency: &'a str, receipt: &'a str }

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    fn key_id(&self) -> &str { &self.config.key_id }

    #[instrument(name = "razorpay::create_order", skip(self), err(Display))]
    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> Result<GatewayOrder, GatewayError> {
        let response = self.http
            .post(self.url("orders"))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&CreateOrderBody { amount: amount_minor, currency, receipt })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected { status: status.as_u16(), body });
        }
        let order: GatewayOrder = response.json().await?;
        debug!(gateway_order_id = %order.id, "Gateway order created");
        Ok(order)
    }
}
