//! Gateway webhook payloads.

use serde::Deserialize;

use crate::domain::aggregates::{ConfirmationSource, PaymentConfirmation, PaymentOutcome};

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<EntityWrapper>,
}

#[derive(Debug, Deserialize)]
pub struct EntityWrapper { pub entity: PaymentEntity }

#[derive(Debug, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    pub order_id: Option<String>,
    #[serde(default)]
    pub amount: i64,
    pub status: Option<String>,
    pub error_description: Option<String>,
}

/// What a webhook asks the service to do.
#[derive(Debug, PartialEq, Eq)]
pub enum WebhookAction {
    Apply { gateway_order_id: String, confirmation: PaymentConfirmation },
    Ignore { event: String },
}

impl WebhookEnvelope {
    pub fn into_action(self) -> WebhookAction {
        let payment = self.payload.payment.map(|p| p.entity);
        let outcome = match (self.event.as_str(), &payment) {
            ("payment.captured", Some(p)) => Some(PaymentOutcome::Captured { payment_id: p.id.clone() }),
            ("payment.failed", Some(p)) => Some(PaymentOutcome::Failed {
                payment_id: Some(p.id.clone()),
                reason: p.error_description.clone(),
            }),
            _ => None,
        };
        match (outcome, payment.and_then(|p| p.order_id)) {
            (Some(outcome), Some(gateway_order_id)) => WebhookAction::Apply {
                gateway_order_id,
                confirmation: PaymentConfirmation { source: ConfirmationSource::Webhook, outcome },
            },
            _ => WebhookAction::Ignore { event: self.event },
        }
    }
}
