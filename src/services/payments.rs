//! Online payment flow.
//!
//! 1. `create_gateway_order` binds a gateway order to a placed order.
//! 2. The shopper pays in the gateway widget.
//! 3. `verify_payment` (client callback) and `handle_webhook` (gateway push) both report the
//!    result. Whichever arrives first settles the order; the other is a no-op.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::domain::aggregates::{
    ConfirmationSource, Order, OrderError, PaymentConfirmation, PaymentMethod, PaymentOutcome, PaymentStatus, Transition,
};
use crate::error::{AppError, Result};
use crate::notify::dispatch_order_notifications;
use crate::payment::signature;
use crate::payment::webhook::{WebhookAction, WebhookEnvelope};
use crate::payment::GatewayOrder;
use crate::repository::RepositoryError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentOrder {
    /// Major units; must equal the order total.
    pub amount: Decimal,
    /// Order number of the order being paid.
    pub receipt: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentOrderResponse {
    #[serde(flatten)]
    pub gateway_order: GatewayOrder,
    pub key_id: String,
    pub order_number: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPayment {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
}

#[instrument(skip(state), fields(receipt = %request.receipt), err(Display))]
pub async fn create_gateway_order(state: &AppState, request: CreatePaymentOrder) -> Result<PaymentOrderResponse> {
    let order = state.repo.order_by_number(&request.receipt).await?
        .ok_or_else(|| AppError::NotFound(format!("Order {}", request.receipt)))?;
    if order.payment_method != PaymentMethod::Online {
        return Err(OrderError::NotOnlinePayment.into());
    }
    if order.payment_status == PaymentStatus::Paid {
        return Err(OrderError::AlreadyPaid.into());
    }
    if request.amount != order.total {
        return Err(AppError::Conflict(format!(
            "Amount {} does not match order total {}", request.amount, order.total
        )));
    }

    let amount_minor = order.total_money().to_minor_units()
        .map_err(|e| AppError::Internal(format!("order {} total: {}", order.order_number, e)))?;

    // one gateway order per order; payment is only ever confirmed against the stored id
    if let Some(existing) = &order.gateway_order_id {
        debug!(order_number = %order.order_number, gateway_order_id = %existing, "Reusing gateway order");
        return Ok(PaymentOrderResponse {
            gateway_order: GatewayOrder {
                id: existing.clone(),
                amount: amount_minor,
                currency: order.currency.clone(),
                receipt: Some(order.order_number.clone()),
                status: "created".to_string(),
            },
            key_id: state.gateway.key_id().to_string(),
            order_number: order.order_number,
        });
    }

    let gateway_order = state.gateway.create_order(amount_minor, &order.currency, &order.order_number).await?;
    state.repo.attach_gateway_order(order.id, &gateway_order.id).await?;
    info!(order_number = %order.order_number, gateway_order_id = %gateway_order.id, amount_minor, "Awaiting gateway confirmation");

    Ok(PaymentOrderResponse {
        gateway_order,
        key_id: state.gateway.key_id().to_string(),
        order_number: order.order_number,
    })
}

/// Client callback. A bad signature changes nothing and answers `verified: false`.
#[instrument(skip(state, request), fields(gateway_order_id = %request.razorpay_order_id, payment_id = %request.razorpay_payment_id), err(Display))]
pub async fn verify_payment(state: &AppState, request: VerifyPayment) -> Result<VerifyResponse> {
    let genuine = signature::verify_payment(
        &state.config.razorpay.key_secret,
        &request.razorpay_order_id,
        &request.razorpay_payment_id,
        &request.razorpay_signature,
    );
    if !genuine {
        warn!("Payment signature mismatch");
        return Ok(VerifyResponse { verified: false, order_number: None, payment_status: None });
    }

    let confirmation = PaymentConfirmation {
        source: ConfirmationSource::ClientCallback,
        outcome: PaymentOutcome::Captured { payment_id: request.razorpay_payment_id },
    };
    let (order, _) = settle(state, &request.razorpay_order_id, confirmation).await?;
    Ok(VerifyResponse { verified: true, order_number: Some(order.order_number), payment_status: Some(order.payment_status) })
}

/// Gateway push. The signature covers the raw body, so it is checked before parsing.
#[instrument(skip(state, signature_header, body), fields(bytes = body.len()), err(Display))]
pub async fn handle_webhook(state: &AppState, signature_header: Option<&str>, body: &[u8]) -> Result<WebhookAck> {
    let supplied = signature_header.ok_or(AppError::InvalidSignature)?;
    if !signature::verify_webhook(&state.config.razorpay.webhook_secret, body, supplied) {
        return Err(AppError::InvalidSignature);
    }

    let envelope: WebhookEnvelope = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Malformed webhook payload: {}", e)))?;
    match envelope.into_action() {
        WebhookAction::Ignore { event } => {
            debug!(%event, "Webhook event ignored");
            Ok(WebhookAck { status: "ignored", transition: None })
        }
        WebhookAction::Apply { gateway_order_id, confirmation } => {
            match settle(state, &gateway_order_id, confirmation).await {
                Ok((_, transition)) => Ok(WebhookAck { status: "processed", transition: Some(transition) }),
                // acknowledged so the gateway stops retrying
                Err(AppError::Repository(RepositoryError::NotFound(_))) => {
                    warn!(%gateway_order_id, "Webhook for unknown gateway order");
                    Ok(WebhookAck { status: "ignored", transition: None })
                }
                Err(e) => Err(e),
            }
        }
    }
}

/// Applies a verified report and runs the side effects of a fresh transition exactly once.
async fn settle(state: &AppState, gateway_order_id: &str, confirmation: PaymentConfirmation) -> Result<(Order, Transition)> {
    let (mut order, transition) = state.repo.apply_payment(gateway_order_id, &confirmation).await?;
    match transition {
        Transition::Applied => {
            info!(
                order_number = %order.order_number,
                source = ?confirmation.source,
                payment_status = %order.payment_status,
                "Payment recorded"
            );
            state.events.publish_all(order.take_events()).await;
            if order.payment_status == PaymentStatus::Paid {
                dispatch_order_notifications(state.notifier.clone(), &state.config.business_phone, &order);
            }
        }
        Transition::AlreadyApplied => {
            debug!(order_number = %order.order_number, source = ?confirmation.source, "Payment report already applied");
        }
        Transition::Ignored => {
            info!(
                order_number = %order.order_number,
                source = ?confirmation.source,
                payment_status = %order.payment_status,
                "Payment report ignored"
            );
        }
    }
    Ok((order, transition))
}
