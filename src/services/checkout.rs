//! Checkout: turns a session cart into a persisted order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::aggregates::order::generate_order_number;
use crate::domain::aggregates::{Address, Cart, Customer, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus};
use crate::error::{AppError, Result};
use crate::notify::dispatch_order_notifications;
use crate::services::cart::validate_session_id;
use crate::state::AppState;

const ORDER_NUMBER_ATTEMPTS: usize = 5;

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutForm {
    pub session_id: String,
    #[validate(length(min = 2, max = 100, message = "Name must be 2-100 characters"))]
    pub name: String,
    #[validate(custom = "validate_phone")]
    pub phone: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 5, message = "Address must be at least 5 characters"))]
    pub address_line1: String,
    pub address_line2: Option<String>,
    #[validate(length(min = 2, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 2, message = "State is required"))]
    pub state: String,
    #[validate(custom = "validate_pincode")]
    pub pincode: String,
    pub payment_method: PaymentMethod,
    /// Total the shopper was shown. A mismatch means prices moved under them.
    pub expected_total: Option<Decimal>,
}

impl CheckoutForm {
    fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.phone = self.phone.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
        self.email = self.email.take().map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
        self.address_line1 = self.address_line1.trim().to_string();
        self.address_line2 = self.address_line2.take().map(|l| l.trim().to_string()).filter(|l| !l.is_empty());
        self.city = self.city.trim().to_string();
        self.state = self.state.trim().to_string();
        self.pincode = self.pincode.trim().to_string();
    }

    /// Phone number without the `+91` prefix.
    fn local_phone(&self) -> String {
        self.phone.strip_prefix("+91").unwrap_or(&self.phone).to_string()
    }
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let local = phone.strip_prefix("+91").unwrap_or(phone);
    let valid = local.len() == 10
        && local.chars().all(|c| c.is_ascii_digit())
        && matches!(local.as_bytes()[0], b'6'..=b'9');
    if valid { Ok(()) } else { Err(ValidationError::new("phone")) }
}

fn validate_pincode(pincode: &str) -> Result<(), ValidationError> {
    let valid = pincode.len() == 6 && pincode.chars().all(|c| c.is_ascii_digit()) && !pincode.starts_with('0');
    if valid { Ok(()) } else { Err(ValidationError::new("pincode")) }
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub order_number: String,
    pub total: Decimal,
    pub formatted_total: String,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Key the checkout widget is opened with; online payments only.
    pub razorpay_key_id: Option<String>,
}

/// Snapshots every cart line at the live catalog price, refusing lines that are gone or
/// short on stock.
async fn reconcile(state: &AppState, cart: &Cart) -> Result<Vec<OrderItem>> {
    let mut items = Vec::with_capacity(cart.items().len());
    for line in cart.items() {
        let product = state.repo.product(line.product_id).await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::Validation(format!("{} is no longer available", line.name)))?;
        let variant = product.variant(line.variant_id)
            .ok_or_else(|| AppError::Validation(format!("{} ({}) is no longer available", line.name, line.quality)))?;
        if i64::from(variant.stock) < i64::from(line.quantity) {
            return Err(AppError::Validation(format!(
                "Only {} left of {} ({})", variant.stock.max(0), product.name, variant.label()
            )));
        }
        items.push(OrderItem::new(
            product.id, variant.id, product.name.clone(), variant.quality.clone(), variant.volume_ml,
            variant.sku.to_string(), variant.price, line.quantity,
        ));
    }
    Ok(items)
}

async fn unused_order_number(state: &AppState) -> Result<String> {
    for _ in 0..ORDER_NUMBER_ATTEMPTS {
        let candidate = generate_order_number();
        if state.repo.order_by_number(&candidate).await?.is_none() {
            return Ok(candidate);
        }
    }
    Err(AppError::Internal("could not allocate an order number".to_string()))
}

#[instrument(skip(state, form), fields(session_id = %form.session_id, payment_method = %form.payment_method), err(Display))]
pub async fn place_order(state: &AppState, mut form: CheckoutForm) -> Result<CheckoutResponse> {
    validate_session_id(&form.session_id)?;
    form.normalize();
    form.validate()?;

    let cart = state.carts.snapshot(&form.session_id).await;
    if cart.is_empty() {
        return Err(AppError::Validation("Cart is empty".to_string()));
    }

    let items = reconcile(state, &cart).await?;
    let customer = Customer { name: form.name.clone(), phone: form.local_phone(), email: form.email.clone() };
    let address = Address {
        line1: form.address_line1.clone(), line2: form.address_line2.clone(), city: form.city.clone(),
        state: form.state.clone(), pincode: form.pincode.clone(),
    };
    let order_number = unused_order_number(state).await?;
    let mut order = Order::place(order_number, customer, address, form.payment_method, items, &state.config.currency)?;

    if let Some(expected) = form.expected_total {
        if expected != order.total {
            warn!(%expected, actual = %order.total, "Cart total changed before checkout");
            return Err(AppError::Conflict(format!(
                "Order total changed: expected {}, current total is {}", expected, order.total
            )));
        }
    }

    state.repo.insert_order(&order).await?;
    state.carts.remove_ordered(&form.session_id, &cart).await;
    info!(order_number = %order.order_number, total = %order.total, items = order.item_count(), "Order placed");

    state.events.publish_all(order.take_events()).await;
    if order.payment_method == PaymentMethod::Cod {
        dispatch_order_notifications(state.notifier.clone(), &state.config.business_phone, &order);
    }

    Ok(CheckoutResponse {
        order_id: order.id,
        formatted_total: order.total_money().to_string(),
        total: order.total,
        currency: order.currency.clone(),
        payment_method: order.payment_method,
        status: order.status,
        payment_status: order.payment_status,
        razorpay_key_id: (order.payment_method == PaymentMethod::Online).then(|| state.gateway.key_id().to_string()),
        order_number: order.order_number,
    })
}
