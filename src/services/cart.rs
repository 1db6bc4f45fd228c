//! Session carts.
//!
//! Each shopper session owns one `Cart`, created on first access. The map lives in process
//! memory; carts do not survive a restart.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{AddOutcome, Cart, CartItem, CartKey};
use crate::error::{AppError, Result};
use crate::state::AppState;

const MAX_SESSION_ID_LEN: usize = 128;

#[derive(Clone)]
pub struct CartSessions {
    carts: Arc<RwLock<HashMap<String, Cart>>>,
    max_items: u32,
    currency: String,
}

impl CartSessions {
    pub fn new(max_items: u32, currency: &str) -> Self {
        Self { carts: Arc::default(), max_items, currency: currency.to_string() }
    }

    /// Copy of the session's cart; an unknown session reads as an empty cart.
    pub async fn snapshot(&self, session_id: &str) -> Cart {
        self.carts.read().await.get(session_id).cloned()
            .unwrap_or_else(|| Cart::new(self.max_items, &self.currency))
    }

    /// Runs `f` against the session's cart under the write lock.
    pub async fn update<R>(&self, session_id: &str, f: impl FnOnce(&mut Cart) -> R) -> (R, Cart) {
        let mut carts = self.carts.write().await;
        let cart = carts.entry(session_id.to_string())
            .or_insert_with(|| Cart::new(self.max_items, &self.currency));
        let result = f(cart);
        (result, cart.clone())
    }

    /// Removes what was just ordered from the session's cart, keeping anything added since
    /// the order was taken. An emptied cart is dropped.
    pub async fn remove_ordered(&self, session_id: &str, ordered: &Cart) {
        let mut carts = self.carts.write().await;
        if let Some(cart) = carts.get_mut(session_id) {
            cart.remove_ordered(ordered.items());
            if cart.is_empty() {
                carts.remove(session_id);
            }
        }
    }
}

pub fn validate_session_id(session_id: &str) -> Result<()> {
    let ok = !session_id.is_empty()
        && session_id.len() <= MAX_SESSION_ID_LEN
        && session_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok { Ok(()) } else { Err(AppError::Validation("Invalid cart session id".to_string())) }
}

#[derive(Debug, Serialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub item: CartItem,
    pub line_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub session_id: String,
    pub items: Vec<CartLine>,
    pub total_items: u32,
    pub total_price: Decimal,
    pub formatted_total: String,
    pub currency: String,
    pub max_items: u32,
    pub remaining_capacity: u32,
}

impl CartView {
    pub fn new(session_id: &str, cart: &Cart) -> Self {
        let total = cart.total_price();
        Self {
            session_id: session_id.to_string(),
            items: cart.items().iter().map(|i| CartLine { item: i.clone(), line_total: i.line_total() }).collect(),
            total_items: cart.total_items(),
            total_price: total.amount(),
            formatted_total: total.to_string(),
            currency: total.currency().to_string(),
            max_items: cart.max_items(),
            remaining_capacity: cart.remaining_capacity(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CartItemRequest {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct AddItemResponse {
    pub cart: CartView,
    pub added: u32,
    pub truncated: bool,
    pub message: String,
}

pub async fn get_cart(state: &AppState, session_id: &str) -> Result<CartView> {
    validate_session_id(session_id)?;
    Ok(CartView::new(session_id, &state.carts.snapshot(session_id).await))
}

/// Adds a catalog variant with its current price. The quantity is cut down to what is in
/// stock and to what the cart can still hold.
#[instrument(skip(state), fields(product_id = %request.product_id, variant_id = %request.variant_id), err(Display))]
pub async fn add_item(state: &AppState, session_id: &str, request: CartItemRequest) -> Result<AddItemResponse> {
    validate_session_id(session_id)?;
    let product = state.repo.product(request.product_id).await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
    let variant = product.variant(request.variant_id).ok_or_else(|| AppError::NotFound("Variant".to_string()))?;
    if !variant.in_stock() {
        return Err(AppError::Validation(format!("{} ({}) is out of stock", product.name, variant.label())));
    }

    let stock = u32::try_from(variant.stock).unwrap_or(0);
    let label = format!("{} ({})", product.name, variant.label());
    let mut item = CartItem::from_catalog(&product, variant, request.quantity);
    let (outcome, cart) = state.carts.update(session_id, |cart| {
        let available = stock.saturating_sub(cart.quantity_of(item.key()));
        if available == 0 && item.quantity > 0 {
            return Err(AppError::Validation(format!("Only {} of {} in stock", stock, label)));
        }
        // stock binds when it is tighter than the cart's remaining capacity
        let stock_limited = item.quantity > available && available <= cart.remaining_capacity();
        item.quantity = item.quantity.min(available);
        Ok((cart.add_item(item)?, stock_limited))
    }).await;
    let (AddOutcome { added, truncated }, stock_limited) = outcome?;
    debug!(added, truncated, stock_limited, total_items = cart.total_items(), "Cart updated");

    let message = if stock_limited {
        format!("Only {} added; {} in stock", added, stock)
    } else if truncated {
        format!("Only {} added; a cart holds at most {} items", added, cart.max_items())
    } else {
        format!("Added {} to cart", added)
    };
    let truncated = truncated || stock_limited;
    Ok(AddItemResponse { cart: CartView::new(session_id, &cart), added, truncated, message })
}

pub async fn update_item(state: &AppState, session_id: &str, request: CartItemRequest) -> Result<CartView> {
    validate_session_id(session_id)?;
    let key = CartKey { product_id: request.product_id, variant_id: request.variant_id };
    let (result, cart) = state.carts.update(session_id, |cart| cart.update_quantity(key, request.quantity)).await;
    result?;
    Ok(CartView::new(session_id, &cart))
}

pub async fn remove_item(state: &AppState, session_id: &str, key: CartKey) -> Result<CartView> {
    validate_session_id(session_id)?;
    let (result, cart) = state.carts.update(session_id, |cart| cart.remove_item(key)).await;
    result?;
    Ok(CartView::new(session_id, &cart))
}

pub async fn clear(state: &AppState, session_id: &str) -> Result<CartView> {
    validate_session_id(session_id)?;
    let ((), cart) = state.carts.update(session_id, Cart::clear).await;
    Ok(CartView::new(session_id, &cart))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_rules() {
        assert!(validate_session_id("c0ffee-42_x").is_ok());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id("../etc").is_err());
        assert!(validate_session_id(&"a".repeat(129)).is_err());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let sessions = CartSessions::new(10, "INR");
        let ((), _) = sessions.update("a", |c| c.clear()).await;
        assert_eq!(sessions.snapshot("b").await.max_items(), 10);
        assert!(sessions.snapshot("a").await.is_empty());
        assert_eq!(sessions.carts.read().await.len(), 1);
    }

    fn line(quantity: u32) -> CartItem {
        CartItem {
            product_id: Uuid::new_v4(), variant_id: Uuid::new_v4(), name: "Attar".into(), slug: "attar".into(),
            quality: "Regular".into(), volume_ml: 6, unit_price: Decimal::new(500, 0), mrp: Decimal::new(600, 0),
            image_url: None, quantity,
        }
    }

    #[tokio::test]
    async fn test_checkout_keeps_lines_added_meanwhile() {
        let sessions = CartSessions::new(10, "INR");
        let ordered_line = line(2);
        let _ = sessions.update("s", |c| c.add_item(ordered_line.clone())).await;
        let ordered = sessions.snapshot("s").await;

        let late = line(1);
        let _ = sessions.update("s", |c| c.add_item(late.clone())).await;
        sessions.remove_ordered("s", &ordered).await;

        let left = sessions.snapshot("s").await;
        assert_eq!(left.items(), &[late]);

        sessions.remove_ordered("s", &left).await;
        assert!(sessions.carts.read().await.get("s").is_none());
    }
}
