//! Public storefront handlers.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::aggregates::CartKey;
use crate::error::Result;
use crate::payment::webhook::SIGNATURE_HEADER;
use crate::repository::{CategorySummary, Page, ProductQuery};
use crate::services::cart::{self, AddItemResponse, CartItemRequest, CartView};
use crate::services::catalog::{self, ProductDetail, ProductSummary};
use crate::services::checkout::{self, CheckoutForm, CheckoutResponse};
use crate::services::orders::{self, OrderTracking};
use crate::services::payments::{self, CreatePaymentOrder, PaymentOrderResponse, VerifyPayment, VerifyResponse, WebhookAck};
use crate::state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "attar-storefront"}))
}

pub async fn list_products(State(s): State<AppState>, Query(q): Query<ProductQuery>) -> Result<Json<Page<ProductSummary>>> {
    Ok(Json(catalog::list_products(&s, q).await?))
}

#[derive(Debug, Deserialize)]
pub struct DetailParams { pub quality: Option<String> }

pub async fn product_detail(State(s): State<AppState>, Path(slug): Path<String>, Query(p): Query<DetailParams>) -> Result<Json<ProductDetail>> {
    Ok(Json(catalog::product_detail(&s, &slug, p.quality.as_deref()).await?))
}

pub async fn categories(State(s): State<AppState>) -> Result<Json<Vec<CategorySummary>>> {
    Ok(Json(catalog::categories(&s).await?))
}

pub async fn get_cart(State(s): State<AppState>, Path(session): Path<String>) -> Result<Json<CartView>> {
    Ok(Json(cart::get_cart(&s, &session).await?))
}

pub async fn clear_cart(State(s): State<AppState>, Path(session): Path<String>) -> Result<Json<CartView>> {
    Ok(Json(cart::clear(&s, &session).await?))
}

pub async fn add_to_cart(State(s): State<AppState>, Path(session): Path<String>, Json(req): Json<CartItemRequest>) -> Result<Json<AddItemResponse>> {
    Ok(Json(cart::add_item(&s, &session, req).await?))
}

pub async fn update_cart_item(State(s): State<AppState>, Path(session): Path<String>, Json(req): Json<CartItemRequest>) -> Result<Json<CartView>> {
    Ok(Json(cart::update_item(&s, &session, req).await?))
}

pub async fn remove_cart_item(State(s): State<AppState>, Path((session, product_id, variant_id)): Path<(String, Uuid, Uuid)>) -> Result<Json<CartView>> {
    Ok(Json(cart::remove_item(&s, &session, CartKey { product_id, variant_id }).await?))
}

pub async fn checkout(State(s): State<AppState>, Json(form): Json<CheckoutForm>) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    Ok((StatusCode::CREATED, Json(checkout::place_order(&s, form).await?)))
}

pub async fn track_order(State(s): State<AppState>, Path(order_number): Path<String>) -> Result<Json<OrderTracking>> {
    Ok(Json(orders::track_order(&s, &order_number).await?))
}

pub async fn create_payment_order(State(s): State<AppState>, Json(req): Json<CreatePaymentOrder>) -> Result<Json<PaymentOrderResponse>> {
    Ok(Json(payments::create_gateway_order(&s, req).await?))
}

pub async fn verify_payment(State(s): State<AppState>, Json(req): Json<VerifyPayment>) -> Result<(StatusCode, Json<VerifyResponse>)> {
    let outcome = payments::verify_payment(&s, req).await?;
    let status = if outcome.verified { StatusCode::OK } else { StatusCode::BAD_REQUEST };
    Ok((status, Json(outcome)))
}

pub async fn payment_webhook(State(s): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<WebhookAck>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    Ok(Json(payments::handle_webhook(&s, signature, &body).await?))
}
