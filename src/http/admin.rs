//! Admin panel handlers. Everything except `login` sits behind `auth::require_admin`.

use axum::extract::{FromRequest, Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::{Form, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth;
use crate::domain::aggregates::{Product, Variant};
use crate::error::{AppError, Result};
use crate::repository::{OrderFilter, Page, ProductQuery};
use crate::services::admin::{self, ImageInput, ImageRef, PaymentStatusUpdate, ProductInput, StatusUpdate, VariantInput};
use crate::services::orders::OrderView;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginForm { pub password: String }

/// Accepts a JSON body or an HTML form post.
pub async fn login(State(s): State<AppState>, jar: CookieJar, request: Request) -> Result<(CookieJar, Json<Value>)> {
    let is_json = request.headers().get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    let form = if is_json {
        Json::<LoginForm>::from_request(request, &s).await.map_err(|e| AppError::Validation(e.body_text()))?.0
    } else {
        Form::<LoginForm>::from_request(request, &s).await.map_err(|e| AppError::Validation(e.body_text()))?.0
    };
    let cookie = auth::login(&s.config, &form.password, chrono::Utc::now().timestamp())?;
    Ok((jar.add(cookie), Json(json!({"authenticated": true}))))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<Value>) {
    (auth::logout(jar), Json(json!({"authenticated": false})))
}

pub async fn list_products(State(s): State<AppState>, Query(q): Query<ProductQuery>) -> Result<Json<Page<Product>>> {
    Ok(Json(admin::list_products(&s, q).await?))
}

pub async fn create_product(State(s): State<AppState>, Json(input): Json<ProductInput>) -> Result<(StatusCode, Json<Product>)> {
    Ok((StatusCode::CREATED, Json(admin::create_product(&s, input).await?)))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Product>> {
    Ok(Json(admin::get_product(&s, id).await?))
}

pub async fn update_product(State(s): State<AppState>, Path(id): Path<Uuid>, Json(input): Json<ProductInput>) -> Result<Json<Product>> {
    Ok(Json(admin::update_product(&s, id, input).await?))
}

pub async fn delete_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    admin::delete_product(&s, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_variant(State(s): State<AppState>, Path(id): Path<Uuid>, Json(input): Json<VariantInput>) -> Result<(StatusCode, Json<Variant>)> {
    Ok((StatusCode::CREATED, Json(admin::add_variant(&s, id, input).await?)))
}

pub async fn update_variant(State(s): State<AppState>, Path((id, variant_id)): Path<(Uuid, Uuid)>, Json(input): Json<VariantInput>) -> Result<Json<Variant>> {
    Ok(Json(admin::update_variant(&s, id, variant_id, input).await?))
}

pub async fn delete_variant(State(s): State<AppState>, Path((id, variant_id)): Path<(Uuid, Uuid)>) -> Result<StatusCode> {
    admin::delete_variant(&s, id, variant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_image(State(s): State<AppState>, Path(id): Path<Uuid>, Json(input): Json<ImageInput>) -> Result<(StatusCode, Json<Product>)> {
    Ok((StatusCode::CREATED, Json(admin::add_image(&s, id, input).await?)))
}

pub async fn remove_image(State(s): State<AppState>, Path(id): Path<Uuid>, Query(image): Query<ImageRef>) -> Result<Json<Product>> {
    Ok(Json(admin::remove_image(&s, id, &image.url).await?))
}

pub async fn list_orders(State(s): State<AppState>, Query(filter): Query<OrderFilter>) -> Result<Json<Page<OrderView>>> {
    Ok(Json(admin::list_orders(&s, filter).await?))
}

pub async fn get_order(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<OrderView>> {
    Ok(Json(admin::get_order(&s, id).await?))
}

pub async fn set_order_status(State(s): State<AppState>, Path(id): Path<Uuid>, Json(update): Json<StatusUpdate>) -> Result<Json<OrderView>> {
    Ok(Json(admin::set_order_status(&s, id, update.status).await?))
}

pub async fn set_payment_status(State(s): State<AppState>, Path(id): Path<Uuid>, Json(update): Json<PaymentStatusUpdate>) -> Result<Json<OrderView>> {
    Ok(Json(admin::set_payment_status(&s, id, update.payment_status).await?))
}
