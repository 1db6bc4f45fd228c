//! HTTP surface: storefront API under `/api/v1`, admin panel under `/admin`.

pub mod admin;
pub mod storefront;

use axum::routing::{delete, get, patch, post, put};
use axum::{middleware, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::require_admin;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/products", get(storefront::list_products))
        .route("/products/:slug", get(storefront::product_detail))
        .route("/categories", get(storefront::categories))
        .route("/cart/:session", get(storefront::get_cart).delete(storefront::clear_cart))
        .route("/cart/:session/items", post(storefront::add_to_cart).patch(storefront::update_cart_item))
        .route("/cart/:session/items/:product_id/:variant_id", delete(storefront::remove_cart_item))
        .route("/checkout", post(storefront::checkout))
        .route("/orders/:order_number", get(storefront::track_order))
        .route("/payments/orders", post(storefront::create_payment_order))
        .route("/payments/verify", post(storefront::verify_payment))
        .route("/payments/webhook", post(storefront::payment_webhook));

    let admin = Router::new()
        .route("/logout", post(admin::logout))
        .route("/products", get(admin::list_products).post(admin::create_product))
        .route("/products/:id", get(admin::get_product).put(admin::update_product).delete(admin::delete_product))
        .route("/products/:id/variants", post(admin::add_variant))
        .route("/products/:id/variants/:variant_id", put(admin::update_variant).delete(admin::delete_variant))
        .route("/products/:id/images", post(admin::add_image).delete(admin::remove_image))
        .route("/orders", get(admin::list_orders))
        .route("/orders/:id", get(admin::get_order))
        .route("/orders/:id/status", patch(admin::set_order_status))
        .route("/orders/:id/payment", patch(admin::set_payment_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .route("/login", post(admin::login));

    Router::new()
        .route("/health", get(storefront::health))
        .nest("/api/v1", api)
        .nest("/admin", admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
