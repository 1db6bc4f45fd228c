#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use attar_storefront::auth::hash_password;
use attar_storefront::config::RazorpayConfig;
use attar_storefront::domain::aggregates::{Product, ProductImage, Variant};
use attar_storefront::domain::value_objects::Sku;
use attar_storefront::notify::{Notification, Notifier, NotifyError};
use attar_storefront::payment::{GatewayError, GatewayOrder, PaymentGateway};
use attar_storefront::publisher::EventPublisher;
use attar_storefront::repository::MemoryRepository;
use attar_storefront::{router, AppConfig, AppState};

pub const KEY_SECRET: &str = "test_key_secret";
pub const WEBHOOK_SECRET: &str = "test_webhook_secret";
pub const ADMIN_PASSWORD: &str = "open-sesame";
pub const BUSINESS_PHONE: &str = "9000000000";

#[derive(Default)]
pub struct FakeGateway {
    pub created: Mutex<Vec<GatewayOrder>>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn key_id(&self) -> &str { "rzp_test_key" }

    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> Result<GatewayOrder, GatewayError> {
        let mut created = self.created.lock().unwrap();
        let order = GatewayOrder {
            id: format!("order_test_{}", created.len() + 1),
            amount: amount_minor,
            currency: currency.to_string(),
            receipt: Some(receipt.to_string()),
            status: "created".to_string(),
        };
        created.push(order.clone());
        Ok(order)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

impl RecordingNotifier {
    pub fn count(&self) -> usize { self.sent.lock().unwrap().len() }

    /// Notifications go out on a spawned task.
    pub async fn wait_for(&self, n: usize) -> usize {
        for _ in 0..50 {
            if self.count() >= n { break; }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.count()
    }
}

pub fn config() -> AppConfig {
    AppConfig {
        server_host: "127.0.0.1".into(),
        server_port: 0,
        database_url: None,
        database_max_connections: 1,
        nats_url: None,
        razorpay: RazorpayConfig {
            key_id: "rzp_test_key".into(),
            key_secret: KEY_SECRET.into(),
            webhook_secret: WEBHOOK_SECRET.into(),
            api_base: "http://localhost:0".into(),
        },
        messaging_relay_url: None,
        business_phone: BUSINESS_PHONE.into(),
        admin_password_hash: hash_password(ADMIN_PASSWORD),
        session_secret: "test_session_secret".into(),
        admin_session_ttl_secs: 3600,
        max_cart_items: 10,
        currency: "INR".into(),
    }
}

fn variant(product_id: Uuid, quality: &str, volume_ml: i32, price: i64, mrp: i64, stock: i32) -> Variant {
    Variant {
        id: Uuid::new_v4(), product_id, quality: quality.into(), volume_ml,
        price: Decimal::new(price, 0), mrp: Decimal::new(mrp, 0), stock,
        sku: Sku::new(format!("ROSE-{}-{}", quality, volume_ml)).unwrap(),
    }
}

/// Rose Attar: Regular 6ml at 500 (stock 10), Premium 12ml at 1200 (stock 5).
pub fn rose_attar() -> Product {
    let id = Uuid::new_v4();
    Product {
        id,
        name: "Rose Attar".into(),
        slug: "rose-attar".into(),
        category: "Floral".into(),
        description: Some("Steam-distilled Kannauj rose".into()),
        notes: Some("Rose, sandalwood".into()),
        is_featured: true,
        is_active: true,
        variants: vec![variant(id, "Regular", 6, 500, 650, 10), variant(id, "Premium", 12, 1200, 1500, 5)],
        images: vec![ProductImage { url: "https://cdn.example.com/rose.jpg".into(), alt: None, position: 0 }],
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub product: Product,
}

impl TestApp {
    pub fn new() -> Self {
        let product = rose_attar();
        let repo = Arc::new(MemoryRepository::with_products([product.clone()]));
        let gateway = Arc::new(FakeGateway::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::new(config(), repo, gateway.clone(), notifier.clone(), EventPublisher::disabled());
        Self { router: router(state.clone()), state, gateway, notifier, product }
    }

    pub fn regular(&self) -> &Variant { &self.product.variants[0] }
    pub fn premium(&self) -> &Variant { &self.product.variants[1] }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
        (status, headers, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let (status, _, body) = self.send(Request::get(uri).body(Body::empty()).unwrap()).await;
        (status, body)
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        let (status, _, body) = self.send(Request::delete(uri).body(Body::empty()).unwrap()).await;
        (status, body)
    }

    pub async fn json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let (status, _, body) = self.send(json_request(method, uri, &body)).await;
        (status, body)
    }

    pub async fn add_to_cart(&self, session: &str, variant: &Variant, quantity: u32) -> (StatusCode, Value) {
        self.json("POST", &format!("/api/v1/cart/{}/items", session), serde_json::json!({
            "product_id": self.product.id, "variant_id": variant.id, "quantity": quantity,
        })).await
    }

    pub async fn checkout(&self, session: &str, payment_method: &str) -> (StatusCode, Value) {
        self.json("POST", "/api/v1/checkout", checkout_body(session, payment_method)).await
    }

    pub async fn admin_cookie(&self) -> String {
        let (status, headers, _) = self.send(json_request("POST", "/admin/login", &serde_json::json!({"password": ADMIN_PASSWORD}))).await;
        assert_eq!(status, StatusCode::OK);
        set_cookie_pair(&headers)
    }
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn checkout_body(session: &str, payment_method: &str) -> Value {
    serde_json::json!({
        "session_id": session,
        "name": "Asha Verma",
        "phone": "+919876543210",
        "email": "asha@example.com",
        "address_line1": "12 MG Road",
        "city": "Lucknow",
        "state": "Uttar Pradesh",
        "pincode": "226001",
        "payment_method": payment_method,
    })
}

/// `name=value` part of the first `Set-Cookie` header.
pub fn set_cookie_pair(headers: &HeaderMap) -> String {
    let raw = headers.get(header::SET_COOKIE).expect("Set-Cookie header").to_str().unwrap();
    raw.split(';').next().unwrap().trim().to_string()
}
