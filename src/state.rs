//! Shared application state.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::notify::Notifier;
use crate::payment::PaymentGateway;
use crate::publisher::EventPublisher;
use crate::repository::Repository;
use crate::services::cart::CartSessions;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub events: EventPublisher,
    pub carts: CartSessions,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        repo: Arc<dyn Repository>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        events: EventPublisher,
    ) -> Self {
        let carts = CartSessions::new(config.max_cart_items, &config.currency);
        Self { repo, gateway, notifier, events, carts, config: Arc::new(config) }
    }
}
