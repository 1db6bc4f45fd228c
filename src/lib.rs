//! Attar Storefront
//!
//! Backend for a perfume and attar shop.
//!
//! ## Features
//! - Product catalog with quality/volume variants
//! - Session carts with a capacity limit
//! - Checkout with cash on delivery or Razorpay
//! - Signature-verified payment confirmation from both the client and the gateway webhook
//! - Order notifications through a messaging relay
//! - Password-gated admin panel

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod notify;
pub mod payment;
pub mod publisher;
pub mod repository;
pub mod services;
pub mod state;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use http::router;
pub use state::AppState;
