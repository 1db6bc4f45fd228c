//! Runtime configuration read from the environment.

use std::env;

use crate::error::{AppError, Result};

/// Contains secrets; not `Debug`.
#[derive(Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    /// Absent means the in-memory repository is used.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub nats_url: Option<String>,

    pub razorpay: RazorpayConfig,

    pub messaging_relay_url: Option<String>,
    pub business_phone: String,

    pub admin_password_hash: String,
    pub session_secret: String,
    pub admin_session_ttl_secs: i64,

    pub max_cart_items: u32,
    pub currency: String,
}

#[derive(Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
    pub api_base: String,
}

impl std::fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let required = |name: &str| {
            env::var(name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", name, e)))
        };
        let optional = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        let server_host = optional("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let server_port = parse_or(optional("PORT"), "PORT", 8083u16)?;
        let database_max_connections = parse_or(optional("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 10u32)?;
        let admin_session_ttl_secs = parse_or(optional("ADMIN_SESSION_TTL_SECS"), "ADMIN_SESSION_TTL_SECS", 86_400i64)?;
        let max_cart_items = parse_or(optional("MAX_CART_ITEMS"), "MAX_CART_ITEMS", 10u32)?;
        if max_cart_items == 0 {
            return Err(AppError::Config("MAX_CART_ITEMS must be at least 1".to_string()));
        }

        let admin_password_hash = required("ADMIN_PASSWORD_HASH")?.trim().to_lowercase();
        if admin_password_hash.len() != 64 || hex::decode(&admin_password_hash).is_err() {
            return Err(AppError::Config("ADMIN_PASSWORD_HASH must be a hex SHA-256 digest".to_string()));
        }

        let config = Self {
            server_host,
            server_port,
            database_url: optional("DATABASE_URL"),
            database_max_connections,
            nats_url: optional("NATS_URL"),
            razorpay: RazorpayConfig {
                key_id: required("RAZORPAY_KEY_ID")?,
                key_secret: required("RAZORPAY_KEY_SECRET")?,
                webhook_secret: required("RAZORPAY_WEBHOOK_SECRET")?,
                api_base: optional("RAZORPAY_API_BASE").unwrap_or_else(|| "https://api.razorpay.com/v1".to_string()),
            },
            messaging_relay_url: optional("MESSAGING_RELAY_URL"),
            business_phone: optional("BUSINESS_PHONE").unwrap_or_default(),
            admin_password_hash,
            session_secret: required("SESSION_SECRET")?,
            admin_session_ttl_secs,
            max_cart_items,
            currency: optional("STORE_CURRENCY").unwrap_or_else(|| crate::domain::value_objects::INR.to_string()),
        };

        tracing::info!(
            port = config.server_port,
            persistent = config.database_url.is_some(),
            nats = config.nats_url.is_some(),
            relay = config.messaging_relay_url.is_some(),
            "Application configuration loaded"
        );
        Ok(config)
    }

    pub fn bind_address(&self) -> String { format!("{}:{}", self.server_host, self.server_port) }
}

fn parse_or<T>(value: Option<String>, name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => v.trim().parse().map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or() {
        assert_eq!(parse_or(None, "PORT", 8083u16).unwrap(), 8083);
        assert_eq!(parse_or(Some(" 9000 ".into()), "PORT", 8083u16).unwrap(), 9000);
        assert!(matches!(parse_or(Some("abc".into()), "PORT", 8083u16), Err(AppError::Config(_))));
    }

    #[test]
    fn test_secrets_are_redacted() {
        let rp = RazorpayConfig { key_id: "rzp_test".into(), key_secret: "s3cret".into(), webhook_secret: "wh".into(), api_base: "x".into() };
        let printed = format!("{:?}", rp);
        assert!(printed.contains("rzp_test"));
        assert!(!printed.contains("s3cret"));
    }
}
