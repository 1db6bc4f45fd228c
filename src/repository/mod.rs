//! Persistence seam.
//!
//! `PgRepository` is the production store; `MemoryRepository` backs local development
//! without a database and the HTTP tests. Both apply payment and status changes to an order
//! while holding that order exclusively, so the client callback and the gateway webhook
//! never interleave.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{
    Order, OrderError, OrderStatus, PaymentConfirmation, PaymentStatus, Product, ProductImage, Transition, Variant,
};

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Insufficient stock for {sku}: {available} available")]
    InsufficientStock { sku: String, available: i32 },

    #[error("Duplicate {0}")]
    Duplicate(String),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Stored row is invalid: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, RepositoryError>;
    async fn product(&self, id: Uuid) -> Result<Option<Product>, RepositoryError>;
    async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError>;
    async fn categories(&self) -> Result<Vec<CategorySummary>, RepositoryError>;

    /// Inserts a new product with its variants and images, all or nothing.
    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError>;
    /// Inserts or updates the product's own fields. Variants and images are managed separately.
    async fn save_product(&self, product: &Product) -> Result<(), RepositoryError>;
    async fn deactivate_product(&self, id: Uuid) -> Result<(), RepositoryError>;
    async fn save_variant(&self, variant: &Variant) -> Result<(), RepositoryError>;
    async fn delete_variant(&self, id: Uuid) -> Result<(), RepositoryError>;
    async fn add_image(&self, product_id: Uuid, image: &ProductImage) -> Result<(), RepositoryError>;
    async fn remove_image(&self, product_id: Uuid, url: &str) -> Result<(), RepositoryError>;

    /// Persists a new order with its items and takes the ordered quantities out of stock,
    /// all or nothing.
    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError>;
    async fn order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError>;
    async fn order_by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError>;
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Page<Order>, RepositoryError>;

    async fn attach_gateway_order(&self, order_id: Uuid, gateway_order_id: &str) -> Result<Order, RepositoryError>;
    async fn apply_payment(&self, gateway_order_id: &str, confirmation: &PaymentConfirmation) -> Result<(Order, Transition), RepositoryError>;
    async fn set_order_status(&self, order_id: Uuid, status: OrderStatus) -> Result<Order, RepositoryError>;
    async fn set_payment_status(&self, order_id: Uuid, status: PaymentStatus) -> Result<Order, RepositoryError>;
}

/// Rows skipped before `page`; computed wide so any `u32` page is representable.
pub fn page_offset(page: u32, per_page: u32) -> u64 {
    u64::from(page.saturating_sub(1)) * u64::from(per_page)
}

#[derive(Debug, Serialize)]
pub struct Page<T> { pub data: Vec<T>, pub total: i64, pub page: u32, pub per_page: u32 }

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary { pub name: String, pub product_count: i64 }

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort { #[default] Newest, Name, PriceAsc, PriceDesc }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    #[serde(default)]
    pub sort: ProductSort,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[serde(skip)]
    pub include_inactive: bool,
}

impl ProductQuery {
    pub fn page(&self) -> u32 { self.page.unwrap_or(1).max(1) }
    pub fn per_page(&self) -> u32 { self.per_page.unwrap_or(20).clamp(1, 100) }
    pub fn offset(&self) -> u64 { page_offset(self.page(), self.per_page()) }

    pub fn search_term(&self) -> Option<&str> { self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) }

    pub fn matches(&self, product: &Product) -> bool {
        if !self.include_inactive && !product.is_active { return false; }
        if let Some(c) = self.category.as_deref() {
            if !product.category.eq_ignore_ascii_case(c) { return false; }
        }
        if let Some(f) = self.featured {
            if product.is_featured != f { return false; }
        }
        if let Some(term) = self.search_term() {
            let term = term.to_lowercase();
            let hit = product.name.to_lowercase().contains(&term)
                || product.description.as_deref().is_some_and(|d| d.to_lowercase().contains(&term))
                || product.notes.as_deref().is_some_and(|n| n.to_lowercase().contains(&term));
            if !hit { return false; }
        }
        if self.min_price.is_some() || self.max_price.is_some() {
            let in_range = product.variants.iter().any(|v| {
                self.min_price.map_or(true, |min| v.price >= min) && self.max_price.map_or(true, |max| v.price <= max)
            });
            if !in_range { return false; }
        }
        true
    }

    /// Sorts already-filtered products; products without variants sort last by price.
    pub fn sort(&self, products: &mut [Product]) {
        let min_price = |p: &Product| p.price_range().map(|(min, _)| min);
        match self.sort {
            ProductSort::Newest => products.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ProductSort::Name => products.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase())),
            ProductSort::PriceAsc => products.sort_by(|a, b| match (min_price(a), min_price(b)) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }),
            ProductSort::PriceDesc => products.sort_by(|a, b| match (min_price(a), min_price(b)) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl OrderFilter {
    pub fn page(&self) -> u32 { self.page.unwrap_or(1).max(1) }
    pub fn per_page(&self) -> u32 { self.per_page.unwrap_or(20).clamp(1, 100) }
    pub fn offset(&self) -> u64 { page_offset(self.page(), self.per_page()) }

    pub fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| order.status == s) && self.payment_status.map_or(true, |s| order.payment_status == s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::tests::product;

    #[test]
    fn test_query_filters() {
        let mut rose = product("Rose Attar", &[("Regular", 500, 3), ("Premium", 1200, 1)]);
        rose.notes = Some("Damask rose, saffron".into());
        let mut oud = product("Oud", &[("Premium", 2500, 2)]);
        oud.category = "Oud".into();
        oud.is_featured = true;

        let q = ProductQuery { search: Some(" saffron ".into()), ..Default::default() };
        assert!(q.matches(&rose) && !q.matches(&oud));

        let q = ProductQuery { min_price: Some(Decimal::new(1000, 0)), max_price: Some(Decimal::new(1500, 0)), ..Default::default() };
        assert!(q.matches(&rose) && !q.matches(&oud));

        let q = ProductQuery { category: Some("oud".into()), featured: Some(true), ..Default::default() };
        assert!(!q.matches(&rose) && q.matches(&oud));

        oud.is_active = false;
        assert!(!ProductQuery::default().matches(&oud));
        assert!(ProductQuery { include_inactive: true, ..Default::default() }.matches(&oud));
    }

    #[test]
    fn test_sort_by_price() {
        let mut products = vec![
            product("B", &[("Regular", 900, 1)]),
            product("A", &[("Regular", 300, 1)]),
            product("C", &[]),
        ];
        ProductQuery { sort: ProductSort::PriceAsc, ..Default::default() }.sort(&mut products);
        assert_eq!(products.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), ["A", "B", "C"]);
        ProductQuery { sort: ProductSort::PriceDesc, ..Default::default() }.sort(&mut products);
        assert_eq!(products.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), ["B", "A", "C"]);
    }

    #[test]
    fn test_pagination_bounds() {
        let q = ProductQuery { page: Some(0), per_page: Some(500), ..Default::default() };
        assert_eq!((q.page(), q.per_page(), q.offset()), (1, 100, 0));
        let q = ProductQuery { page: Some(3), per_page: Some(10), ..Default::default() };
        assert_eq!(q.offset(), 20);
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let q = ProductQuery { page: Some(u32::MAX), per_page: Some(100), ..Default::default() };
        assert_eq!(q.offset(), (u64::from(u32::MAX) - 1) * 100);
        let f = OrderFilter { page: Some(u32::MAX), per_page: Some(u32::MAX), ..Default::default() };
        assert_eq!(f.offset(), (u64::from(u32::MAX) - 1) * 100);
    }
}
