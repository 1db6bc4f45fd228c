//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::Sku;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub category: String,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub is_featured: bool,
    pub is_active: bool,
    pub variants: Vec<Variant>,
    pub images: Vec<ProductImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quality: String,
    pub volume_ml: i32,
    pub price: Decimal,
    pub mrp: Decimal,
    pub stock: i32,
    pub sku: Sku,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage { pub url: String, pub alt: Option<String>, pub position: i32 }

impl Variant {
    pub fn validate(&self) -> Result<(), ProductError> {
        if self.price <= Decimal::ZERO { return Err(ProductError::InvalidPrice); }
        if self.price > self.mrp { return Err(ProductError::PriceAboveMrp { price: self.price, mrp: self.mrp }); }
        if self.stock < 0 { return Err(ProductError::NegativeStock); }
        if self.volume_ml <= 0 { return Err(ProductError::InvalidVolume); }
        Ok(())
    }

    pub fn in_stock(&self) -> bool { self.stock > 0 }

    pub fn discount_percent(&self) -> u32 { discount_percent(self.price, self.mrp) }

    pub fn label(&self) -> String { format!("{} {}ml", self.quality, self.volume_ml) }
}

impl Product {
    pub fn variant(&self, variant_id: Uuid) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    /// Picks the variant for a quality tier. Without a tier, the cheapest in-stock
    /// variant wins, then the cheapest overall.
    pub fn resolve_variant(&self, quality: Option<&str>) -> Option<&Variant> {
        if let Some(q) = quality {
            return self.variants.iter()
                .filter(|v| v.quality.eq_ignore_ascii_case(q))
                .min_by(|a, b| a.price.cmp(&b.price));
        }
        self.variants.iter().filter(|v| v.in_stock()).min_by(|a, b| a.price.cmp(&b.price))
            .or_else(|| self.variants.iter().min_by(|a, b| a.price.cmp(&b.price)))
    }

    pub fn price_range(&self) -> Option<(Decimal, Decimal)> {
        let min = self.variants.iter().map(|v| v.price).min()?;
        let max = self.variants.iter().map(|v| v.price).max()?;
        Some((min, max))
    }

    pub fn primary_image(&self) -> Option<&ProductImage> {
        self.images.iter().min_by_key(|i| i.position)
    }

    pub fn is_in_stock(&self) -> bool { self.variants.iter().any(Variant::in_stock) }
}

/// Whole-number discount of `price` against `mrp`, rounded half away from zero.
pub fn discount_percent(price: Decimal, mrp: Decimal) -> u32 {
    if mrp <= Decimal::ZERO || price >= mrp { return 0; }
    ((mrp - price) / mrp * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(0)
}

/// Lower-case, ASCII alphanumerics separated by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut dash = false;
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }
    while slug.ends_with('-') { slug.pop(); }
    slug
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProductError {
    #[error("Missing name")]
    MissingName,
    #[error("Price must be positive")]
    InvalidPrice,
    #[error("Price {price} exceeds MRP {mrp}")]
    PriceAboveMrp { price: Decimal, mrp: Decimal },
    #[error("Stock cannot be negative")]
    NegativeStock,
    #[error("Volume must be positive")]
    InvalidVolume,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn variant(product_id: Uuid, quality: &str, price: i64, stock: i32) -> Variant {
        Variant {
            id: Uuid::new_v4(), product_id, quality: quality.into(), volume_ml: 6,
            price: Decimal::new(price, 0), mrp: Decimal::new(price + 100, 0), stock,
            sku: Sku::new(format!("SKU-{quality}-{price}")).unwrap(),
        }
    }

    pub(crate) fn product(name: &str, variants: &[(&str, i64, i32)]) -> Product {
        let id = Uuid::new_v4();
        Product {
            id, name: name.into(), slug: slugify(name), category: "Attar".into(), description: None, notes: None,
            is_featured: false, is_active: true,
            variants: variants.iter().map(|(q, p, s)| variant(id, q, *p, *s)).collect(),
            images: vec![], created_at: Utc::now(), updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolve_variant_defaults_to_cheapest_in_stock() {
        let p = product("Rose", &[("Premium", 900, 4), ("Regular", 500, 0), ("Luxury", 1500, 2)]);
        assert_eq!(p.resolve_variant(None).unwrap().quality, "Premium");
        assert_eq!(p.resolve_variant(Some("regular")).unwrap().price, Decimal::new(500, 0));
        assert!(p.resolve_variant(Some("Gold")).is_none());
    }

    #[test]
    fn test_resolve_variant_when_all_sold_out() {
        let p = product("Oud", &[("Premium", 900, 0), ("Regular", 500, 0)]);
        assert_eq!(p.resolve_variant(None).unwrap().quality, "Regular");
        assert!(!p.is_in_stock());
    }

    #[test]
    fn test_price_above_mrp_rejected() {
        let mut v = variant(Uuid::new_v4(), "Regular", 500, 1);
        v.mrp = Decimal::new(400, 0);
        assert!(matches!(v.validate(), Err(ProductError::PriceAboveMrp { .. })));
    }

    #[test]
    fn test_discount_percent() {
        assert_eq!(discount_percent(Decimal::new(750, 0), Decimal::new(1000, 0)), 25);
        assert_eq!(discount_percent(Decimal::new(999, 0), Decimal::new(1499, 0)), 33);
        assert_eq!(discount_percent(Decimal::new(1000, 0), Decimal::new(1000, 0)), 0);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Majmua Attar (Special) "), "majmua-attar-special");
        assert_eq!(slugify("Rose & Oud"), "rose-oud");
    }

    #[test]
    fn test_price_range() {
        let p = product("Musk", &[("Regular", 450, 1), ("Premium", 1200, 1)]);
        assert_eq!(p.price_range(), Some((Decimal::new(450, 0), Decimal::new(1200, 0))));
    }
}
