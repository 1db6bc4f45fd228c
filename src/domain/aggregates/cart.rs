//! Cart Aggregate
//!
//! A cart belongs to one shopper session. Lines are keyed by product and variant, each
//! carrying the price snapshot taken when the line was added. Totals are derived from the
//! lines on every read.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::product::{Product, Variant};
use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartKey { pub product_id: Uuid, pub variant_id: Uuid }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub name: String,
    pub slug: String,
    pub quality: String,
    pub volume_ml: i32,
    pub unit_price: Decimal,
    pub mrp: Decimal,
    pub image_url: Option<String>,
    pub quantity: u32,
}

impl CartItem {
    pub fn from_catalog(product: &Product, variant: &Variant, quantity: u32) -> Self {
        Self {
            product_id: product.id, variant_id: variant.id, name: product.name.clone(), slug: product.slug.clone(),
            quality: variant.quality.clone(), volume_ml: variant.volume_ml, unit_price: variant.price, mrp: variant.mrp,
            image_url: product.primary_image().map(|i| i.url.clone()), quantity,
        }
    }
    pub fn key(&self) -> CartKey { CartKey { product_id: self.product_id, variant_id: self.variant_id } }
    pub fn line_total(&self) -> Decimal { self.unit_price * Decimal::from(self.quantity) }
}

/// What `Cart::add_item` actually did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AddOutcome { pub added: u32, pub truncated: bool }

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
    max_items: u32,
    currency: String,
}

impl Cart {
    pub fn new(max_items: u32, currency: &str) -> Self {
        Self { items: vec![], max_items, currency: currency.to_string() }
    }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn max_items(&self) -> u32 { self.max_items }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn total_items(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }
    pub fn total_price(&self) -> Money {
        Money::new(self.items.iter().map(CartItem::line_total).sum(), &self.currency)
    }
    pub fn remaining_capacity(&self) -> u32 { self.max_items.saturating_sub(self.total_items()) }

    pub fn add_item(&mut self, mut item: CartItem) -> Result<AddOutcome, CartError> {
        if item.quantity == 0 { return Err(CartError::InvalidQuantity); }
        let remaining = self.remaining_capacity();
        if remaining == 0 { return Err(CartError::Full { max: self.max_items }); }

        let added = item.quantity.min(remaining);
        let truncated = added < item.quantity;
        let key = item.key();
        if let Some(existing) = self.items.iter_mut().find(|i| i.key() == key) {
            existing.quantity += added;
            // refresh the snapshot with the latest catalog data
            existing.unit_price = item.unit_price;
            existing.mrp = item.mrp;
        } else {
            item.quantity = added;
            self.items.push(item);
        }
        Ok(AddOutcome { added, truncated })
    }

    /// Sets a line's quantity, clamped to at least one and to what the cart can still hold.
    pub fn update_quantity(&mut self, key: CartKey, quantity: u32) -> Result<u32, CartError> {
        let others: u32 = self.items.iter().filter(|i| i.key() != key).map(|i| i.quantity).sum();
        let ceiling = self.max_items.saturating_sub(others).max(1);
        let item = self.items.iter_mut().find(|i| i.key() == key).ok_or(CartError::ItemNotFound)?;
        item.quantity = quantity.clamp(1, ceiling);
        Ok(item.quantity)
    }

    pub fn remove_item(&mut self, key: CartKey) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.key() != key);
        if self.items.len() == before { return Err(CartError::ItemNotFound); }
        Ok(())
    }

    pub fn quantity_of(&self, key: CartKey) -> u32 {
        self.items.iter().find(|i| i.key() == key).map_or(0, |i| i.quantity)
    }

    /// Takes the quantities of `ordered` out of the cart. Lines added after the order was
    /// taken, or quantities beyond it, stay.
    pub fn remove_ordered(&mut self, ordered: &[CartItem]) {
        for line in ordered {
            if let Some(item) = self.items.iter_mut().find(|i| i.key() == line.key()) {
                item.quantity = item.quantity.saturating_sub(line.quantity);
            }
        }
        self.items.retain(|i| i.quantity > 0);
    }

    pub fn clear(&mut self) { self.items.clear(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Item not found in cart")]
    ItemNotFound,
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Cart is full (maximum {max} items)")]
    Full { max: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(price: i64, quantity: u32) -> CartItem {
        CartItem {
            product_id: Uuid::new_v4(), variant_id: Uuid::new_v4(), name: "Attar".into(), slug: "attar".into(),
            quality: "Regular".into(), volume_ml: 6, unit_price: Decimal::new(price, 0), mrp: Decimal::new(price, 0),
            image_url: None, quantity,
        }
    }

    #[test]
    fn test_cart_totals() {
        let mut cart = Cart::new(10, "INR");
        cart.add_item(item(500, 2)).unwrap();
        cart.add_item(item(1200, 1)).unwrap();
        assert_eq!(cart.total_items(), 3);
        assert_eq!(cart.total_price().amount(), Decimal::new(2200, 0));
        assert_eq!(cart.remaining_capacity(), 7);
    }

    #[test]
    fn test_add_merges_same_key() {
        let mut cart = Cart::new(10, "INR");
        let first = item(500, 2);
        let mut again = first.clone();
        again.quantity = 3;
        cart.add_item(first).unwrap();
        cart.add_item(again).unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 5);
    }

    #[test]
    fn test_add_truncates_at_capacity() {
        let mut cart = Cart::new(5, "INR");
        cart.add_item(item(500, 4)).unwrap();
        let outcome = cart.add_item(item(300, 3)).unwrap();
        assert_eq!(outcome, AddOutcome { added: 1, truncated: true });
        assert_eq!(cart.total_items(), 5);
        assert_eq!(cart.add_item(item(100, 1)), Err(CartError::Full { max: 5 }));
    }

    #[test]
    fn test_update_quantity_is_clamped() {
        let mut cart = Cart::new(6, "INR");
        let a = item(500, 2);
        let key = a.key();
        cart.add_item(a).unwrap();
        cart.add_item(item(100, 3)).unwrap();
        assert_eq!(cart.update_quantity(key, 0).unwrap(), 1);
        assert_eq!(cart.update_quantity(key, 50).unwrap(), 3);
        assert_eq!(cart.total_items(), 6);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::new(10, "INR");
        let a = item(500, 1);
        let key = a.key();
        cart.add_item(a).unwrap();
        cart.add_item(item(200, 1)).unwrap();
        cart.remove_item(key).unwrap();
        assert_eq!(cart.remove_item(key), Err(CartError::ItemNotFound));
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total_price().amount(), Decimal::ZERO);
    }

    #[test]
    fn test_remove_ordered_keeps_later_additions() {
        let mut cart = Cart::new(10, "INR");
        let a = item(500, 2);
        let b = item(300, 1);
        cart.add_item(a.clone()).unwrap();
        let ordered = cart.items().to_vec();

        let mut more_a = a.clone();
        more_a.quantity = 1;
        cart.add_item(more_a).unwrap();
        cart.add_item(b.clone()).unwrap();

        cart.remove_ordered(&ordered);
        assert_eq!(cart.quantity_of(a.key()), 1);
        assert_eq!(cart.quantity_of(b.key()), 1);
        assert_eq!(cart.total_items(), 2);

        let rest = cart.items().to_vec();
        cart.remove_ordered(&rest);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut cart = Cart::new(10, "INR");
        assert_eq!(cart.add_item(item(500, 0)), Err(CartError::InvalidQuantity));
    }

    proptest! {
        #[test]
        fn total_items_never_exceed_max(max in 1u32..30, ops in prop::collection::vec((0usize..4, 0u32..15, any::<bool>()), 1..40)) {
            let pool: Vec<CartItem> = (0..4).map(|i| item(100 * (i as i64 + 1), 1)).collect();
            let mut cart = Cart::new(max, "INR");
            for (idx, qty, is_update) in ops {
                let mut line = pool[idx].clone();
                if is_update {
                    let _ = cart.update_quantity(line.key(), qty);
                } else {
                    line.quantity = qty;
                    let _ = cart.add_item(line);
                }
                prop_assert!(cart.total_items() <= max);
            }
        }
    }
}
