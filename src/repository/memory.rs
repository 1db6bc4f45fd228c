//! In-process repository used when no database is configured.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{page_offset, CategorySummary, OrderFilter, Page, ProductQuery, Repository, RepositoryError};
use crate::domain::aggregates::{
    Order, OrderStatus, PaymentConfirmation, PaymentStatus, Product, ProductImage, Transition, Variant,
};
use crate::domain::value_objects::Sku;

#[derive(Default)]
struct Data {
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
}

#[derive(Default)]
pub struct MemoryRepository {
    data: RwLock<Data>,
}

impl MemoryRepository {
    pub fn new() -> Self { Self::default() }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products.into_iter().map(|p| (p.id, p)).collect();
        Self { data: RwLock::new(Data { products, orders: HashMap::new() }) }
    }

    async fn mutate_order<F>(&self, find: impl Fn(&Order) -> bool, what: &str, f: F) -> Result<Order, RepositoryError>
    where
        F: FnOnce(&mut Order) -> Result<(), RepositoryError>,
    {
        let mut data = self.data.write().await;
        let stored = data.orders.values_mut().find(|o| find(o)).ok_or_else(|| RepositoryError::NotFound(what.to_string()))?;
        let mut working = stored.clone();
        f(&mut working)?;
        let mut persisted = working.clone();
        persisted.take_events();
        *stored = persisted;
        Ok(working)
    }
}

fn paginate<T>(items: Vec<T>, page: u32, per_page: u32) -> Page<T> {
    let total = items.len() as i64;
    let skip = usize::try_from(page_offset(page, per_page)).unwrap_or(usize::MAX);
    let data = items.into_iter().skip(skip).take(per_page as usize).collect();
    Page { data, total, page, per_page }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, RepositoryError> {
        let data = self.data.read().await;
        let mut products: Vec<Product> = data.products.values().filter(|p| query.matches(p)).cloned().collect();
        query.sort(&mut products);
        Ok(paginate(products, query.page(), query.per_page()))
    }

    async fn product(&self, id: Uuid) -> Result<Option<Product>, RepositoryError> {
        Ok(self.data.read().await.products.get(&id).cloned())
    }

    async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        Ok(self.data.read().await.products.values().find(|p| p.slug == slug).cloned())
    }

    async fn categories(&self) -> Result<Vec<CategorySummary>, RepositoryError> {
        let data = self.data.read().await;
        let mut counts: HashMap<&str, i64> = HashMap::new();
        for p in data.products.values().filter(|p| p.is_active) {
            *counts.entry(p.category.as_str()).or_default() += 1;
        }
        let mut out: Vec<CategorySummary> = counts.into_iter()
            .map(|(name, product_count)| CategorySummary { name: name.to_string(), product_count })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        let mut data = self.data.write().await;
        if data.products.contains_key(&product.id) {
            return Err(RepositoryError::Duplicate(format!("product {}", product.id)));
        }
        if data.products.values().any(|p| p.slug == product.slug) {
            return Err(RepositoryError::Duplicate(format!("slug '{}'", product.slug)));
        }
        let mut skus: HashSet<&Sku> = data.products.values().flat_map(|p| p.variants.iter().map(|v| &v.sku)).collect();
        for variant in &product.variants {
            if !skus.insert(&variant.sku) {
                return Err(RepositoryError::Duplicate(format!("SKU '{}'", variant.sku)));
            }
        }
        let mut urls: HashSet<&str> = data.products.values().flat_map(|p| p.images.iter().map(|i| i.url.as_str())).collect();
        for image in &product.images {
            if !urls.insert(image.url.as_str()) {
                return Err(RepositoryError::Duplicate(format!("image '{}'", image.url)));
            }
        }
        data.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn save_product(&self, product: &Product) -> Result<(), RepositoryError> {
        let mut data = self.data.write().await;
        if data.products.values().any(|p| p.slug == product.slug && p.id != product.id) {
            return Err(RepositoryError::Duplicate(format!("slug '{}'", product.slug)));
        }
        match data.products.get_mut(&product.id) {
            Some(existing) => {
                existing.name = product.name.clone();
                existing.slug = product.slug.clone();
                existing.category = product.category.clone();
                existing.description = product.description.clone();
                existing.notes = product.notes.clone();
                existing.is_featured = product.is_featured;
                existing.is_active = product.is_active;
                existing.updated_at = Utc::now();
            }
            None => {
                data.products.insert(product.id, product.clone());
            }
        }
        Ok(())
    }

    async fn deactivate_product(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut data = self.data.write().await;
        let product = data.products.get_mut(&id).ok_or_else(|| RepositoryError::NotFound("product".into()))?;
        product.is_active = false;
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn save_variant(&self, variant: &Variant) -> Result<(), RepositoryError> {
        let mut data = self.data.write().await;
        let sku_taken = data.products.values()
            .flat_map(|p| p.variants.iter())
            .any(|v| v.sku == variant.sku && v.id != variant.id);
        if sku_taken {
            return Err(RepositoryError::Duplicate(format!("SKU '{}'", variant.sku)));
        }
        let product = data.products.get_mut(&variant.product_id).ok_or_else(|| RepositoryError::NotFound("product".into()))?;
        match product.variants.iter_mut().find(|v| v.id == variant.id) {
            Some(existing) => *existing = variant.clone(),
            None => product.variants.push(variant.clone()),
        }
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_variant(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut data = self.data.write().await;
        for product in data.products.values_mut() {
            let before = product.variants.len();
            product.variants.retain(|v| v.id != id);
            if product.variants.len() != before { return Ok(()); }
        }
        Err(RepositoryError::NotFound("variant".into()))
    }

    async fn add_image(&self, product_id: Uuid, image: &ProductImage) -> Result<(), RepositoryError> {
        let mut data = self.data.write().await;
        if data.products.values().flat_map(|p| p.images.iter()).any(|i| i.url == image.url) {
            return Err(RepositoryError::Duplicate(format!("image '{}'", image.url)));
        }
        let product = data.products.get_mut(&product_id).ok_or_else(|| RepositoryError::NotFound("product".into()))?;
        product.images.push(image.clone());
        Ok(())
    }

    async fn remove_image(&self, product_id: Uuid, url: &str) -> Result<(), RepositoryError> {
        let mut data = self.data.write().await;
        let product = data.products.get_mut(&product_id).ok_or_else(|| RepositoryError::NotFound("product".into()))?;
        let before = product.images.len();
        product.images.retain(|i| i.url != url);
        if product.images.len() == before { return Err(RepositoryError::NotFound("image".into())); }
        Ok(())
    }

    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut data = self.data.write().await;
        if data.orders.values().any(|o| o.order_number == order.order_number) {
            return Err(RepositoryError::Duplicate(format!("order number '{}'", order.order_number)));
        }
        // check everything before touching stock so a failure leaves nothing behind
        for item in &order.items {
            let variant = data.products.get(&item.product_id)
                .and_then(|p| p.variant(item.variant_id))
                .ok_or_else(|| RepositoryError::NotFound("variant".into()))?;
            let wanted: u32 = order.items.iter().filter(|i| i.variant_id == item.variant_id).map(|i| i.quantity).sum();
            if i64::from(variant.stock) < i64::from(wanted) {
                return Err(RepositoryError::InsufficientStock { sku: variant.sku.to_string(), available: variant.stock });
            }
        }
        for item in &order.items {
            if let Some(v) = data.products.get_mut(&item.product_id)
                .and_then(|p| p.variants.iter_mut().find(|v| v.id == item.variant_id))
            {
                v.stock -= item.quantity as i32;
            }
        }
        let mut stored = order.clone();
        stored.take_events();
        data.orders.insert(order.id, stored);
        Ok(())
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        Ok(self.data.read().await.orders.get(&id).cloned())
    }

    async fn order_by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError> {
        Ok(self.data.read().await.orders.values().find(|o| o.order_number == order_number).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Page<Order>, RepositoryError> {
        let data = self.data.read().await;
        let mut orders: Vec<Order> = data.orders.values().filter(|o| filter.matches(o)).cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(orders, filter.page(), filter.per_page()))
    }

    async fn attach_gateway_order(&self, order_id: Uuid, gateway_order_id: &str) -> Result<Order, RepositoryError> {
        self.mutate_order(|o| o.id == order_id, "order", |o| Ok(o.attach_gateway_order(gateway_order_id)?)).await
    }

    async fn apply_payment(&self, gateway_order_id: &str, confirmation: &PaymentConfirmation) -> Result<(Order, Transition), RepositoryError> {
        let mut transition = Transition::Ignored;
        let order = self.mutate_order(
            |o| o.gateway_order_id.as_deref() == Some(gateway_order_id),
            "order for gateway order",
            |o| {
                transition = o.apply_payment(confirmation);
                Ok(())
            },
        ).await?;
        Ok((order, transition))
    }

    async fn set_order_status(&self, order_id: Uuid, status: OrderStatus) -> Result<Order, RepositoryError> {
        self.mutate_order(|o| o.id == order_id, "order", |o| Ok(o.set_status(status)?)).await
    }

    async fn set_payment_status(&self, order_id: Uuid, status: PaymentStatus) -> Result<Order, RepositoryError> {
        self.mutate_order(|o| o.id == order_id, "order", |o| {
            o.set_payment_status(status);
            Ok(())
        }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::tests::product;
    use crate::domain::aggregates::{Address, ConfirmationSource, Customer, OrderItem, PaymentMethod, PaymentOutcome};
    use rust_decimal::Decimal;

    fn order_for(p: &Product, qty: u32) -> Order {
        let v = &p.variants[0];
        let item = OrderItem::new(p.id, v.id, p.name.clone(), v.quality.clone(), v.volume_ml, v.sku.to_string(), v.price, qty);
        Order::place("ORD-12345678".into(), Customer::default(), Address::default(), PaymentMethod::Online, vec![item], "INR").unwrap()
    }

    #[tokio::test]
    async fn test_insert_order_decrements_stock() {
        let p = product("Rose", &[("Regular", 500, 5)]);
        let repo = MemoryRepository::with_products([p.clone()]);
        repo.insert_order(&order_for(&p, 2)).await.unwrap();
        let stored = repo.product(p.id).await.unwrap().unwrap();
        assert_eq!(stored.variants[0].stock, 3);
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_state_untouched() {
        let p = product("Rose", &[("Regular", 500, 1)]);
        let repo = MemoryRepository::with_products([p.clone()]);
        let err = repo.insert_order(&order_for(&p, 2)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InsufficientStock { available: 1, .. }));
        assert_eq!(repo.product(p.id).await.unwrap().unwrap().variants[0].stock, 1);
        assert!(repo.order_by_number("ORD-12345678").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stored_order_keeps_snapshot_prices() {
        let p = product("Rose", &[("Regular", 500, 5)]);
        let repo = MemoryRepository::with_products([p.clone()]);
        let order = order_for(&p, 2);
        repo.insert_order(&order).await.unwrap();

        let mut repriced = p.variants[0].clone();
        repriced.price = Decimal::new(450, 0);
        repo.save_variant(&repriced).await.unwrap();

        let stored = repo.order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.total, Decimal::new(1000, 0));
        assert_eq!(stored.items[0].unit_price, Decimal::new(500, 0));
    }

    #[tokio::test]
    async fn test_apply_payment_by_gateway_order() {
        let p = product("Rose", &[("Regular", 500, 5)]);
        let repo = MemoryRepository::with_products([p.clone()]);
        let order = order_for(&p, 1);
        repo.insert_order(&order).await.unwrap();
        repo.attach_gateway_order(order.id, "order_gw").await.unwrap();

        let confirmation = PaymentConfirmation { source: ConfirmationSource::Webhook, outcome: PaymentOutcome::Captured { payment_id: "pay_1".into() } };
        let (paid, t1) = repo.apply_payment("order_gw", &confirmation).await.unwrap();
        let (_, t2) = repo.apply_payment("order_gw", &confirmation).await.unwrap();
        assert_eq!((t1, t2), (Transition::Applied, Transition::AlreadyApplied));
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert!(matches!(repo.apply_payment("order_unknown", &confirmation).await, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_insert_product_is_all_or_nothing() {
        let existing = product("Rose", &[("Regular", 500, 5)]);
        let repo = MemoryRepository::with_products([existing.clone()]);

        let mut clash = product("Majmua", &[("Regular", 600, 2), ("Premium", 900, 1)]);
        clash.variants[1].sku = clash.variants[0].sku.clone();
        assert!(matches!(repo.insert_product(&clash).await, Err(RepositoryError::Duplicate(_))));

        let mut reused = product("Shamama", &[("Regular", 700, 2)]);
        reused.variants[0].sku = existing.variants[0].sku.clone();
        assert!(matches!(repo.insert_product(&reused).await, Err(RepositoryError::Duplicate(_))));

        assert!(repo.product_by_slug("majmua").await.unwrap().is_none());
        assert!(repo.product_by_slug("shamama").await.unwrap().is_none());

        let fresh = product("Kewda", &[("Regular", 400, 3)]);
        repo.insert_product(&fresh).await.unwrap();
        assert_eq!(repo.product_by_slug("kewda").await.unwrap().unwrap().variants.len(), 1);
    }

    #[tokio::test]
    async fn test_categories_count_active_products() {
        let rose = product("Rose", &[("Regular", 500, 5)]);
        let mut hidden = product("Hidden", &[("Regular", 500, 5)]);
        hidden.is_active = false;
        let repo = MemoryRepository::with_products([rose, hidden]);
        assert_eq!(repo.categories().await.unwrap(), vec![CategorySummary { name: "Attar".into(), product_count: 1 }]);
    }
}
