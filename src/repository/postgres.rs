//! Postgres-backed repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use super::{CategorySummary, OrderFilter, Page, ProductQuery, ProductSort, Repository, RepositoryError};
use crate::domain::aggregates::{
    Address, Customer, Order, OrderItem, OrderStatus, PaymentConfirmation, PaymentStatus, Product, ProductImage,
    Transition, Variant,
};
use crate::domain::value_objects::Sku;

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid, name: String, slug: String, category: String, description: Option<String>, notes: Option<String>,
    is_featured: bool, is_active: bool, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct VariantRow { id: Uuid, product_id: Uuid, quality: String, volume_ml: i32, price: Decimal, mrp: Decimal, stock: i32, sku: String }

#[derive(sqlx::FromRow)]
struct ImageRow { url: String, product_id: Uuid, alt: Option<String>, position: i32 }

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, order_number: String, customer_name: String, customer_phone: String, customer_email: Option<String>,
    address_line1: String, address_line2: Option<String>, city: String, state: String, pincode: String,
    payment_method: String, subtotal: Decimal, total: Decimal, currency: String, status: String, payment_status: String,
    gateway_order_id: Option<String>, gateway_payment_id: Option<String>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: Uuid, product_id: Uuid, variant_id: Uuid, product_name: String, quality: String, volume_ml: i32,
    sku: String, unit_price: Decimal, quantity: i32, line_total: Decimal,
}

impl VariantRow {
    fn into_variant(self) -> Result<Variant, RepositoryError> {
        let sku = Sku::new(self.sku).map_err(|e| RepositoryError::Corrupt(format!("variant {}: {}", self.id, e)))?;
        Ok(Variant {
            id: self.id, product_id: self.product_id, quality: self.quality, volume_ml: self.volume_ml,
            price: self.price, mrp: self.mrp, stock: self.stock, sku,
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItemRow>) -> Result<Order, RepositoryError> {
        let items = items.into_iter().map(|i| {
            let quantity = u32::try_from(i.quantity)
                .map_err(|_| RepositoryError::Corrupt(format!("order {} has quantity {}", i.order_id, i.quantity)))?;
            Ok(OrderItem {
                product_id: i.product_id, variant_id: i.variant_id, product_name: i.product_name, quality: i.quality,
                volume_ml: i.volume_ml, sku: i.sku, unit_price: i.unit_price, quantity, line_total: i.line_total,
            })
        }).collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Order::restore(
            self.id,
            self.order_number,
            Customer { name: self.customer_name, phone: self.customer_phone, email: self.customer_email },
            Address { line1: self.address_line1, line2: self.address_line2, city: self.city, state: self.state, pincode: self.pincode },
            self.payment_method.parse()?,
            items,
            self.subtotal,
            self.total,
            self.currency,
            self.status.parse()?,
            self.payment_status.parse()?,
            self.gateway_order_id,
            self.gateway_payment_id,
            self.created_at,
            self.updated_at,
        ))
    }
}

const PRODUCT_FILTER: &str = r#"
    ($1 OR p.is_active)
    AND ($2::text IS NULL OR LOWER(p.category) = LOWER($2))
    AND ($3::text IS NULL OR p.name ILIKE $3 OR p.description ILIKE $3 OR p.notes ILIKE $3)
    AND ($4::bool IS NULL OR p.is_featured = $4)
    AND (($5::numeric IS NULL AND $6::numeric IS NULL) OR EXISTS (
        SELECT 1 FROM product_variants v
        WHERE v.product_id = p.id
          AND ($5::numeric IS NULL OR v.price >= $5)
          AND ($6::numeric IS NULL OR v.price <= $6)))
"#;

fn order_by(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::Newest => "p.created_at DESC",
        ProductSort::Name => "LOWER(p.name) ASC",
        ProductSort::PriceAsc => "(SELECT MIN(v.price) FROM product_variants v WHERE v.product_id = p.id) ASC NULLS LAST",
        ProductSort::PriceDesc => "(SELECT MIN(v.price) FROM product_variants v WHERE v.product_id = p.id) DESC NULLS LAST",
    }
}

fn sql_offset(offset: u64) -> i64 { i64::try_from(offset).unwrap_or(i64::MAX) }

/// `%term%` with LIKE wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

fn map_write_error(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() { return RepositoryError::Duplicate(what.to_string()); }
        if db.is_foreign_key_violation() { return RepositoryError::NotFound("product".to_string()); }
    }
    RepositoryError::Database(e)
}

enum OrderKey<'a> { Id(Uuid), Gateway(&'a str) }

async fn lock_order(conn: &mut PgConnection, key: OrderKey<'_>) -> Result<Option<Order>, RepositoryError> {
    let row = match key {
        OrderKey::Id(id) => sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id).fetch_optional(&mut *conn).await?,
        OrderKey::Gateway(gid) => sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE gateway_order_id = $1 FOR UPDATE")
            .bind(gid).fetch_optional(&mut *conn).await?,
    };
    let Some(row) = row else { return Ok(None) };
    let items = sqlx::query_as::<_, OrderItemRow>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(row.id).fetch_all(&mut *conn).await?;
    Ok(Some(row.into_order(items)?))
}

async fn persist_order_state(conn: &mut PgConnection, order: &Order) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE orders SET status = $2, payment_status = $3, gateway_order_id = $4, gateway_payment_id = $5, updated_at = $6 WHERE id = $1")
        .bind(order.id).bind(order.status.as_str()).bind(order.payment_status.as_str())
        .bind(&order.gateway_order_id).bind(&order.gateway_payment_id).bind(order.updated_at)
        .execute(&mut *conn).await
        .map_err(|e| map_write_error(e, "gateway order id"))?;
    Ok(())
}

impl PgRepository {
    async fn hydrate_products(&self, rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let variant_rows = sqlx::query_as::<_, VariantRow>("SELECT * FROM product_variants WHERE product_id = ANY($1) ORDER BY price")
            .bind(&ids).fetch_all(&self.pool).await?;
        let image_rows = sqlx::query_as::<_, ImageRow>("SELECT * FROM product_images WHERE product_id = ANY($1) ORDER BY position")
            .bind(&ids).fetch_all(&self.pool).await?;

        let mut variants: HashMap<Uuid, Vec<Variant>> = HashMap::new();
        for row in variant_rows {
            variants.entry(row.product_id).or_default().push(row.into_variant()?);
        }
        let mut images: HashMap<Uuid, Vec<ProductImage>> = HashMap::new();
        for row in image_rows {
            images.entry(row.product_id).or_default().push(ProductImage { url: row.url, alt: row.alt, position: row.position });
        }

        Ok(rows.into_iter().map(|r| Product {
            variants: variants.remove(&r.id).unwrap_or_default(),
            images: images.remove(&r.id).unwrap_or_default(),
            id: r.id, name: r.name, slug: r.slug, category: r.category, description: r.description, notes: r.notes,
            is_featured: r.is_featured, is_active: r.is_active, created_at: r.created_at, updated_at: r.updated_at,
        }).collect())
    }

    async fn hydrate_orders(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>("SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY id")
            .bind(&ids).fetch_all(&self.pool).await?;
        let mut items: HashMap<Uuid, Vec<OrderItemRow>> = HashMap::new();
        for row in item_rows {
            items.entry(row.order_id).or_default().push(row);
        }
        rows.into_iter().map(|r| {
            let own = items.remove(&r.id).unwrap_or_default();
            r.into_order(own)
        }).collect()
    }

    async fn mutate_order<F>(&self, key: OrderKey<'_>, f: F) -> Result<Order, RepositoryError>
    where
        F: FnOnce(&mut Order) -> Result<(), RepositoryError> + Send,
    {
        let mut tx = self.pool.begin().await?;
        let mut order = lock_order(&mut tx, key).await?.ok_or_else(|| RepositoryError::NotFound("order".to_string()))?;
        f(&mut order)?;
        persist_order_state(&mut tx, &order).await?;
        tx.commit().await?;
        Ok(order)
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, RepositoryError> {
        let pattern = query.search_term().map(like_pattern);
        let sql = format!(
            "SELECT p.* FROM products p WHERE {} ORDER BY {} LIMIT $7 OFFSET $8",
            PRODUCT_FILTER,
            order_by(query.sort)
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(query.include_inactive).bind(&query.category).bind(&pattern).bind(query.featured)
            .bind(query.min_price).bind(query.max_price)
            .bind(i64::from(query.per_page())).bind(sql_offset(query.offset()))
            .fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM products p WHERE {}", PRODUCT_FILTER))
            .bind(query.include_inactive).bind(&query.category).bind(&pattern).bind(query.featured)
            .bind(query.min_price).bind(query.max_price)
            .fetch_one(&self.pool).await?;
        let data = self.hydrate_products(rows).await?;
        Ok(Page { data, total: total.0, page: query.page(), per_page: query.per_page() })
    }

    async fn product(&self, id: Uuid) -> Result<Option<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1").bind(id).fetch_all(&self.pool).await?;
        Ok(self.hydrate_products(rows).await?.into_iter().next())
    }

    async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE slug = $1").bind(slug).fetch_all(&self.pool).await?;
        Ok(self.hydrate_products(rows).await?.into_iter().next())
    }

    async fn categories(&self) -> Result<Vec<CategorySummary>, RepositoryError> {
        let rows: Vec<(String, i64)> = sqlx::query_as("SELECT category, COUNT(*) FROM products WHERE is_active GROUP BY category ORDER BY category")
            .fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(name, product_count)| CategorySummary { name, product_count }).collect())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO products (id, name, slug, category, description, notes, is_featured, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(product.id).bind(&product.name).bind(&product.slug).bind(&product.category).bind(&product.description)
        .bind(&product.notes).bind(product.is_featured).bind(product.is_active).bind(product.created_at).bind(product.updated_at)
        .execute(&mut *tx).await
        .map_err(|e| map_write_error(e, &format!("slug '{}'", product.slug)))?;

        for variant in &product.variants {
            sqlx::query(
                "INSERT INTO product_variants (id, product_id, quality, volume_ml, price, mrp, stock, sku) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(variant.id).bind(product.id).bind(&variant.quality).bind(variant.volume_ml)
            .bind(variant.price).bind(variant.mrp).bind(variant.stock).bind(variant.sku.as_str())
            .execute(&mut *tx).await
            .map_err(|e| map_write_error(e, &format!("SKU '{}'", variant.sku)))?;
        }

        for image in &product.images {
            sqlx::query("INSERT INTO product_images (url, product_id, alt, position) VALUES ($1, $2, $3, $4)")
                .bind(&image.url).bind(product.id).bind(&image.alt).bind(image.position)
                .execute(&mut *tx).await
                .map_err(|e| map_write_error(e, &format!("image '{}'", image.url)))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn save_product(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO products (id, name, slug, category, description, notes, is_featured, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW()) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, slug = EXCLUDED.slug, category = EXCLUDED.category, \
             description = EXCLUDED.description, notes = EXCLUDED.notes, is_featured = EXCLUDED.is_featured, \
             is_active = EXCLUDED.is_active, updated_at = NOW()",
        )
        .bind(product.id).bind(&product.name).bind(&product.slug).bind(&product.category).bind(&product.description)
        .bind(&product.notes).bind(product.is_featured).bind(product.is_active).bind(product.created_at)
        .execute(&self.pool).await
        .map_err(|e| map_write_error(e, &format!("slug '{}'", product.slug)))?;
        Ok(())
    }

    async fn deactivate_product(&self, id: Uuid) -> Result<(), RepositoryError> {
        let done = sqlx::query("UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(id).execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(RepositoryError::NotFound("product".into())); }
        Ok(())
    }

    async fn save_variant(&self, variant: &Variant) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO product_variants (id, product_id, quality, volume_ml, price, mrp, stock, sku) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET quality = EXCLUDED.quality, volume_ml = EXCLUDED.volume_ml, \
             price = EXCLUDED.price, mrp = EXCLUDED.mrp, stock = EXCLUDED.stock, sku = EXCLUDED.sku",
        )
        .bind(variant.id).bind(variant.product_id).bind(&variant.quality).bind(variant.volume_ml)
        .bind(variant.price).bind(variant.mrp).bind(variant.stock).bind(variant.sku.as_str())
        .execute(&self.pool).await
        .map_err(|e| map_write_error(e, &format!("SKU '{}'", variant.sku)))?;
        Ok(())
    }

    async fn delete_variant(&self, id: Uuid) -> Result<(), RepositoryError> {
        let done = sqlx::query("DELETE FROM product_variants WHERE id = $1").bind(id).execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(RepositoryError::NotFound("variant".into())); }
        Ok(())
    }

    async fn add_image(&self, product_id: Uuid, image: &ProductImage) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO product_images (url, product_id, alt, position) VALUES ($1, $2, $3, $4)")
            .bind(&image.url).bind(product_id).bind(&image.alt).bind(image.position)
            .execute(&self.pool).await
            .map_err(|e| map_write_error(e, &format!("image '{}'", image.url)))?;
        Ok(())
    }

    async fn remove_image(&self, product_id: Uuid, url: &str) -> Result<(), RepositoryError> {
        let done = sqlx::query("DELETE FROM product_images WHERE product_id = $1 AND url = $2")
            .bind(product_id).bind(url).execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(RepositoryError::NotFound("image".into())); }
        Ok(())
    }

    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for item in &order.items {
            let quantity = i32::try_from(item.quantity).map_err(|_| RepositoryError::Corrupt("quantity overflow".into()))?;
            let updated = sqlx::query("UPDATE product_variants SET stock = stock - $2 WHERE id = $1 AND stock >= $2")
                .bind(item.variant_id).bind(quantity).execute(&mut *tx).await?;
            if updated.rows_affected() == 0 {
                let available: Option<(i32,)> = sqlx::query_as("SELECT stock FROM product_variants WHERE id = $1")
                    .bind(item.variant_id).fetch_optional(&mut *tx).await?;
                return Err(match available {
                    Some((available,)) => RepositoryError::InsufficientStock { sku: item.sku.clone(), available },
                    None => RepositoryError::NotFound("variant".into()),
                });
            }
        }

        sqlx::query(
            "INSERT INTO orders (id, order_number, customer_name, customer_phone, customer_email, address_line1, address_line2, \
             city, state, pincode, payment_method, subtotal, total, currency, status, payment_status, gateway_order_id, \
             gateway_payment_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)",
        )
        .bind(order.id).bind(&order.order_number).bind(&order.customer.name).bind(&order.customer.phone)
        .bind(&order.customer.email).bind(&order.shipping_address.line1).bind(&order.shipping_address.line2)
        .bind(&order.shipping_address.city).bind(&order.shipping_address.state).bind(&order.shipping_address.pincode)
        .bind(order.payment_method.as_str()).bind(order.subtotal).bind(order.total).bind(&order.currency)
        .bind(order.status.as_str()).bind(order.payment_status.as_str()).bind(&order.gateway_order_id)
        .bind(&order.gateway_payment_id).bind(order.created_at).bind(order.updated_at)
        .execute(&mut *tx).await
        .map_err(|e| map_write_error(e, &format!("order number '{}'", order.order_number)))?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, variant_id, product_name, quality, volume_ml, sku, unit_price, quantity, line_total) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(order.id).bind(item.product_id).bind(item.variant_id).bind(&item.product_name).bind(&item.quality)
            .bind(item.volume_ml).bind(&item.sku).bind(item.unit_price).bind(item.quantity as i32).bind(item.line_total)
            .execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_all(&self.pool).await?;
        Ok(self.hydrate_orders(rows).await?.into_iter().next())
    }

    async fn order_by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE order_number = $1")
            .bind(order_number).fetch_all(&self.pool).await?;
        Ok(self.hydrate_orders(rows).await?.into_iter().next())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Page<Order>, RepositoryError> {
        let status = filter.status.map(|s| s.as_str());
        let payment_status = filter.payment_status.map(|s| s.as_str());
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE ($1::text IS NULL OR status = $1) AND ($2::text IS NULL OR payment_status = $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
        )
        .bind(status).bind(payment_status).bind(i64::from(filter.per_page())).bind(sql_offset(filter.offset()))
        .fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR status = $1) AND ($2::text IS NULL OR payment_status = $2)",
        )
        .bind(status).bind(payment_status).fetch_one(&self.pool).await?;
        let data = self.hydrate_orders(rows).await?;
        Ok(Page { data, total: total.0, page: filter.page(), per_page: filter.per_page() })
    }

    async fn attach_gateway_order(&self, order_id: Uuid, gateway_order_id: &str) -> Result<Order, RepositoryError> {
        self.mutate_order(OrderKey::Id(order_id), |o| Ok(o.attach_gateway_order(gateway_order_id)?)).await
    }

    async fn apply_payment(&self, gateway_order_id: &str, confirmation: &PaymentConfirmation) -> Result<(Order, Transition), RepositoryError> {
        let mut transition = Transition::Ignored;
        let order = self.mutate_order(OrderKey::Gateway(gateway_order_id), |o| {
            transition = o.apply_payment(confirmation);
            Ok(())
        }).await?;
        Ok((order, transition))
    }

    async fn set_order_status(&self, order_id: Uuid, status: OrderStatus) -> Result<Order, RepositoryError> {
        self.mutate_order(OrderKey::Id(order_id), |o| Ok(o.set_status(status)?)).await
    }

    async fn set_payment_status(&self, order_id: Uuid, status: PaymentStatus) -> Result<Order, RepositoryError> {
        self.mutate_order(OrderKey::Id(order_id), |o| {
            o.set_payment_status(status);
            Ok(())
        }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rose"), "%rose%");
        assert_eq!(like_pattern("100%_oud"), "%100\\%\\_oud%");
    }

    #[test]
    fn test_price_sort_puts_empty_products_last() {
        assert!(order_by(ProductSort::PriceAsc).ends_with("NULLS LAST"));
        assert!(order_by(ProductSort::PriceDesc).ends_with("NULLS LAST"));
    }
}
