//! Admin panel operations over the catalog and orders.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::product::slugify;
use crate::domain::aggregates::{OrderStatus, PaymentStatus, Product, ProductError, ProductImage, Variant};
use crate::domain::value_objects::Sku;
use crate::error::{AppError, Result};
use crate::repository::{OrderFilter, Page, ProductQuery};
use crate::services::orders::OrderView;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProductInput {
    pub name: String,
    /// Derived from the name when absent.
    pub slug: Option<String>,
    pub category: String,
    pub description: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub variants: Vec<VariantInput>,
    #[serde(default)]
    pub images: Vec<ImageInput>,
}

fn default_true() -> bool { true }

#[derive(Debug, Deserialize)]
pub struct VariantInput {
    pub quality: String,
    pub volume_ml: i32,
    pub price: Decimal,
    pub mrp: Decimal,
    pub stock: i32,
    pub sku: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageInput {
    pub url: String,
    pub alt: Option<String>,
    pub position: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ImageRef { pub url: String }

#[derive(Debug, Deserialize)]
pub struct StatusUpdate { pub status: OrderStatus }

#[derive(Debug, Deserialize)]
pub struct PaymentStatusUpdate { pub payment_status: PaymentStatus }

impl VariantInput {
    fn into_variant(self, id: Uuid, product_id: Uuid) -> Result<Variant> {
        if self.quality.trim().is_empty() {
            return Err(AppError::Validation("Variant quality is required".to_string()));
        }
        let sku = Sku::new(self.sku).map_err(|e| AppError::Validation(e.to_string()))?;
        let variant = Variant {
            id, product_id, quality: self.quality.trim().to_string(), volume_ml: self.volume_ml,
            price: self.price, mrp: self.mrp, stock: self.stock, sku,
        };
        variant.validate()?;
        Ok(variant)
    }
}

fn validate_image_url(url: &str) -> Result<()> {
    if url.starts_with("https://") || url.starts_with("http://") || url.starts_with('/') {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Unsupported image URL '{}'", url)))
    }
}

fn product_slug(name: &str, slug: Option<&str>) -> Result<String> {
    let slug = slugify(slug.unwrap_or(name));
    if slug.is_empty() {
        return Err(AppError::Validation("Slug must contain letters or digits".to_string()));
    }
    Ok(slug)
}

async fn load_product(state: &AppState, id: Uuid) -> Result<Product> {
    state.repo.product(id).await?.ok_or_else(|| AppError::NotFound("Product".to_string()))
}

pub async fn list_products(state: &AppState, mut query: ProductQuery) -> Result<Page<Product>> {
    query.include_inactive = true;
    Ok(state.repo.list_products(&query).await?)
}

pub async fn get_product(state: &AppState, id: Uuid) -> Result<Product> {
    load_product(state, id).await
}

/// Creates a product together with any variants and images in the request. Field rules are
/// checked up front; uniqueness is enforced by a single all-or-nothing insert.
#[instrument(skip(state, input), fields(name = %input.name), err(Display))]
pub async fn create_product(state: &AppState, input: ProductInput) -> Result<Product> {
    if input.name.trim().is_empty() {
        return Err(ProductError::MissingName.into());
    }
    let id = Uuid::now_v7();
    let slug = product_slug(&input.name, input.slug.as_deref())?;
    let variants = input.variants.into_iter()
        .map(|v| v.into_variant(Uuid::now_v7(), id))
        .collect::<Result<Vec<_>>>()?;
    let images = input.images.into_iter().enumerate().map(|(i, img)| {
        validate_image_url(&img.url)?;
        Ok(ProductImage { url: img.url, alt: img.alt, position: img.position.unwrap_or(i as i32) })
    }).collect::<Result<Vec<_>>>()?;

    let now = Utc::now();
    let product = Product {
        id, name: input.name.trim().to_string(), slug, category: input.category.trim().to_string(),
        description: input.description, notes: input.notes, is_featured: input.is_featured, is_active: input.is_active,
        variants, images, created_at: now, updated_at: now,
    };
    state.repo.insert_product(&product).await?;
    info!(product_id = %id, slug = %product.slug, variants = product.variants.len(), "Product created");
    load_product(state, id).await
}

#[instrument(skip(state, input), err(Display))]
pub async fn update_product(state: &AppState, id: Uuid, input: ProductInput) -> Result<Product> {
    if input.name.trim().is_empty() {
        return Err(ProductError::MissingName.into());
    }
    let mut product = load_product(state, id).await?;
    product.slug = product_slug(&input.name, input.slug.as_deref())?;
    product.name = input.name.trim().to_string();
    product.category = input.category.trim().to_string();
    product.description = input.description;
    product.notes = input.notes;
    product.is_featured = input.is_featured;
    product.is_active = input.is_active;
    state.repo.save_product(&product).await?;
    load_product(state, id).await
}

/// Soft delete: the product disappears from the storefront but past orders keep resolving.
#[instrument(skip(state), err(Display))]
pub async fn delete_product(state: &AppState, id: Uuid) -> Result<()> {
    state.repo.deactivate_product(id).await?;
    info!(product_id = %id, "Product deactivated");
    Ok(())
}

#[instrument(skip(state, input), err(Display))]
pub async fn add_variant(state: &AppState, product_id: Uuid, input: VariantInput) -> Result<Variant> {
    load_product(state, product_id).await?;
    let variant = input.into_variant(Uuid::now_v7(), product_id)?;
    state.repo.save_variant(&variant).await?;
    Ok(variant)
}

#[instrument(skip(state, input), err(Display))]
pub async fn update_variant(state: &AppState, product_id: Uuid, variant_id: Uuid, input: VariantInput) -> Result<Variant> {
    let product = load_product(state, product_id).await?;
    if product.variant(variant_id).is_none() {
        return Err(AppError::NotFound("Variant".to_string()));
    }
    let variant = input.into_variant(variant_id, product_id)?;
    state.repo.save_variant(&variant).await?;
    Ok(variant)
}

pub async fn delete_variant(state: &AppState, product_id: Uuid, variant_id: Uuid) -> Result<()> {
    let product = load_product(state, product_id).await?;
    if product.variant(variant_id).is_none() {
        return Err(AppError::NotFound("Variant".to_string()));
    }
    Ok(state.repo.delete_variant(variant_id).await?)
}

pub async fn add_image(state: &AppState, product_id: Uuid, input: ImageInput) -> Result<Product> {
    validate_image_url(&input.url)?;
    let product = load_product(state, product_id).await?;
    let position = input.position.unwrap_or_else(|| product.images.iter().map(|i| i.position + 1).max().unwrap_or(0));
    state.repo.add_image(product_id, &ProductImage { url: input.url, alt: input.alt, position }).await?;
    load_product(state, product_id).await
}

pub async fn remove_image(state: &AppState, product_id: Uuid, url: &str) -> Result<Product> {
    state.repo.remove_image(product_id, url).await?;
    load_product(state, product_id).await
}

pub async fn list_orders(state: &AppState, filter: OrderFilter) -> Result<Page<OrderView>> {
    let page = state.repo.list_orders(&filter).await?;
    Ok(Page { data: page.data.into_iter().map(OrderView::from).collect(), total: page.total, page: page.page, per_page: page.per_page })
}

pub async fn get_order(state: &AppState, id: Uuid) -> Result<OrderView> {
    let order = state.repo.order(id).await?.ok_or_else(|| AppError::NotFound("Order".to_string()))?;
    Ok(order.into())
}

#[instrument(skip(state), err(Display))]
pub async fn set_order_status(state: &AppState, id: Uuid, status: OrderStatus) -> Result<OrderView> {
    let mut order = state.repo.set_order_status(id, status).await?;
    info!(order_number = %order.order_number, %status, "Order status set");
    state.events.publish_all(order.take_events()).await;
    Ok(order.into())
}

#[instrument(skip(state), err(Display))]
pub async fn set_payment_status(state: &AppState, id: Uuid, payment_status: PaymentStatus) -> Result<OrderView> {
    let order = state.repo.set_payment_status(id, payment_status).await?;
    info!(order_number = %order.order_number, %payment_status, "Payment status set manually");
    Ok(order.into())
}
