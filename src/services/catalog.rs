//! Storefront catalog reads.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::aggregates::{Product, ProductImage, Variant};
use crate::error::{AppError, Result};
use crate::repository::{CategorySummary, Page, ProductQuery};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub category: String,
    pub is_featured: bool,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Variant shown on the product card.
    pub default_variant_id: Option<Uuid>,
    pub mrp: Option<Decimal>,
    pub discount_percent: u32,
    pub image_url: Option<String>,
    pub in_stock: bool,
}

impl From<&Product> for ProductSummary {
    fn from(p: &Product) -> Self {
        let range = p.price_range();
        let default = p.resolve_variant(None);
        Self {
            id: p.id,
            name: p.name.clone(),
            slug: p.slug.clone(),
            category: p.category.clone(),
            is_featured: p.is_featured,
            min_price: range.map(|(min, _)| min),
            max_price: range.map(|(_, max)| max),
            default_variant_id: default.map(|v| v.id),
            mrp: default.map(|v| v.mrp),
            discount_percent: default.map_or(0, Variant::discount_percent),
            image_url: p.primary_image().map(|i| i.url.clone()),
            in_stock: p.is_in_stock(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VariantView {
    pub id: Uuid,
    pub quality: String,
    pub volume_ml: i32,
    pub label: String,
    pub price: Decimal,
    pub mrp: Decimal,
    pub discount_percent: u32,
    pub sku: String,
    pub in_stock: bool,
}

impl From<&Variant> for VariantView {
    fn from(v: &Variant) -> Self {
        Self {
            id: v.id, quality: v.quality.clone(), volume_ml: v.volume_ml, label: v.label(), price: v.price, mrp: v.mrp,
            discount_percent: v.discount_percent(), sku: v.sku.to_string(), in_stock: v.in_stock(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub category: String,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub is_featured: bool,
    pub images: Vec<ProductImage>,
    pub variants: Vec<VariantView>,
    pub selected_variant_id: Option<Uuid>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: bool,
}

impl ProductDetail {
    pub fn new(product: &Product, quality: Option<&str>) -> Self {
        let mut images = product.images.clone();
        images.sort_by_key(|i| i.position);
        let range = product.price_range();
        Self {
            id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            category: product.category.clone(),
            description: product.description.clone(),
            notes: product.notes.clone(),
            is_featured: product.is_featured,
            images,
            variants: product.variants.iter().map(VariantView::from).collect(),
            selected_variant_id: product.resolve_variant(quality).map(|v| v.id),
            min_price: range.map(|(min, _)| min),
            max_price: range.map(|(_, max)| max),
            in_stock: product.is_in_stock(),
        }
    }
}

#[instrument(skip(state), err(Display))]
pub async fn list_products(state: &AppState, mut query: ProductQuery) -> Result<Page<ProductSummary>> {
    query.include_inactive = false;
    let page = state.repo.list_products(&query).await?;
    Ok(Page {
        data: page.data.iter().map(ProductSummary::from).collect(),
        total: page.total,
        page: page.page,
        per_page: page.per_page,
    })
}

/// Active product by slug. `quality` picks the pre-selected variant.
#[instrument(skip(state), err(Display))]
pub async fn product_detail(state: &AppState, slug: &str, quality: Option<&str>) -> Result<ProductDetail> {
    let product = state.repo.product_by_slug(slug).await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound(format!("Product '{}'", slug)))?;
    Ok(ProductDetail::new(&product, quality))
}

pub async fn categories(state: &AppState) -> Result<Vec<CategorySummary>> {
    Ok(state.repo.categories().await?)
}
