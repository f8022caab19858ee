//! Catalog client: public product lookups.
//!
//! Products are read-only and unauthenticated. Responses are cached in memory
//! via `moka` (5-minute TTL); failures are never cached.

mod cache;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use pocket_shop_core::ProductId;

use cache::{CacheKey, CacheValue};

/// Errors that can occur when reading the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// No product with this id.
    #[error("Product not found: {0}")]
    NotFound(ProductId),

    /// Catalog answered with an unexpected status.
    #[error("Catalog returned HTTP {0}")]
    Status(u16),

    /// Rate limited by the catalog.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// A catalog path did not join onto the base URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: String,
}

/// Anything that can resolve a product by id.
pub trait CatalogLookup: Send + Sync + 'static {
    /// Look up one product.
    fn get_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Product, CatalogError>> + Send;
}

// =============================================================================
// CatalogClient
// =============================================================================

/// HTTP client for the product catalog.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("cached_entries", &self.inner.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl CatalogClient {
    /// Create a catalog client for `base_url`.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(CatalogClientInner {
                client: reqwest::Client::new(),
                base_url,
                cache,
            }),
        }
    }

    /// List every product in the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body does not parse.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        if let Some(CacheValue::Products(products)) =
            self.inner.cache.get(&CacheKey::Products).await
        {
            debug!("Cache hit for product list");
            return Ok(products);
        }

        let url = self.inner.base_url.join("products")?;
        let body = self.fetch_text(url).await?;
        let products: Vec<Product> = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse product list"
            );
            CatalogError::Parse(e)
        })?;

        for product in &products {
            self.inner
                .cache
                .insert(
                    CacheKey::Product(product.id),
                    CacheValue::Product(Box::new(product.clone())),
                )
                .await;
        }
        self.inner
            .cache
            .insert(CacheKey::Products, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    /// Distinct catalog categories, in the order they first appear.
    ///
    /// # Errors
    ///
    /// Returns an error if the product list cannot be loaded.
    pub async fn categories(&self) -> Result<Vec<String>, CatalogError> {
        Ok(unique_categories(&self.list_products().await?))
    }

    /// Products whose category matches `category` exactly.
    ///
    /// # Errors
    ///
    /// Returns an error if the product list cannot be loaded.
    pub async fn products_in_category(
        &self,
        category: &str,
    ) -> Result<Vec<Product>, CatalogError> {
        let mut products = self.list_products().await?;
        products.retain(|p| p.category == category);
        Ok(products)
    }

    async fn fetch_text(&self, url: Url) -> Result<String, CatalogError> {
        let response = self.inner.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(CatalogError::RateLimited(retry_after));
        }
        if !status.is_success() {
            tracing::error!(status = %status, "Catalog returned non-success status");
            return Err(CatalogError::Status(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}

fn unique_categories(products: &[Product]) -> Vec<String> {
    let mut categories: Vec<String> = Vec::new();
    for product in products {
        if !categories.contains(&product.category) {
            categories.push(product.category.clone());
        }
    }
    categories
}

impl CatalogLookup for CatalogClient {
    #[instrument(skip(self), fields(product_id = %id))]
    async fn get_product(&self, id: ProductId) -> Result<Product, CatalogError> {
        if let Some(CacheValue::Product(product)) =
            self.inner.cache.get(&CacheKey::Product(id)).await
        {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let url = self.inner.base_url.join(&format!("products/{id}"))?;
        let body = match self.fetch_text(url).await {
            Err(CatalogError::Status(404)) => return Err(CatalogError::NotFound(id)),
            other => other?,
        };

        // The public catalog answers unknown ids with an empty 200
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Err(CatalogError::NotFound(id));
        }

        let product: Product = serde_json::from_str(trimmed).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %trimmed.chars().take(500).collect::<String>(),
                "Failed to parse product"
            );
            CatalogError::Parse(e)
        })?;

        self.inner
            .cache
            .insert(
                CacheKey::Product(id),
                CacheValue::Product(Box::new(product.clone())),
            )
            .await;

        Ok(product)
    }
}
