//! Order Detail Expander.
//!
//! Resolves an order's lines against the catalog the first time the order is
//! expanded, then serves the merged rows from memory for the rest of the
//! session. Collapsing only hides the rows; nothing is ever evicted.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::try_join_all;
use moka::future::Cache;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, instrument};

use pocket_shop_core::orders::distinct_products;
use pocket_shop_core::{OrderId, OrderLine, ProductId};

use crate::catalog::{CatalogError, CatalogLookup};

/// A resolved order line: catalog data plus what was captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItemDetail {
    pub product_id: ProductId,
    pub title: String,
    pub image: String,
    /// Price captured at checkout, not the current catalog price.
    pub price: Decimal,
    pub quantity: u32,
}

/// Expansion failed; nothing was cached for the order.
#[derive(Debug, Error)]
#[error("Could not load details for order {order_id}: {source}")]
pub struct ExpandError {
    pub order_id: OrderId,
    #[source]
    pub source: Arc<CatalogError>,
}

type Details = Arc<Vec<OrderItemDetail>>;

/// Lazily resolves and remembers order details.
///
/// Cheap to clone; clones share the cache and the visible set.
pub struct OrderDetailExpander<C> {
    inner: Arc<ExpanderInner<C>>,
}

struct ExpanderInner<C> {
    catalog: C,
    cache: Cache<OrderId, Details>,
    visible: Mutex<HashSet<OrderId>>,
}

impl<C> Clone for OrderDetailExpander<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> std::fmt::Debug for OrderDetailExpander<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderDetailExpander")
            .field("cached_orders", &self.inner.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl<C: CatalogLookup> OrderDetailExpander<C> {
    #[must_use]
    pub fn new(catalog: C) -> Self {
        // No TTL and no capacity bound: entries live for the session.
        let cache = Cache::builder().build();

        Self {
            inner: Arc::new(ExpanderInner {
                catalog,
                cache,
                visible: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Show the order's details, resolving them on first use.
    ///
    /// Concurrent expansions of the same uncached order share one set of
    /// catalog lookups.
    ///
    /// # Errors
    ///
    /// Returns `ExpandError` if any lookup fails. The order stays collapsed and
    /// uncached.
    #[instrument(skip(self, lines), fields(order_id = %order_id, lines = lines.len()))]
    pub async fn expand(
        &self,
        order_id: OrderId,
        lines: &[OrderLine],
    ) -> Result<Details, ExpandError> {
        let details = self
            .inner
            .cache
            .try_get_with(order_id, self.resolve(lines))
            .await
            .map_err(|source| {
                error!(error = %source, "Order expansion failed");
                ExpandError { order_id, source }
            })?;

        self.visible().insert(order_id);
        Ok(details)
    }

    /// Hide the order's details. The cached rows are kept.
    pub fn collapse(&self, order_id: OrderId) {
        self.visible().remove(&order_id);
    }

    /// Collapse if visible, otherwise expand.
    ///
    /// Returns the rows when the order ends up expanded.
    ///
    /// # Errors
    ///
    /// Returns `ExpandError` if expanding fails.
    pub async fn toggle(
        &self,
        order_id: OrderId,
        lines: &[OrderLine],
    ) -> Result<Option<Details>, ExpandError> {
        if self.is_expanded(order_id) {
            self.collapse(order_id);
            return Ok(None);
        }
        self.expand(order_id, lines).await.map(Some)
    }

    /// Whether the order is currently expanded.
    #[must_use]
    pub fn is_expanded(&self, order_id: OrderId) -> bool {
        self.visible().contains(&order_id)
    }

    /// Cached rows for the order, without touching the network.
    pub async fn cached(&self, order_id: OrderId) -> Option<Details> {
        self.inner.cache.get(&order_id).await
    }

    async fn resolve(&self, lines: &[OrderLine]) -> Result<Details, CatalogError> {
        let ids = distinct_products(lines);
        debug!(products = ids.len(), "Resolving order lines");

        let products =
            try_join_all(ids.iter().map(|id| self.inner.catalog.get_product(*id))).await?;

        let details = lines
            .iter()
            .filter_map(|line| {
                let position = ids.iter().position(|id| *id == line.product_id)?;
                let product = products.get(position)?;
                Some(OrderItemDetail {
                    product_id: line.product_id,
                    title: product.title.clone(),
                    image: product.image.clone(),
                    price: line.price,
                    quantity: line.quantity,
                })
            })
            .collect();

        Ok(Arc::new(details))
    }

    fn visible(&self) -> MutexGuard<'_, HashSet<OrderId>> {
        self.inner
            .visible
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::catalog::Product;

    use super::*;

    #[derive(Default)]
    struct FakeCatalog {
        lookups: Mutex<HashMap<ProductId, usize>>,
        total: AtomicUsize,
        missing: Mutex<HashSet<ProductId>>,
    }

    impl CatalogLookup for Arc<FakeCatalog> {
        async fn get_product(&self, id: ProductId) -> Result<Product, CatalogError> {
            self.total.fetch_add(1, Ordering::SeqCst);
            *self.lookups.lock().unwrap().entry(id).or_default() += 1;
            tokio::time::sleep(Duration::from_millis(10)).await;

            if self.missing.lock().unwrap().contains(&id) {
                return Err(CatalogError::NotFound(id));
            }
            Ok(Product {
                id,
                title: format!("Product {id}"),
                price: Decimal::new(1, 0),
                description: String::new(),
                category: String::new(),
                image: format!("https://img.test/{id}.png"),
            })
        }
    }

    fn line(id: i64, cents: i64, quantity: u32) -> OrderLine {
        OrderLine {
            product_id: ProductId::new(id),
            price: Decimal::new(cents, 2),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_expand_merges_catalog_with_captured_lines() {
        let catalog = Arc::new(FakeCatalog::default());
        let expander = OrderDetailExpander::new(Arc::clone(&catalog));
        let lines = [line(7, 999, 2), line(3, 150, 1)];

        let details = expander.expand(OrderId::new(1), &lines).await.unwrap();

        assert_eq!(details.len(), 2);
        assert_eq!(details[0].title, "Product 7");
        assert_eq!(details[0].price, Decimal::new(999, 2));
        assert_eq!(details[0].quantity, 2);
        assert_eq!(details[1].image, "https://img.test/3.png");
        assert!(expander.is_expanded(OrderId::new(1)));
    }

    #[tokio::test]
    async fn test_one_lookup_per_distinct_product() {
        let catalog = Arc::new(FakeCatalog::default());
        let expander = OrderDetailExpander::new(Arc::clone(&catalog));
        let lines = [line(7, 999, 1), line(3, 150, 1), line(7, 999, 1)];

        let details = expander.expand(OrderId::new(1), &lines).await.unwrap();

        assert_eq!(details.len(), 3);
        assert_eq!(catalog.total.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_expand_uses_cache() {
        let catalog = Arc::new(FakeCatalog::default());
        let expander = OrderDetailExpander::new(Arc::clone(&catalog));
        let lines = [line(7, 999, 1)];

        expander.expand(OrderId::new(1), &lines).await.unwrap();
        expander.collapse(OrderId::new(1));
        assert!(!expander.is_expanded(OrderId::new(1)));
        assert!(expander.cached(OrderId::new(1)).await.is_some());

        expander.expand(OrderId::new(1), &lines).await.unwrap();
        assert_eq!(catalog.total.load(Ordering::SeqCst), 1);
        assert!(expander.is_expanded(OrderId::new(1)));
    }

    #[tokio::test]
    async fn test_concurrent_expansions_share_lookups() {
        let catalog = Arc::new(FakeCatalog::default());
        let expander = OrderDetailExpander::new(Arc::clone(&catalog));
        let lines = [line(7, 999, 1), line(3, 150, 1)];

        let (a, b) = tokio::join!(
            expander.expand(OrderId::new(1), &lines),
            expander.expand(OrderId::new(1), &lines)
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(catalog.total.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_partial_failure_caches_nothing() {
        let catalog = Arc::new(FakeCatalog::default());
        catalog.missing.lock().unwrap().insert(ProductId::new(3));
        let expander = OrderDetailExpander::new(Arc::clone(&catalog));
        let lines = [line(7, 999, 1), line(3, 150, 1)];

        let err = expander.expand(OrderId::new(1), &lines).await.unwrap_err();
        assert_eq!(err.order_id, OrderId::new(1));
        assert!(matches!(*err.source, CatalogError::NotFound(_)));
        assert!(!expander.is_expanded(OrderId::new(1)));
        assert!(expander.cached(OrderId::new(1)).await.is_none());

        // A later attempt goes back to the catalog.
        catalog.missing.lock().unwrap().clear();
        expander.expand(OrderId::new(1), &lines).await.unwrap();
        assert_eq!(catalog.lookups.lock().unwrap()[&ProductId::new(3)], 2);
    }

    #[tokio::test]
    async fn test_toggle() {
        let catalog = Arc::new(FakeCatalog::default());
        let expander = OrderDetailExpander::new(Arc::clone(&catalog));
        let lines = [line(1, 100, 1)];
        let id = OrderId::new(4);

        assert!(expander.toggle(id, &lines).await.unwrap().is_some());
        assert!(expander.is_expanded(id));
        assert!(expander.toggle(id, &lines).await.unwrap().is_none());
        assert!(!expander.is_expanded(id));
        assert!(expander.toggle(id, &lines).await.unwrap().is_some());
        assert_eq!(catalog.total.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_order_expands_to_nothing() {
        let catalog = Arc::new(FakeCatalog::default());
        let expander = OrderDetailExpander::new(Arc::clone(&catalog));
        let details = expander.expand(OrderId::new(9), &[]).await.unwrap();
        assert!(details.is_empty());
        assert_eq!(catalog.total.load(Ordering::SeqCst), 0);
    }
}
