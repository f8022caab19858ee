//! Order Lifecycle Manager.
//!
//! Owns the New / Paid / Delivered views. Every successful fetch rebuilds all
//! three from the backend's list in one write; transitions go to the backend
//! first and only show up locally through the follow-up fetch.

pub mod details;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use pocket_shop_core::{Order, OrderBuckets, OrderId, OrderLine, OrderStage};

use crate::error::add_breadcrumb;
use crate::gateway::{GatewayError, OrderRemote};

pub use details::{OrderDetailExpander, OrderItemDetail};

/// Errors from order operations. Buckets are unchanged in every case.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The backend call failed.
    #[error(transparent)]
    Remote(#[from] GatewayError),

    /// The order is already at or past the requested stage.
    #[error("Order {order_id} is {from}; cannot move it to {to}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStage,
        to: OrderStage,
    },

    /// Tried to place an order with no lines.
    #[error("Cannot place an empty order")]
    EmptyOrder,
}

/// Tracks the user's orders and moves them through their lifecycle.
///
/// Cheap to clone; clones share the same buckets.
pub struct OrderLifecycleManager<R> {
    inner: Arc<ManagerInner<R>>,
}

struct ManagerInner<R> {
    remote: R,
    buckets: RwLock<OrderBuckets>,
}

impl<R> Clone for OrderLifecycleManager<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> std::fmt::Debug for OrderLifecycleManager<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderLifecycleManager").finish_non_exhaustive()
    }
}

impl<R: OrderRemote> OrderLifecycleManager<R> {
    /// Start with empty buckets.
    #[must_use]
    pub fn new(remote: R) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                remote,
                buckets: RwLock::new(OrderBuckets::default()),
            }),
        }
    }

    /// Fetch every order and repartition.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Remote` if the fetch fails; buckets are unchanged.
    #[instrument(skip(self))]
    pub async fn fetch_all(&self) -> Result<OrderBuckets, OrderError> {
        let orders = self.inner.remote.list_orders().await.map_err(|e| {
            error!(error = %e, "Failed to fetch orders");
            e
        })?;

        for order in orders.iter().filter(|o| o.is_delivered_unpaid()) {
            warn!(order_id = %order.id, "Order is delivered but not paid");
        }

        let buckets = OrderBuckets::partition(orders);
        debug!(
            new = buckets.new.len(),
            paid = buckets.paid.len(),
            delivered = buckets.delivered.len(),
            "Orders repartitioned"
        );
        *self.inner.buckets.write().await = buckets.clone();
        Ok(buckets)
    }

    /// Mark an order paid, then refetch.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidTransition` if the order is known to be
    /// paid or delivered already, or `OrderError::Remote` if a call fails.
    pub async fn mark_paid(&self, order_id: OrderId) -> Result<OrderBuckets, OrderError> {
        self.transition(order_id, OrderStage::Paid).await
    }

    /// Mark an order delivered (and paid), then refetch. Allowed from New.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidTransition` if the order is known to be
    /// delivered already, or `OrderError::Remote` if a call fails.
    pub async fn mark_delivered(&self, order_id: OrderId) -> Result<OrderBuckets, OrderError> {
        self.transition(order_id, OrderStage::Delivered).await
    }

    /// Submit `lines` as a new order, then refetch.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::EmptyOrder` for no lines, or `OrderError::Remote`
    /// if a call fails.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn place_order(&self, lines: &[OrderLine]) -> Result<Option<OrderId>, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        add_breadcrumb("orders", "place_order", None);
        let order_id = self.inner.remote.place_order(lines).await.map_err(|e| {
            error!(error = %e, "Failed to place order");
            e
        })?;
        info!(order_id = ?order_id, "Order placed");

        self.fetch_all().await?;
        Ok(order_id)
    }

    /// A copy of the current buckets.
    pub async fn buckets(&self) -> OrderBuckets {
        self.inner.buckets.read().await.clone()
    }

    /// The stage `order_id` is in, as of the last fetch.
    pub async fn stage_of(&self, order_id: OrderId) -> Option<OrderStage> {
        self.inner.buckets.read().await.stage_of(order_id)
    }

    /// The order with `order_id`, as of the last fetch.
    pub async fn order(&self, order_id: OrderId) -> Option<Order> {
        self.inner.buckets.read().await.find(order_id).cloned()
    }

    #[instrument(skip(self), fields(order_id = %order_id, target = %target))]
    async fn transition(
        &self,
        order_id: OrderId,
        target: OrderStage,
    ) -> Result<OrderBuckets, OrderError> {
        if let Some(current) = self.stage_of(order_id).await
            && !current.can_advance_to(target)
        {
            warn!(from = %current, "Refusing backward or repeated transition");
            return Err(OrderError::InvalidTransition {
                order_id,
                from: current,
                to: target,
            });
        }

        let order_id_str = order_id.to_string();
        add_breadcrumb(
            "orders",
            &format!("mark_{target}"),
            Some(&[("order_id", order_id_str.as_str())]),
        );

        self.inner
            .remote
            .update_order(order_id, target)
            .await
            .map_err(|e| {
                error!(error = %e, "Order update failed");
                e
            })?;
        info!("Order updated");

        self.fetch_all().await
    }
}
