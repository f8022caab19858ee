//! Orders and their lifecycle partition.
//!
//! [`OrderBuckets::partition`] is the single place where orders are sorted into
//! the New / Paid / Delivered views. It is a pure, total function of the order
//! list: every fetch rebuilds all three views from scratch.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Money, OrderId, OrderStage, ProductId};

/// A line captured at checkout time.
///
/// The price is the one the customer saw, not the live catalog price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Product ordered.
    #[serde(rename = "prodID")]
    pub product_id: ProductId,
    /// Unit price at checkout.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Units ordered.
    pub quantity: u32,
}

/// An order as known to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Backend identifier.
    pub id: OrderId,
    /// Lines captured at checkout.
    pub lines: Vec<OrderLine>,
    /// Order total in minor units.
    pub total_price: Money,
    /// Number of items as reported by the backend.
    pub item_count: u32,
    /// Payment flag.
    pub is_paid: bool,
    /// Delivery flag. May be set without `is_paid`; see [`OrderStage::classify`].
    pub is_delivered: bool,
}

impl Order {
    /// The lifecycle stage implied by the flags.
    #[must_use]
    pub const fn stage(&self) -> OrderStage {
        OrderStage::classify(self.is_paid, self.is_delivered)
    }

    /// Whether the flags break the intended `delivered ⇒ paid` rule.
    ///
    /// Such orders are kept and classified as delivered; callers may log them.
    #[must_use]
    pub const fn is_delivered_unpaid(&self) -> bool {
        self.is_delivered && !self.is_paid
    }

    /// Distinct product ids referenced by the lines, in first-seen order.
    #[must_use]
    pub fn distinct_products(&self) -> Vec<ProductId> {
        distinct_products(&self.lines)
    }
}

/// Distinct product ids referenced by `lines`, in first-seen order.
#[must_use]
pub fn distinct_products(lines: &[OrderLine]) -> Vec<ProductId> {
    let mut ids: Vec<ProductId> = Vec::with_capacity(lines.len());
    for line in lines {
        if !ids.contains(&line.product_id) {
            ids.push(line.product_id);
        }
    }
    ids
}

/// Orders split into the three lifecycle views.
///
/// Every order is in exactly one bucket. Within a bucket the backend's order
/// is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBuckets {
    /// Placed, unpaid, undelivered.
    pub new: Vec<Order>,
    /// Paid, undelivered.
    pub paid: Vec<Order>,
    /// Delivered (paid or not).
    pub delivered: Vec<Order>,
}

impl OrderBuckets {
    /// Partition `orders` into buckets in one pass.
    #[must_use]
    pub fn partition(orders: Vec<Order>) -> Self {
        let mut buckets = Self::default();
        for order in orders {
            match order.stage() {
                OrderStage::New => buckets.new.push(order),
                OrderStage::Paid => buckets.paid.push(order),
                OrderStage::Delivered => buckets.delivered.push(order),
            }
        }
        buckets
    }

    /// The bucket for `stage`.
    #[must_use]
    pub fn bucket(&self, stage: OrderStage) -> &[Order] {
        match stage {
            OrderStage::New => &self.new,
            OrderStage::Paid => &self.paid,
            OrderStage::Delivered => &self.delivered,
        }
    }

    /// Ids in the bucket for `stage`.
    #[must_use]
    pub fn ids(&self, stage: OrderStage) -> Vec<OrderId> {
        self.bucket(stage).iter().map(|o| o.id).collect()
    }

    /// Total number of orders across all buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.new.len() + self.paid.len() + self.delivered.len()
    }

    /// Whether there are no orders at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find an order by id in any bucket.
    #[must_use]
    pub fn find(&self, id: OrderId) -> Option<&Order> {
        self.iter().find(|o| o.id == id)
    }

    /// The bucket `id` currently sits in.
    #[must_use]
    pub fn stage_of(&self, id: OrderId) -> Option<OrderStage> {
        self.find(id).map(Order::stage)
    }

    /// All orders, New first, then Paid, then Delivered.
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.new.iter().chain(&self.paid).chain(&self.delivered)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn order(id: i64, is_paid: bool, is_delivered: bool) -> Order {
        Order {
            id: OrderId::new(id),
            lines: Vec::new(),
            total_price: Money::from_minor_units(1000),
            item_count: 1,
            is_paid,
            is_delivered,
        }
    }

    #[test]
    fn test_partition_scenario() {
        let buckets = OrderBuckets::partition(vec![
            order(1, false, false),
            order(2, true, false),
            order(3, true, true),
        ]);

        assert_eq!(buckets.ids(OrderStage::New), vec![OrderId::new(1)]);
        assert_eq!(buckets.ids(OrderStage::Paid), vec![OrderId::new(2)]);
        assert_eq!(buckets.ids(OrderStage::Delivered), vec![OrderId::new(3)]);
    }

    #[test]
    fn test_partition_is_exhaustive_and_disjoint() {
        let flags = [(false, false), (true, false), (true, true), (false, true)];
        let orders: Vec<Order> = (0..40)
            .map(|i| {
                let (paid, delivered) = flags[usize::try_from(i).unwrap() % flags.len()];
                order(i, paid, delivered)
            })
            .collect();
        let total = orders.len();

        let buckets = OrderBuckets::partition(orders);
        assert_eq!(buckets.len(), total);
        assert_eq!(
            buckets.new.len() + buckets.paid.len() + buckets.delivered.len(),
            total
        );

        for id in 0..40 {
            let hits = OrderStage::ALL
                .iter()
                .filter(|s| buckets.ids(**s).contains(&OrderId::new(id)))
                .count();
            assert_eq!(hits, 1, "order {id} must be in exactly one bucket");
        }
    }

    #[test]
    fn test_delivered_unpaid_goes_to_delivered() {
        let o = order(5, false, true);
        assert!(o.is_delivered_unpaid());

        let buckets = OrderBuckets::partition(vec![o]);
        assert_eq!(buckets.stage_of(OrderId::new(5)), Some(OrderStage::Delivered));
    }

    #[test]
    fn test_partition_empty() {
        let buckets = OrderBuckets::partition(Vec::new());
        assert!(buckets.is_empty());
        assert_eq!(buckets.stage_of(OrderId::new(1)), None);
    }

    #[test]
    fn test_partition_keeps_backend_order_within_bucket() {
        let buckets = OrderBuckets::partition(vec![
            order(9, false, false),
            order(4, false, false),
            order(7, false, false),
        ]);
        assert_eq!(
            buckets.ids(OrderStage::New),
            vec![OrderId::new(9), OrderId::new(4), OrderId::new(7)]
        );
    }

    #[test]
    fn test_distinct_products() {
        let line = |id: i64| OrderLine {
            product_id: ProductId::new(id),
            price: Decimal::new(100, 2),
            quantity: 1,
        };
        let ids = distinct_products(&[line(3), line(1), line(3), line(2), line(1)]);
        assert_eq!(
            ids,
            vec![ProductId::new(3), ProductId::new(1), ProductId::new(2)]
        );
    }

    #[test]
    fn test_order_line_wire_format() {
        let lines: Vec<OrderLine> =
            serde_json::from_str(r#"[{"prodID": 7, "price": 9.99, "quantity": 2}]"#).unwrap();
        assert_eq!(lines[0].product_id, ProductId::new(7));
        assert_eq!(lines[0].price, Decimal::new(999, 2));
        assert_eq!(lines[0].quantity, 2);
    }
}
