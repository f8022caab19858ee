//! The Cart Store.
//!
//! A [`Cart`] is a set of [`CartLine`]s, unique by product. All operations are
//! synchronous and total: they never fail and never touch anything but the
//! cart itself. The sync engine in the client crate owns a `Cart` and pairs
//! each mutation with a remote push.
//!
//! Mutations come in two equivalent shapes:
//! - methods on `&mut Cart` (`add`, `remove`, `clear`, `replace`)
//! - [`CartAction`] values, applied in place with [`Cart::apply`] or as a pure
//!   prior-state to next-state step with [`Cart::reduce`]

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::orders::OrderLine;
use crate::types::ProductId;

/// One product in the cart.
///
/// `unit_price` is captured on the first add and never updated by later adds.
/// `quantity` is at least 1 while the line exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product this line refers to.
    #[serde(rename = "id")]
    pub product_id: ProductId,
    /// Price per unit, fixed when the line was created.
    #[serde(rename = "price", with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    /// Number of units.
    pub quantity: u32,
}

impl CartLine {
    /// A new line with quantity 1.
    #[must_use]
    pub const fn new(product_id: ProductId, unit_price: Decimal) -> Self {
        Self {
            product_id,
            unit_price,
            quantity: 1,
        }
    }

    /// `unit_price × quantity`, or `None` if it overflows.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// A single cart mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Add one unit of a product at the given price.
    Add {
        /// Product to add.
        product_id: ProductId,
        /// Price used only if the product is not in the cart yet.
        unit_price: Decimal,
    },
    /// Remove one unit of a product.
    Remove {
        /// Product to remove.
        product_id: ProductId,
    },
    /// Remove everything.
    Clear,
    /// Adopt a snapshot verbatim.
    Replace {
        /// The new contents.
        lines: Vec<CartLine>,
    },
}

impl CartAction {
    /// Short name for logs and breadcrumbs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Clear => "clear",
            Self::Replace { .. } => "replace",
        }
    }
}

/// The local cart.
///
/// Lines keep insertion order so that snapshots and listings are stable, but
/// no caller may rely on that order for meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a cart from a snapshot.
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    /// Add one unit of `product_id`.
    ///
    /// If the product is already in the cart its quantity goes up by one and
    /// `unit_price` is ignored. Otherwise a new line is created with quantity 1.
    pub fn add(&mut self, product_id: ProductId, unit_price: Decimal) {
        match self.line_mut(product_id) {
            Some(line) => line.quantity = line.quantity.saturating_add(1),
            None => self.lines.push(CartLine::new(product_id, unit_price)),
        }
    }

    /// Remove one unit of `product_id`.
    ///
    /// Deletes the line when its quantity would reach zero. Returns `false`
    /// (and changes nothing) if the product is not in the cart.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let Some(index) = self.position(product_id) else {
            return false;
        };

        let keep = self.lines.get_mut(index).is_some_and(|line| {
            if line.quantity > 1 {
                line.quantity -= 1;
                true
            } else {
                false
            }
        });

        if !keep {
            self.lines.remove(index);
        }
        true
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Discard the current contents and adopt `lines` as-is.
    pub fn replace(&mut self, lines: Vec<CartLine>) {
        self.lines = lines;
    }

    /// Apply an action in place. Returns whether the cart changed.
    pub fn apply(&mut self, action: CartAction) -> bool {
        match action {
            CartAction::Add {
                product_id,
                unit_price,
            } => {
                self.add(product_id, unit_price);
                true
            }
            CartAction::Remove { product_id } => self.remove(product_id),
            CartAction::Clear => {
                let changed = !self.lines.is_empty();
                self.clear();
                changed
            }
            CartAction::Replace { lines } => {
                let changed = self.lines != lines;
                self.replace(lines);
                changed
            }
        }
    }

    /// Pure form of [`Cart::apply`]: consume the prior state, return the next.
    #[must_use]
    pub fn reduce(mut self, action: CartAction) -> Self {
        self.apply(action);
        self
    }

    /// All lines.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// The line for `product_id`, if any.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Quantity of `product_id` in the cart (0 if absent).
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.line(product_id).map_or(0, |l| l.quantity)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines, saturating at `u32::MAX`.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.lines
            .iter()
            .fold(0, |total, l| total.saturating_add(l.quantity))
    }

    /// Sum of `unit_price × quantity` over all lines.
    ///
    /// Remote snapshots are adopted unchecked, so this returns `None` when the
    /// amount does not fit in a `Decimal`.
    #[must_use]
    pub fn subtotal(&self) -> Option<Decimal> {
        self.lines
            .iter()
            .try_fold(Decimal::ZERO, |total, l| total.checked_add(l.line_total()?))
    }

    /// The cart captured as order lines, for checkout.
    #[must_use]
    pub fn to_order_lines(&self) -> Vec<OrderLine> {
        self.lines
            .iter()
            .map(|l| OrderLine {
                product_id: l.product_id,
                price: l.unit_price,
                quantity: l.quantity,
            })
            .collect()
    }

    fn position(&self, product_id: ProductId) -> Option<usize> {
        self.lines.iter().position(|l| l.product_id == product_id)
    }

    fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| l.product_id == product_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn price(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    #[test]
    fn test_repeat_add_increments_and_keeps_first_price() {
        let mut cart = Cart::new();
        let p = ProductId::new(7);

        cart.add(p, price(999));
        cart.add(p, price(1));
        cart.add(p, price(5000));

        let line = cart.line(p).unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(line.unit_price, price(999));
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn test_two_adds_same_product() {
        let mut cart = Cart::new();
        cart.add(ProductId::new(7), price(999));
        cart.add(ProductId::new(7), price(999));

        assert_eq!(
            cart.lines(),
            &[CartLine {
                product_id: ProductId::new(7),
                unit_price: price(999),
                quantity: 2,
            }]
        );
    }

    #[test]
    fn test_remove_last_unit_deletes_line() {
        let mut cart = Cart::from_lines(vec![CartLine::new(ProductId::new(3), price(100))]);
        assert!(cart.remove(ProductId::new(3)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_remove_decrements() {
        let mut cart = Cart::new();
        cart.add(ProductId::new(1), price(100));
        cart.add(ProductId::new(1), price(100));
        cart.remove(ProductId::new(1));
        assert_eq!(cart.quantity_of(ProductId::new(1)), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut cart = Cart::new();
        cart.add(ProductId::new(1), price(100));
        let before = cart.clone();

        assert!(!cart.remove(ProductId::new(2)));
        assert_eq!(cart, before);

        let mut empty = Cart::new();
        assert!(!empty.remove(ProductId::new(2)));
        assert!(!empty.remove(ProductId::new(2)));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_balanced_adds_and_removes_leave_cart_empty() {
        let mut cart = Cart::new();
        let ids = [1, 2, 2, 3, 1, 2];
        for id in ids {
            cart.add(ProductId::new(id), price(250));
        }
        for id in ids.iter().rev() {
            cart.remove(ProductId::new(*id));
        }
        assert!(cart.is_empty());
        assert_eq!(cart.total_quantity(), 0);
    }

    #[test]
    fn test_interleaved_add_remove_round_trip() {
        let mut cart = Cart::new();
        for _ in 0..5 {
            cart.add(ProductId::new(9), price(10));
            cart.remove(ProductId::new(9));
        }
        assert!(cart.is_empty());
    }

    #[test]
    fn test_totals() {
        let mut cart = Cart::new();
        cart.add(ProductId::new(1), price(999));
        cart.add(ProductId::new(1), price(999));
        cart.add(ProductId::new(2), price(150));

        assert_eq!(cart.total_quantity(), 3);
        assert_eq!(cart.subtotal(), Some(price(2148)));
    }

    #[test]
    fn test_totals_of_oversized_snapshot() {
        let mut cart = Cart::new();
        cart.replace(vec![
            CartLine {
                product_id: ProductId::new(1),
                unit_price: Decimal::MAX,
                quantity: 2,
            },
            CartLine {
                product_id: ProductId::new(2),
                unit_price: price(100),
                quantity: u32::MAX,
            },
        ]);

        assert_eq!(cart.line(ProductId::new(1)).unwrap().line_total(), None);
        assert_eq!(cart.subtotal(), None);
        assert_eq!(cart.total_quantity(), u32::MAX);
    }

    #[test]
    fn test_subtotal_overflow_across_lines() {
        let mut cart = Cart::new();
        cart.add(ProductId::new(1), Decimal::MAX);
        cart.add(ProductId::new(2), Decimal::MAX);

        assert_eq!(
            cart.line(ProductId::new(1)).unwrap().line_total(),
            Some(Decimal::MAX)
        );
        assert_eq!(cart.subtotal(), None);
    }

    #[test]
    fn test_apply_reports_changes() {
        let mut cart = Cart::new();
        assert!(!cart.apply(CartAction::Clear));
        assert!(cart.apply(CartAction::Add {
            product_id: ProductId::new(1),
            unit_price: price(100),
        }));
        assert!(!cart.apply(CartAction::Remove {
            product_id: ProductId::new(5),
        }));
        assert!(!cart.apply(CartAction::Replace {
            lines: cart.lines().to_vec(),
        }));
        assert!(cart.apply(CartAction::Clear));
    }

    #[test]
    fn test_reduce_is_pure_step() {
        let start = Cart::new();
        let next = start.clone().reduce(CartAction::Add {
            product_id: ProductId::new(4),
            unit_price: price(300),
        });
        assert!(start.is_empty());
        assert_eq!(next.quantity_of(ProductId::new(4)), 1);
    }

    #[test]
    fn test_replace_adopts_snapshot_verbatim() {
        let mut cart = Cart::new();
        cart.add(ProductId::new(1), price(100));

        let snapshot = vec![CartLine {
            product_id: ProductId::new(8),
            unit_price: price(4200),
            quantity: 5,
        }];
        cart.replace(snapshot.clone());
        assert_eq!(cart.lines(), snapshot.as_slice());
    }

    #[test]
    fn test_wire_format() {
        let mut cart = Cart::new();
        cart.add(ProductId::new(7), price(999));

        let json = serde_json::to_value(cart.lines()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "id": 7, "price": 9.99, "quantity": 1 }])
        );

        let lines: Vec<CartLine> =
            serde_json::from_str(r#"[{"id": 3, "price": 12.5, "quantity": 2}]"#).unwrap();
        assert_eq!(lines[0].unit_price, price(1250));
        assert_eq!(lines[0].quantity, 2);
    }

    #[test]
    fn test_to_order_lines_captures_prices() {
        let mut cart = Cart::new();
        cart.add(ProductId::new(1), price(999));
        cart.add(ProductId::new(1), price(999));

        let lines = cart.to_order_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].price, price(999));
        assert_eq!(lines[0].quantity, 2);
    }
}
