//! Order lifecycle stages.
//!
//! An order moves `New → Paid → Delivered`. The stage is never stored; it is
//! derived from the two flags the backend keeps (`is_paid`, `is_delivered`).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle stage of an order, ordered by progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStage {
    /// Placed, not paid.
    New,
    /// Paid, not yet received.
    Paid,
    /// Received by the customer.
    Delivered,
}

impl OrderStage {
    /// All stages in progression order.
    pub const ALL: [Self; 3] = [Self::New, Self::Paid, Self::Delivered];

    /// Classify an order by its flags.
    ///
    /// `is_delivered` wins regardless of `is_paid`: the backend is allowed to
    /// report a delivered order that was never marked paid, and it still
    /// belongs to the delivered view.
    #[must_use]
    pub const fn classify(is_paid: bool, is_delivered: bool) -> Self {
        match (is_paid, is_delivered) {
            (_, true) => Self::Delivered,
            (true, false) => Self::Paid,
            (false, false) => Self::New,
        }
    }

    /// The `(is_paid, is_delivered)` flags an update request sends to move an
    /// order into this stage.
    #[must_use]
    pub const fn flags(self) -> (bool, bool) {
        match self {
            Self::New => (false, false),
            Self::Paid => (true, false),
            Self::Delivered => (true, true),
        }
    }

    /// Whether a client-driven transition from `self` to `target` moves forward.
    #[must_use]
    pub fn can_advance_to(self, target: Self) -> bool {
        target > self
    }
}

impl fmt::Display for OrderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Paid => write!(f, "paid"),
            Self::Delivered => write!(f, "delivered"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_all_flag_combinations() {
        assert_eq!(OrderStage::classify(false, false), OrderStage::New);
        assert_eq!(OrderStage::classify(true, false), OrderStage::Paid);
        assert_eq!(OrderStage::classify(true, true), OrderStage::Delivered);
        assert_eq!(OrderStage::classify(false, true), OrderStage::Delivered);
    }

    #[test]
    fn test_flags_classify_back_to_stage() {
        for stage in OrderStage::ALL {
            let (paid, delivered) = stage.flags();
            assert_eq!(OrderStage::classify(paid, delivered), stage);
        }
    }

    #[test]
    fn test_only_forward_transitions() {
        assert!(OrderStage::New.can_advance_to(OrderStage::Paid));
        assert!(OrderStage::New.can_advance_to(OrderStage::Delivered));
        assert!(OrderStage::Paid.can_advance_to(OrderStage::Delivered));

        assert!(!OrderStage::Paid.can_advance_to(OrderStage::Paid));
        assert!(!OrderStage::Delivered.can_advance_to(OrderStage::Paid));
        assert!(!OrderStage::Delivered.can_advance_to(OrderStage::Delivered));
    }
}
