//! Cart commands.
//!
//! The CLI keeps no state between runs, so every command starts by pulling
//! the backend's cart and waits for its own push before exiting.

use pocket_shop_client::{AppState, CatalogLookup, ClientError, PushOutcome};
use pocket_shop_core::{Cart, Money, ProductId};
use rust_decimal::Decimal;

/// Print the backend's cart.
pub async fn show(state: &AppState) -> Result<(), ClientError> {
    state.cart().pull().await?;
    print_cart(&state.cart().cart());
    Ok(())
}

/// Add one unit of `product_id`, at `price` or the catalog price.
pub async fn add(
    state: &AppState,
    product_id: ProductId,
    price: Option<Decimal>,
) -> Result<(), ClientError> {
    state.cart().pull().await?;

    let unit_price = match price {
        Some(price) => price,
        None => state.catalog().get_product(product_id).await?.price,
    };

    let outcome = state.cart().add(product_id, unit_price).wait().await?;
    log_outcome(outcome);
    print_cart(&state.cart().cart());
    Ok(())
}

/// Remove one unit of `product_id`.
pub async fn remove(state: &AppState, product_id: ProductId) -> Result<(), ClientError> {
    state.cart().pull().await?;
    let outcome = state.cart().remove(product_id).wait().await?;
    log_outcome(outcome);
    print_cart(&state.cart().cart());
    Ok(())
}

/// Empty the cart.
pub async fn clear(state: &AppState) -> Result<(), ClientError> {
    state.cart().pull().await?;
    let outcome = state.cart().clear().wait().await?;
    log_outcome(outcome);
    print_cart(&state.cart().cart());
    Ok(())
}

fn log_outcome(outcome: PushOutcome) {
    match outcome {
        PushOutcome::Delivered { revision } | PushOutcome::Superseded { revision } => {
            tracing::debug!(revision, "Cart synced");
        }
        PushOutcome::Unchanged => tracing::info!("Cart unchanged"),
    }
}

/// Format a decimal amount as dollars, falling back to the raw decimal.
pub fn format_price(amount: Decimal) -> String {
    Money::from_decimal(amount).map_or_else(|| amount.to_string(), |m| m.to_string())
}

/// Format a computed total, which is absent when it overflowed.
fn format_total(amount: Option<Decimal>) -> String {
    amount.map_or_else(|| "out of range".to_string(), format_price)
}

#[allow(clippy::print_stdout)]
fn print_cart(cart: &Cart) {
    if cart.is_empty() {
        println!("Cart is empty");
        return;
    }

    for line in cart.lines() {
        println!(
            "  #{:<6} {:>3} x {:>10} = {:>10}",
            line.product_id,
            line.quantity,
            format_price(line.unit_price),
            format_total(line.line_total())
        );
    }
    println!(
        "  {} items, subtotal {}",
        cart.total_quantity(),
        format_total(cart.subtotal())
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(Decimal::new(999, 2)), "$9.99");
        assert_eq!(format_price(Decimal::new(9995, 3)), "$10.00");
    }

    #[test]
    fn test_format_price_beyond_money_range() {
        assert_eq!(format_price(Decimal::MAX), Decimal::MAX.to_string());
    }

    #[test]
    fn test_format_total_overflow() {
        let line = pocket_shop_core::CartLine {
            product_id: ProductId::new(1),
            unit_price: Decimal::MAX,
            quantity: 2,
        };
        assert_eq!(format_total(line.line_total()), "out of range");
        assert_eq!(format_total(Some(Decimal::ONE)), "$1.00");
    }
}
