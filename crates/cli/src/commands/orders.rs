//! Order commands.

use pocket_shop_client::{AppState, ClientError};
use pocket_shop_core::{Order, OrderBuckets, OrderId, OrderStage};

use super::cart::format_price;

/// Print every order grouped by stage.
pub async fn list(state: &AppState) -> Result<(), ClientError> {
    let buckets = state.orders().fetch_all().await?;
    print_buckets(&buckets);
    Ok(())
}

/// Place an order from the cart, then clear the cart.
#[allow(clippy::print_stdout)]
pub async fn checkout(state: &AppState) -> Result<(), ClientError> {
    state.cart().pull().await?;
    let (order_id, cleared) = state.checkout().await?;

    // The order exists either way; a failed clear leaves the cart to retry.
    if let Err(e) = cleared.wait().await {
        tracing::warn!(error = %e, "Cart not cleared after checkout");
    }

    match order_id {
        Some(id) => println!("Placed order {id}"),
        None => println!("Order placed"),
    }
    print_buckets(&state.orders().buckets().await);
    Ok(())
}

/// Mark an order paid.
pub async fn pay(state: &AppState, order_id: OrderId) -> Result<(), ClientError> {
    state.orders().fetch_all().await?;
    let buckets = state.orders().mark_paid(order_id).await?;
    print_buckets(&buckets);
    Ok(())
}

/// Mark an order delivered.
pub async fn receive(state: &AppState, order_id: OrderId) -> Result<(), ClientError> {
    state.orders().fetch_all().await?;
    let buckets = state.orders().mark_delivered(order_id).await?;
    print_buckets(&buckets);
    Ok(())
}

/// Print an order with its items resolved against the catalog.
#[allow(clippy::print_stdout)]
pub async fn show(state: &AppState, order_id: OrderId) -> Result<(), ClientError> {
    state.orders().fetch_all().await?;
    let order = state
        .orders()
        .order(order_id)
        .await
        .ok_or(ClientError::OrderNotFound(order_id))?;

    print_order(&order);
    let details = state.details().expand(order.id, &order.lines).await?;
    for item in &*details {
        println!(
            "    #{:<6} {:>3} x {:>10}  {}",
            item.product_id,
            item.quantity,
            format_price(item.price),
            item.title
        );
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_buckets(buckets: &OrderBuckets) {
    for stage in OrderStage::ALL {
        let orders = buckets.bucket(stage);
        println!("{stage} ({})", orders.len());
        for order in orders {
            print_order(order);
        }
    }
}

#[allow(clippy::print_stdout)]
fn print_order(order: &Order) {
    println!(
        "  order {:<6} {:>3} items  {:>10}",
        order.id, order.item_count, order.total_price
    );
}
