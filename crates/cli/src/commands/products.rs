//! Catalog commands.

use pocket_shop_client::{AppState, CatalogLookup, ClientError};
use pocket_shop_core::ProductId;

use super::cart::format_price;

/// Print one product.
#[allow(clippy::print_stdout)]
pub async fn show(state: &AppState, id: ProductId) -> Result<(), ClientError> {
    let product = state.catalog().get_product(id).await?;
    println!("#{} {}", product.id, product.title);
    println!("  {} | {}", format_price(product.price), product.category);
    if !product.description.is_empty() {
        println!("  {}", product.description);
    }
    Ok(())
}

/// Print the catalog, or only the products in `category`.
#[allow(clippy::print_stdout)]
pub async fn list(state: &AppState, category: Option<&str>) -> Result<(), ClientError> {
    let products = match category {
        Some(category) => state.catalog().products_in_category(category).await?,
        None => state.catalog().list_products().await?,
    };

    for product in &products {
        println!(
            "  #{:<6} {:>10}  {}",
            product.id,
            format_price(product.price),
            product.title
        );
    }
    println!("  {} products", products.len());
    Ok(())
}

/// Print the catalog's categories.
#[allow(clippy::print_stdout)]
pub async fn categories(state: &AppState) -> Result<(), ClientError> {
    for category in state.catalog().categories().await? {
        println!("  {category}");
    }
    Ok(())
}
