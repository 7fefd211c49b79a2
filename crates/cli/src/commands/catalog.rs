//! Inspect the hosted catalog.

use tracing::info;

use luxury_jewelry_core::CurrencyCode;
use luxury_jewelry_storefront::config::SupabaseConfig;
use luxury_jewelry_storefront::db::{CatalogRepository, SupabaseStore};
use luxury_jewelry_storefront::supabase::DataClient;

/// List every product, newest first.
///
/// # Errors
///
/// Returns an error if environment variables are missing or the service
/// cannot be reached.
pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let config = SupabaseConfig::from_env_with_key("SUPABASE_ANON_KEY")?;
    let store = SupabaseStore::new(DataClient::new(&config)?);

    let currency = std::env::var("STOREFRONT_CURRENCY")
        .ok()
        .and_then(|c| c.parse::<CurrencyCode>().ok())
        .unwrap_or_default();

    let products = store.list_products().await?;

    info!("Catalog");
    info!("=======");
    info!("Total products: {}", products.len());

    for product in &products {
        info!(
            "  {} | {} | {} | stock {}{}",
            product.id,
            product.name,
            product.price(currency).display(),
            product.stock.get(),
            if product.featured { " | featured" } else { "" },
        );
    }

    Ok(())
}
