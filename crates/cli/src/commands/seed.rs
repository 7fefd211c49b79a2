//! Seed the product catalog from a YAML file.
//!
//! The file is validated in full before anything is written. Inserts go
//! through the service-role key, which bypasses row-level security.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use luxury_jewelry_storefront::config::SupabaseConfig;
use luxury_jewelry_storefront::db::{CatalogRepository, MemoryStore, SupabaseStore};
use luxury_jewelry_storefront::models::NewProduct;
use luxury_jewelry_storefront::supabase::DataClient;

/// Environment variable holding the key with write access.
const SERVICE_ROLE_KEY_VAR: &str = "SUPABASE_SERVICE_ROLE_KEY";

/// Top-level layout of a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub products: Vec<NewProduct>,
}

/// A problem with one entry of a seed file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeedError {
    #[error("product #{0}: name is empty")]
    EmptyName(usize),
    #[error("product #{index} ({name}): price must not be negative")]
    NegativePrice { index: usize, name: String },
    #[error("product #{index} ({name}): duplicate name")]
    DuplicateName { index: usize, name: String },
}

/// Outcome of a seeding run.
#[derive(Debug, Default)]
pub struct SeedReport {
    pub inserted: usize,
    pub errors: Vec<(String, String)>,
}

/// Check every entry; returns all problems, not just the first.
#[must_use]
pub fn validate(products: &[NewProduct]) -> Vec<SeedError> {
    let mut errors = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (index, product) in products.iter().enumerate() {
        let name = product.name.trim();
        if name.is_empty() {
            errors.push(SeedError::EmptyName(index + 1));
            continue;
        }
        if product.price.is_sign_negative() {
            errors.push(SeedError::NegativePrice {
                index: index + 1,
                name: name.to_string(),
            });
        }
        if !seen.insert(name.to_lowercase()) {
            errors.push(SeedError::DuplicateName {
                index: index + 1,
                name: name.to_string(),
            });
        }
    }

    errors
}

/// Insert every product, continuing past individual failures.
pub async fn seed_catalog(repo: &dyn CatalogRepository, products: &[NewProduct]) -> SeedReport {
    let mut report = SeedReport::default();

    for product in products {
        match repo.insert_product(product).await {
            Ok(inserted) => {
                info!(id = %inserted.id, name = %inserted.name, "Inserted product");
                report.inserted += 1;
            }
            Err(e) => report.errors.push((product.name.clone(), e.to_string())),
        }
    }

    report
}

/// Seed products from a YAML file.
///
/// # Errors
///
/// Returns an error if environment variables are missing, the file cannot
/// be read or fails validation.
pub async fn products(file_path: &str, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading products from file");

    // Read and validate YAML before connecting to the service
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;
    info!(products = seed.products.len(), "Parsed seed file");

    let errors = validate(&seed.products);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let report = if dry_run {
        info!("Dry run: loading into an in-memory catalog");
        seed_catalog(&MemoryStore::new(), &seed.products).await
    } else {
        let config = SupabaseConfig::from_env_with_key(SERVICE_ROLE_KEY_VAR)?;
        let store = SupabaseStore::new(DataClient::new(&config)?);
        seed_catalog(&store, &seed.products).await
    };

    info!("Seeding complete!");
    info!("  Products inserted: {}", report.inserted);

    if !report.errors.is_empty() {
        error!("  Errors: {}", report.errors.len());
        for (name, err) in &report.errors {
            error!("    - {name}: {err}");
        }
        return Err(format!("{} products failed to insert", report.errors.len()).into());
    }

    Ok(())
}
