#![allow(clippy::result_large_err)]

use dotenvy::dotenv;
use nutrisport::{
    config::{catalog, database, settings},
    core::product,
    errors::Result,
    store::Store,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load settings
    let settings = settings::load_default_settings()
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;
    info!("Loaded settings: {:?}", settings);

    // 4. Open the database and make sure every table exists
    let db = database::create_connection(&settings.database_url())
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    let store = Store::with_capacity(db, settings.change_capacity).with_batch_size(settings.batch_size);

    // 5. Seed the catalog, if one is configured
    if let Some(path) = &settings.catalog_path {
        let catalog = catalog::load_catalog(path)
            .inspect_err(|e| error!("Failed to load catalog {}: {}", path.display(), e))?;
        let inserted = product::seed_catalog(&store, &catalog.products)
            .await
            .inspect_err(|e| error!("Failed to seed catalog: {}", e))?;
        info!("Catalog ready, {} new products", inserted);
    } else {
        info!("No catalog configured, skipping seed");
    }

    info!("Storefront data core ready");
    Ok(())
}
