use std::sync::Arc;

use pharmacy_core::{DomainResult, SystemClock};
use pharmacy_infra::{
    config::DatabaseConfig, InMemoryInventoryStore, InventoryConfig, InventoryServices,
    InventoryStore, PgInventoryStore,
};

/// Select the store from config and wire the services over the system clock.
pub async fn build_services(config: &InventoryConfig) -> DomainResult<InventoryServices> {
    let store: Arc<dyn InventoryStore> = match &config.database {
        Some(db) => Arc::new(build_persistent_store(db).await?),
        None => {
            tracing::info!("using in-memory inventory store");
            Arc::new(InMemoryInventoryStore::new())
        }
    };

    Ok(InventoryServices::new(store, Arc::new(SystemClock)))
}

async fn build_persistent_store(db: &DatabaseConfig) -> DomainResult<PgInventoryStore> {
    tracing::info!(max_connections = db.max_connections, "connecting to postgres");
    let store = PgInventoryStore::connect(&db.url, db.max_connections).await?;

    if db.run_migrations {
        store.migrate().await?;
        tracing::info!("schema migrations applied");
    }
    Ok(store)
}
