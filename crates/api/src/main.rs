use anyhow::Context;

use pharmacy_infra::InventoryConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pharmacy_observability::init();

    let config = InventoryConfig::from_env().context("invalid configuration")?;

    let app = pharmacy_api::app::build_app(&config)
        .await
        .context("failed to initialise inventory services")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
