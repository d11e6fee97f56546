use anyhow::Context;

use partyplan_infra::RegistryConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    partyplan_observability::init();

    let config = RegistryConfig::from_env().context("invalid configuration")?;
    let app = partyplan_api::app::build_app(&config)
        .await
        .context("failed to initialise registry services")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        persistent = config.is_persistent(),
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
