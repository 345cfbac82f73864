use std::sync::Arc;

use anyhow::Context;

use regauth_api::app::{AppServices, build_app};
use regauth_infra::GatewayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    regauth_observability::init();

    let config = GatewayConfig::from_env().context("loading configuration")?;
    let services = AppServices::connect(&config).await?;
    let app = build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
