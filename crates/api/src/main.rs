use anyhow::{Context, Result};
use medbot_agents::AgentConfig;
use medbot_api::{build_app, ApiConfig};
use medbot_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("medbot_api");

    let agent_config = AgentConfig::from_env()?;
    let api_config = ApiConfig::from_env();

    let app = build_app(&agent_config, &api_config).context("refusing to start")?;

    let listener = tokio::net::TcpListener::bind(&api_config.bind)
        .await
        .with_context(|| format!("failed binding {}", api_config.bind))?;
    tracing::info!(
        bind = %api_config.bind,
        catalog = %agent_config.catalog_path.display(),
        threshold = agent_config.confidence_threshold,
        "medbot api started"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
