use collab_service::config::CollabConfig;
use collab_service::services::init_metrics;
use collab_service::startup::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_metrics()?;

    let config = CollabConfig::load()?;

    let otlp_endpoint = config
        .common
        .otlp_endpoint
        .clone()
        .or_else(|| std::env::var("OTLP_ENDPOINT").ok());
    init_tracing(
        "collab-service",
        &config.common.log_level,
        otlp_endpoint.as_deref(),
    )?;

    tracing::info!(
        store = ?config.store.backend,
        pad_endpoint = %config.remote.endpoint,
        session_scope = ?config.session.scope,
        "Starting collab-service"
    );

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
