use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use stockyard_api::app::{self, background};
use stockyard_infra::config::AppConfig;

/// How often abandoned payment sessions are looked for.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockyard_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = Arc::new(
        app::build_services(&config)
            .await
            .context("failed to wire services")?,
    );

    let _audit = background::spawn_audit_log(services.commerce.bus.clone());
    let _sweeper = background::spawn_session_sweeper(services.clone(), SWEEP_INTERVAL);

    let router = app::build_app(services, &config.jwt_secret);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router).await?;
    Ok(())
}
