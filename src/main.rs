use fmp_income_relay::api::{self, AppState};
use fmp_income_relay::config::AppConfig;
use fmp_income_relay::fmp::FmpClient;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = AppConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Set a global span with node_name for all subsequent logs
    let _span = tracing::info_span!("node", name = %app_config.node_name).entered();

    tracing::info!("Starting fmp-income-relay");
    tracing::info!(environment = %app_config.environment, port = app_config.port, "Loaded configuration");

    let fmp_client = FmpClient::new(app_config.api_key.clone(), app_config.upstream_timeout)?
        .with_base_url(app_config.upstream_base_url.clone())
        .with_statement_limit(app_config.statement_limit);
    tracing::debug!(?fmp_client, "FMP client initialized");

    let app_state = AppState::new(Arc::new(fmp_client));

    tracing::info!(
        requests_per_second = app_config.rate_limit.requests_per_second,
        burst = app_config.rate_limit.burst_size,
        "Per-IP rate limit"
    );
    let mut app = api::with_rate_limit(api::router(app_state), &app_config.rate_limit)?;

    if app_config.cors_permissive {
        // Allow-all CORS, switch off in production
        tracing::warn!("Permissive CORS enabled");
        app = app.layer(CorsLayer::permissive());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], app_config.port));
    tracing::info!(%addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
