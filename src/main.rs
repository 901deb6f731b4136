//! Coconut supply-chain dashboard service: binary entrypoint.
//! Boots the Axum HTTP server, wiring config, the refresh engine, and routes.

use std::sync::Arc;

use coconut_dashboard::{
    api::{self, AppState},
    config::DashboardConfig,
    http::ReqwestTransport,
    metrics::Metrics,
};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - DASHBOARD_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("DASHBOARD_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dashboard=info,scheduler=info,predict=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let cfg = DashboardConfig::load_default()?;
    let metrics = Metrics::init(cfg.refresh_interval_ms)?;
    let transport = Arc::new(ReqwestTransport::new().map_err(anyhow::Error::from)?);
    let state = AppState::from_config(&cfg, transport)?;

    // Immediate first cycle, then every refresh_interval.
    state.start_refresh(cfg.refresh_interval());

    let router = api::router(state).merge(metrics.router());

    Ok(router.into())
}
