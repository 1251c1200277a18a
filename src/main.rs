use pallet_stacker::api;
use pallet_stacker::config::AppConfig;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_VAR: &str = "PALLET_STACKER_LOG";
const DEFAULT_LOG_FILTER: &str = "pallet_stacker=info,tower_http=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[tokio::main]
async fn main() {
    let dotenv_result = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            tracing::warn!(%err, "could not load .env");
        }
    }

    let app_config = AppConfig::from_env();
    tracing::info!("pallet stacking service starting");

    if let Err(err) = api::start_api_server(app_config.api, app_config.engine).await {
        tracing::error!(%err, "API server terminated with an error");
        std::process::exit(1);
    }
}
