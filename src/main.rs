use std::net::SocketAddr;
use std::sync::Arc;

use crm_metrics_api::api;
use crm_metrics_api::config::{Config, CustomerSourceConfig};
use crm_metrics_api::db::Database;
use crm_metrics_api::handlers::AppState;
use crm_metrics_api::obs;
use crm_metrics_api::store::{
    CustomerStore, PgCustomerStore, RemoteCustomerSource, StaticCustomerSource,
};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};

/// Opens the configured customer source.
async fn open_store(config: &Config) -> anyhow::Result<CustomerStore> {
    let store = match &config.source {
        CustomerSourceConfig::Postgres { database_url } => {
            let db = Database::new(database_url).await?;
            tracing::info!("Database connection pool established");
            CustomerStore::Postgres(PgCustomerStore::new(db.pool))
        }
        CustomerSourceConfig::Remote { base_url, token } => {
            let source = RemoteCustomerSource::new(base_url.clone(), token.clone())?;
            tracing::info!("✓ Remote customers client initialized: {}", base_url);
            CustomerStore::Remote(source)
        }
        CustomerSourceConfig::File { path } => {
            CustomerStore::Static(StaticCustomerSource::from_file(path).await?)
        }
    };
    Ok(store)
}

/// Main entry point for the application.
///
/// Initializes tracing, loads configuration, opens the customer source and
/// serves the API with CORS and per-IP rate limiting.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing();

    let config = Config::from_env()?;
    let store = open_store(&config).await?;
    let cors = api::cors_layer(config.cors_origin.as_deref())?;
    let port = config.port;

    let app_state = Arc::new(AppState::new(config, store));

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = api::api_routes().layer(GovernorLayer {
        config: governor_conf,
    });

    let app = api::app(app_state, protected_routes).layer(cors);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Peer address is the rate limiter's fallback key when no proxy headers are present.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
