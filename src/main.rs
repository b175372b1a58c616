use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use tokio::signal;
use tracing::info;

use givefast_backend::api::{self, AppState};
use givefast_backend::config::AppConfig;
use givefast_backend::database;
use givefast_backend::database::tenant_config_repository::PgTenantSettings;
use givefast_backend::database::transaction_repository::PgTransactionStore;
use givefast_backend::logging::init_tracing;
use givefast_backend::payments::factory::GatewayFactory;
use givefast_backend::payments::provider::PaymentGateway;
use givefast_backend::payments::providers::payfast::PayfastGateway;
use givefast_backend::payments::reference::ReferenceCodec;
use givefast_backend::payments::types::ProviderName;
use givefast_backend::services::checkout::CheckoutService;
use givefast_backend::services::itn_processor::ItnProcessor;
use givefast_backend::tenants::{CachedTenantSettings, TenantSettingsStore};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::from_env()?;
    config.validate()?;
    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting GiveFast backend service"
    );

    let pool = database::init_pool_from_config(&config.database).await?;

    let codec = ReferenceCodec::new(&config.platform.signing_secret);

    let mut factory = GatewayFactory::new(config.platform.default_provider);
    factory.register(ProviderName::Payfast, |tenant_config| {
        PayfastGateway::from_tenant_config(tenant_config)
            .map(|gateway| Arc::new(gateway) as Arc<dyn PaymentGateway>)
    });
    let factory = Arc::new(factory);

    let transactions = Arc::new(PgTransactionStore::new(pool.clone()));
    let tenant_settings = Arc::new(PgTenantSettings::new(pool.clone()));
    // Checkout tolerates briefly stale credentials; notification
    // verification never does.
    let cached_tenants: Arc<dyn TenantSettingsStore> = Arc::new(CachedTenantSettings::new(
        tenant_settings.clone(),
        Duration::from_secs(config.platform.tenant_config_ttl_secs),
    ));

    let checkout = Arc::new(CheckoutService::new(
        codec.clone(),
        factory.clone(),
        cached_tenants,
        transactions.clone(),
        config.platform.notify_url.clone(),
    ));
    let itn = Arc::new(ItnProcessor::new(
        codec,
        factory,
        tenant_settings,
        transactions,
    ));

    let app = api::router(AppState {
        checkout,
        itn,
        pool,
    });

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}
