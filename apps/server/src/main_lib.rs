use std::sync::Arc;

use stockdash_core::{
    AcquisitionConfig, QuoteAcquisitionService, QuoteCache, QuoteStore, QuoteSubscriptions,
    StoreSeeder,
};
use stockdash_market_data::{EdgeFunctionProvider, LiveQuoteProvider};
use stockdash_storage_sqlite::{db, QuoteRepository};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub cache: Arc<QuoteCache>,
    pub quote_service: QuoteAcquisitionService,
    pub seeder: StoreSeeder,
    pub subscriptions: QuoteSubscriptions,
}

impl AppState {
    /// Wires the quote layer around a store and a live provider.
    pub fn new(
        store: Arc<dyn QuoteStore>,
        provider: Arc<dyn LiveQuoteProvider>,
        config: AcquisitionConfig,
    ) -> Self {
        let cache = Arc::new(QuoteCache::new());
        let seeder = StoreSeeder::new(
            Arc::clone(&store),
            Arc::clone(&provider),
            config.provider_timeout,
        );
        let quote_service =
            QuoteAcquisitionService::new(Arc::clone(&cache), store, provider, config);
        let subscriptions = QuoteSubscriptions::new(quote_service.clone(), seeder.clone());
        Self {
            cache,
            quote_service,
            seeder,
            subscriptions,
        }
    }
}

pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let acquisition = config.acquisition();
    acquisition.validate()?;

    db::init(&config.db_path)?;
    tracing::info!("Database path in use: {}", config.db_path);
    let pool = db::create_pool(&config.db_path)?;
    db::run_migrations(&pool)?;
    let writer = db::spawn_writer(Arc::clone(&pool));

    let store: Arc<dyn QuoteStore> = Arc::new(QuoteRepository::new(pool, writer));
    let provider = EdgeFunctionProvider::new(config.edge_function());
    tracing::info!("Live quotes from {}", provider.endpoint());
    let provider: Arc<dyn LiveQuoteProvider> = Arc::new(provider);

    Ok(Arc::new(AppState::new(store, provider, acquisition)))
}
