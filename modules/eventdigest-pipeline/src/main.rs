use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use eventdigest_common::Config;
use eventdigest_extract::EventExtractor;
use eventdigest_notify::{email_sender_from_config, TelegramNotifier};
use eventdigest_pipeline::Pipeline;
use eventdigest_scraper::{
    DetailFetcher, ListingScraper, NoopSearcher, SerperSearcher, WebSearcher,
};
use eventdigest_store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("eventdigest=info".parse()?))
        .init();

    info!("eventdigest starting...");

    let config = Config::from_env();
    config.log_redacted();

    let pool = PgPool::connect(&config.database_url).await?;
    let store = PgStore::new(pool);
    store.migrate().await?;

    let searcher: Arc<dyn WebSearcher> = if config.serper_api_key.is_empty() {
        Arc::new(NoopSearcher)
    } else {
        Arc::new(SerperSearcher::new(&config.serper_api_key))
    };

    let pipeline = Pipeline::new(
        Arc::new(ListingScraper::new(&config.scrape_url)),
        Arc::new(DetailFetcher::new(
            config.detail_concurrency,
            config.detail_timeout_secs,
            searcher,
        )),
        Arc::new(EventExtractor::new(
            &config.openai_api_key,
            &config.openai_model,
        )),
        Arc::new(store),
        email_sender_from_config(&config),
        Arc::new(TelegramNotifier::new(&config.telegram_bot_token)),
    );

    let stats = pipeline.run().await?;
    info!("{stats}");

    Ok(())
}
