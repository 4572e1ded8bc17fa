use std::sync::Arc;

use webhook_proxy::{api, config::AppConfig, kv::redis::RedisKvStore, store::WebhookStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webhook_proxy=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env().map_err(|err| anyhow::anyhow!(err.to_string()))?;
    let kv = RedisKvStore::connect(&config.redis_url)?;

    let app = api::router(api::AppState {
        store: WebhookStore::new(Arc::new(kv)),
        client: reqwest::Client::new(),
        forward_url: config.forward_url.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, forward_url = %config.forward_url, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
