//! Storefront bot
//!
//! A chat bot that walks a shopper through a commerce catalog, a cart and
//! checkout, keeping each conversation's position in a persisted state
//! machine.

mod commerce;
mod config;
mod credentials;
mod runtime;
mod state_machine;
mod store;
mod telegram;

use commerce::{CommerceClient, LoggingGateway};
use config::BotConfig;
use credentials::CredentialManager;
use runtime::{ProductionDispatcher, ProductionQueue};
use std::sync::Arc;
use std::time::Duration;
use store::SqliteSessionStore;
use telegram::TelegramClient;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pause before polling again after a failed `getUpdates`
const POLL_RETRY_DELAY: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; the environment may be set directly
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_bot=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = BotConfig::from_env()?;

    // Ensure database directory exists
    if let Some(parent) = config.session_db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.session_db_path.display(), "Opening session store");
    let session_ttl = config
        .session_ttl
        .map(|ttl| i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX));
    let store = SqliteSessionStore::open(&config.session_db_path)?.with_session_ttl(session_ttl);

    let commerce = Arc::new(CommerceClient::new(
        &config.commerce_api_url,
        config.client_id.clone(),
        config.client_secret.clone(),
        config.http_timeout,
    )?);
    tracing::info!(url = %config.commerce_api_url, "Commerce API configured");

    let refresh_margin = i64::try_from(config.token_refresh_margin.as_secs()).unwrap_or(i64::MAX);
    let credentials = Arc::new(
        CredentialManager::new(commerce.clone())
            .with_mirror(Arc::new(store.clone()))
            .with_refresh_margin(refresh_margin),
    );

    let telegram = Arc::new(TelegramClient::new(
        &config.telegram_token,
        config.http_timeout,
    )?);

    let dispatcher: Arc<ProductionDispatcher> = Arc::new(runtime::Dispatcher::new(
        store,
        LoggingGateway::new(commerce),
        telegram.clone(),
        credentials,
    ));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            tracing::info!("Shutdown requested, finishing in-flight updates");
            shutdown.cancel();
        }
    });

    let queue = ProductionQueue::new(dispatcher);
    run(&telegram, &queue, config.poll_timeout, &shutdown).await;
    queue.shutdown().await;

    tracing::info!("Stopped");
    Ok(())
}

/// Long-poll for updates and queue each behind earlier ones from the same
/// conversation until shutdown
async fn run(
    telegram: &TelegramClient,
    queue: &ProductionQueue,
    poll_timeout: Duration,
    shutdown: &CancellationToken,
) {
    let mut offset = 0;

    tracing::info!(poll_timeout_secs = poll_timeout.as_secs(), "Polling for updates");

    loop {
        let polled = tokio::select! {
            () = shutdown.cancelled() => break,
            polled = telegram.poll_updates(offset, poll_timeout) => polled,
        };

        match polled {
            Ok((next_offset, updates)) => {
                offset = next_offset;
                for update in updates {
                    queue.push(update);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Polling failed");
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                }
            }
        }
    }
}
