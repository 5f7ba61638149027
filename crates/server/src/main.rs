// crates/server/src/main.rs
//! lobbyscout service binary.
//!
//! Opens the database, runs the initial primary and relay elections, then
//! hands off to the cadence scheduler: narrow and wide profile refresh
//! runs plus the matchmaking poll. Shuts the session pool down cleanly on
//! ctrl-c.

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use lobbyscout_core::{
    AccountStore, CrawlerConfig, Notifier, PoolConfig, ProfileCrawler, SessionPool,
    SessionProvider,
};
use lobbyscout_db::{Database, SqliteAccountStore};
use lobbyscout_server::{
    spawn_cadences, BrokerSessionProvider, Cadence, Config, MatchmakingPollTask, PollTaskConfig,
    ProfileRefreshTask, WebhookNotifier,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lobbyscout=info")),
        )
        .compact()
        .init();

    eprintln!("lobbyscout v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();

    let db = match &config.db_path {
        Some(path) => Database::new(path).await?,
        None => Database::open_default().await?,
    };
    let store: Arc<dyn AccountStore> = Arc::new(SqliteAccountStore::new(db));
    let provider: Arc<dyn SessionProvider> =
        Arc::new(BrokerSessionProvider::new(config.broker_url.clone()));

    let pool = Arc::new(SessionPool::new(
        store.clone(),
        provider.clone(),
        PoolConfig::default(),
    ));

    match pool.elect_primary().await {
        Ok(true) => tracing::info!("initial primary election succeeded"),
        Ok(false) => tracing::warn!("no playable primary candidate at startup"),
        Err(e) => tracing::warn!(error = %e, "initial primary election failed"),
    }
    match pool.elect_relay().await {
        Ok(true) => tracing::info!("relay session installed"),
        Ok(false) => tracing::info!("no relay candidate, direct messaging disabled"),
        Err(e) => tracing::warn!(error = %e, "relay election failed"),
    }

    let crawler = Arc::new(ProfileCrawler::new(
        store.clone(),
        provider.clone(),
        CrawlerConfig::default(),
    ));

    let notifier: Option<Arc<dyn Notifier>> = config
        .webhook_url
        .as_ref()
        .map(|url| Arc::new(WebhookNotifier::new(url.clone())) as Arc<dyn Notifier>);
    if notifier.is_none() {
        tracing::info!("no webhook configured, alerts disabled");
    }

    let poll_task = MatchmakingPollTask::new(
        pool.clone(),
        store.clone(),
        notifier,
        PollTaskConfig {
            channel: config.webhook_channel.clone(),
            profile_url_base: config.profile_url_base.clone(),
            relay_found_text: config.relay_found_text.clone(),
            ..PollTaskConfig::default()
        },
    );

    let handles = spawn_cadences(vec![
        Cadence::new(
            "self-refresh",
            config.self_refresh,
            Arc::new(ProfileRefreshTask::new(crawler.clone(), false)),
        ),
        Cadence::new(
            "wide-refresh",
            config.wide_refresh,
            Arc::new(ProfileRefreshTask::new(crawler, true)),
        ),
        Cadence::new("matchmaking-poll", config.poll, Arc::new(poll_task)),
    ]);

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    for handle in &handles {
        handle.abort();
    }
    pool.shutdown().await;

    Ok(())
}
