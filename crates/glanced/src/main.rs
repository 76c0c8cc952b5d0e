use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod events;
mod extractor;
mod settings;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("glanced starting");

    let config = config::Config::from_env();
    let settings = settings::Settings::load(&config.settings_path);
    tracing::info!(
        notifications = settings.notifications_enabled,
        cooldown_secs = settings.effective_cooldown_secs(config.cooldown_secs),
        live_threshold = config.live_threshold,
        storage_threshold = config.storage_threshold,
        "configuration loaded"
    );

    let events = events::EventBus::new(256);
    let engine = engine::spawn_engine(
        glance_core::MemoryStore::new(),
        config.cluster_config(),
        engine::EngineOptions {
            cooldown_secs: settings.effective_cooldown_secs(config.cooldown_secs),
            burst_secs: config.burst_secs,
            notifications_enabled: settings.notifications_enabled,
        },
        events.clone(),
    );

    // Notification consumer, decoupled from the matching path: it only
    // reacts to the event feed.
    let mut feed = events.subscribe();
    tokio::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(event) => {
                    tracing::info!(name = %event.name, at = %event.recognized_at, "recognized");
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event feed lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    tracing::info!("glanced ready; frame sources drive recognition through the engine handle");

    // Keep the engine alive until signaled; in-flight persistence finishes
    // on the engine thread, no further frames are scheduled after this.
    tokio::signal::ctrl_c().await?;
    tracing::info!("glanced shutting down");
    drop(engine);

    Ok(())
}
