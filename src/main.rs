use std::sync::Arc;

use anyhow::Context;
use tokio::{signal, sync::watch};
use tracing::{error, info, warn};

use flash_sale_orders as app;
use app::message_queue::{InMemoryMessageQueue, MessageQueue, RedisMessageQueue};
use app::notifications::{NoopNotifier, Notifier, RedisNotifier};
use app::services::ServiceSettings;
use app::AppServices;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = app::config::load_config().context("loading configuration")?;
    app::config::init_tracing(&cfg.log_level, cfg.log_json);
    info!(environment = %cfg.environment, "Starting flash-sale-orders");

    let db_pool = app::db::establish_connection_from_app_config(&cfg)
        .await
        .context("connecting to database")?;
    if cfg.auto_migrate {
        app::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db = Arc::new(db_pool);

    let notifier: Arc<dyn Notifier> = if cfg.notifications_enabled {
        Arc::new(RedisNotifier::new(&cfg.redis_url).context("opening redis for notifications")?)
    } else {
        warn!("Notifications disabled");
        Arc::new(NoopNotifier)
    };

    let queue: Arc<dyn MessageQueue> = match cfg.message_queue_backend.to_ascii_lowercase().as_str() {
        "redis" => Arc::new(
            RedisMessageQueue::connect(&cfg.redis_url)
                .await
                .context("connecting redis message queue")?,
        ),
        _ => Arc::new(InMemoryMessageQueue::new()),
    };
    info!(backend = %cfg.message_queue_backend, "Message queue ready");

    let services = AppServices::new(db, notifier, ServiceSettings::from(&cfg));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumers = app::consumers::spawn_consumers(queue, &services, &cfg, shutdown_rx);

    serve(&cfg, services).await?;

    info!("Shutting down consumers");
    let _ = shutdown_tx.send(true);
    for handle in consumers {
        if let Err(err) = handle.await {
            error!(error = %err, "Consumer task failed");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

#[cfg(feature = "grpc")]
async fn serve(cfg: &app::config::AppConfig, services: AppServices) -> anyhow::Result<()> {
    let addr = cfg.grpc_addr().parse().context("parsing gRPC address")?;
    app::grpc::serve(services, addr, shutdown_signal()).await?;
    Ok(())
}

#[cfg(not(feature = "grpc"))]
async fn serve(_cfg: &app::config::AppConfig, _services: AppServices) -> anyhow::Result<()> {
    info!("Built without the grpc feature; running queue consumers only");
    shutdown_signal().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for ctrl-c");
    }
    info!("Shutdown signal received");
}
