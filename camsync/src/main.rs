use std::sync::Arc;

use camsync::config::SyncConfig;
use camsync::logging;
use camsync::persistence::JsonSnapshotStore;
use camsync::scheduler::CycleEvent;
use camsync::service::SyncService;
use camsync_platforms::extractor::{
    AuthProvider, PlatformFactory, ReqwestTransport, StaticAuth, default_client,
};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let config = SyncConfig::from_env()?;

    let (logging, _guard) = logging::init_logging(&config.log_dir)?;
    if let Some(directive) = &config.log_filter {
        logging.set_filter(directive)?;
    }
    debug!(filter = %logging.get_filter(), "Logging initialized");
    let shutdown = CancellationToken::new();
    logging.start_retention_cleanup(shutdown.clone());

    let transport = Arc::new(ReqwestTransport::new(default_client(
        config.request_timeout(),
    )?));
    let auth: Arc<dyn AuthProvider> = match (&config.session_key, config.user_id) {
        (Some(key), Some(user_id)) => Arc::new(StaticAuth::new(key.clone(), user_id)),
        _ => Arc::new(StaticAuth::anonymous()),
    };
    let factory = PlatformFactory::new(transport, auth);
    let feed = factory.create_feed(config.platform, config.require_feed_url()?)?;
    let store = Arc::new(JsonSnapshotStore::new(&config.data_dir));

    let service = SyncService::new(&config, feed, store);
    service.load().await;

    let mut events = service.subscribe();
    let events_shutdown = shutdown.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = events_shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Ok(CycleEvent::Succeeded(report)) if !report.is_empty() => info!(
                        added = report.added.len(),
                        updated = report.updated.len(),
                        removed = report.removed.len(),
                        "Sessions changed"
                    ),
                    Ok(CycleEvent::Succeeded(_)) => debug!("No session changes"),
                    Ok(CycleEvent::Failed(message)) => debug!(%message, "Cycle failed"),
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Cycle events lagged"),
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });

    service.selected();
    info!(platform = %config.platform, "camsync running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    service.deselected().await;
    shutdown.cancel();

    Ok(())
}
