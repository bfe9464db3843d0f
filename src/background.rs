use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, info_span, Instrument};
use crate::state::AppState;

/// One sweep: reap expired lock rows, then expire booking links nobody used.
pub async fn run_maintenance(state: &AppState) {
    match state.scheduler.purge_expired_locks().await {
        Ok(0) => {}
        Ok(purged) => info!("Purged {} expired slot locks", purged),
        Err(e) => error!("Failed to purge expired locks: {:?}", e),
    }

    let ttl = chrono::Duration::days(state.config.booking_link_ttl_days);
    match state.scheduler.expire_stale_links(ttl).await {
        Ok(0) => {}
        Ok(expired) => info!("Cancelled {} pending bookings with expired links", expired),
        Err(e) => error!("Failed to expire stale booking links: {:?}", e),
    }
}

pub async fn start_background_worker(state: Arc<AppState>) {
    let interval = Duration::from_secs(state.config.maintenance_interval_secs.max(1));
    info!("Starting maintenance worker (every {:?})...", interval);

    loop {
        run_maintenance(&state)
            .instrument(info_span!("maintenance"))
            .await;
        sleep(interval).await;
    }
}
