use std::time::Duration;

use tracing::{info, warn};

use natter_api::session::SessionManager;

/// Background task that deletes expired sessions.
///
/// Expired sessions already read as unset; this only keeps the table from
/// growing without bound.
pub async fn run_session_sweeper(sessions: SessionManager, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        interval.tick().await;

        let sessions = sessions.clone();
        match tokio::task::spawn_blocking(move || sessions.sweep_expired()).await {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Session sweep: removed {} expired sessions", count);
                }
            }
            Ok(Err(e)) => warn!("Session sweep error: {:#}", e),
            Err(e) => warn!("Session sweep task failed: {}", e),
        }
    }
}
