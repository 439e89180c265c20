mod config;
mod sweeper;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::info;

use natter_api::auth::AppStateInner;
use natter_api::password::Argon2Hasher;
use natter_api::router::router;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "natter=debug,natter_api=debug,natter_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // An unreachable store is fatal.
    let db = Arc::new(natter_db::Database::open(&config.db_path)?);
    match db.latest_message_id()? {
        Some(id) => info!("Message log resumes after id {}", id),
        None => info!("Message log is empty"),
    }

    let state = AppStateInner::new(
        db,
        Arc::new(Argon2Hasher::new()),
        config.session_ttl,
        config.cookie_secure,
    );

    tokio::spawn(sweeper::run_session_sweeper(
        state.auth.sessions().clone(),
        config.session_sweep_secs,
    ));

    let app = router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Natter server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
