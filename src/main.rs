use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use webform_agent::config::Settings;
use webform_agent::server::{router, AppState};

#[tokio::main]
async fn main() -> webform_agent::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "webform_agent=info".into()),
        )
        .init();

    let settings = Settings::from_env();
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let app = router(AppState {
        settings: Arc::new(settings),
    });

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
