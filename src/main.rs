use anyhow::Context;
use studychat::{app, config::Config, db, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("studychat=debug,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let db_pool = db::connect(&config).await?;
    let bind_addr = config.bind_addr;

    let app = app(AppState::new(db_pool, config))?;

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(%bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "could not listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("shut down");
    Ok(())
}
