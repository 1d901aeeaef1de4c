use tokio::net::TcpListener;

use reelsync_server::{router, Config, Hub};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reelsync_server=debug,info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let addr = config.socket_addr();
    let app = router(Hub::new(config.rooms));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("reelsync relay listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
