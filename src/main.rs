use anyhow::Result;
use axum::Router;
use photo_album::{
    config::{self, Backend},
    routes,
    services::album_service::AlbumService,
    store::{ObjectStore, memory::MemoryStore, s3::S3Store},
};
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting photo-album with config: {:?}", cfg);

    // --- Initialize object store client ---
    let store: Arc<dyn ObjectStore> = match cfg.backend {
        Backend::S3 => {
            if cfg.s3.bucket.is_none() {
                tracing::warn!(
                    "AWS_S3_BUCKET_NAME is not set; every album request will fail until it is configured"
                );
            }
            Arc::new(S3Store::connect(&cfg.s3).await)
        }
        Backend::Memory => {
            tracing::warn!("Using the in-memory backend; uploaded photos are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    // --- Initialize core service ---
    let shutdown = CancellationToken::new();
    let album = AlbumService::new(store, cfg.album_settings(), shutdown.clone());

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_upload_bytes).with_state(album);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tokio::spawn(shutdown_on_ctrl_c(shutdown.clone()));

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Cancel `shutdown` on Ctrl-C. Running migrations stop issuing copies and
/// in-flight requests are allowed to finish.
async fn shutdown_on_ctrl_c(shutdown: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Unable to listen for shutdown signal: {}", err);
        // keep serving; without a signal handler there is nothing to wait for
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
    shutdown.cancel();
}
