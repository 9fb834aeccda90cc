//! aniguess-back binary entrypoint wiring configuration, storage and the REST layer.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aniguess_back::{
    config::AppConfig,
    dao::{
        file_store::{DiskFileStore, FileStore},
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let file_store: Arc<dyn FileStore> = Arc::new(DiskFileStore::new(&config.uploads_dir));
    tokio::fs::create_dir_all(&config.uploads_dir)
        .await
        .with_context(|| format!("creating uploads dir {}", config.uploads_dir.display()))?;

    let port = config.port;
    let app_state = AppState::new(config, file_store);
    spawn_storage_supervisor(app_state.clone()).await;

    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the background task that connects the quiz store, preferring MongoDB when it is
/// compiled in and `MONGO_URI` is set.
async fn spawn_storage_supervisor(state: SharedState) {
    #[cfg(feature = "mongo-store")]
    {
        use aniguess_back::dao::quiz_store::{
            QuizStore,
            mongodb::{MongoConfig, MongoDaoError, MongoQuizStore},
        };

        match MongoConfig::from_env().await {
            Ok(mongo) => {
                info!(database = %mongo.database_name, "using MongoDB quiz store");
                tokio::spawn(storage_supervisor::run(state, move || {
                    let config = mongo.clone();
                    async move {
                        let store = MongoQuizStore::connect(config).await?;
                        Ok::<_, StorageError>(Arc::new(store) as Arc<dyn QuizStore>)
                    }
                }));
                return;
            }
            Err(MongoDaoError::MissingEnvVar { .. }) => {}
            Err(err) => tracing::warn!(error = %err, "invalid MongoDB settings; using SQLite"),
        }
    }

    #[cfg(feature = "sqlite-store")]
    {
        use aniguess_back::dao::quiz_store::{
            QuizStore,
            sqlite::{SqliteConfig, SqliteQuizStore},
        };

        let sqlite = SqliteConfig::from_url(state.config().database_url.clone());
        info!(url = %sqlite.url, "using SQLite quiz store");
        tokio::spawn(storage_supervisor::run(state, move || {
            let config = sqlite.clone();
            async move {
                let store = SqliteQuizStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn QuizStore>)
            }
        }));
    }

    #[cfg(not(any(feature = "sqlite-store", feature = "mongo-store")))]
    {
        let _ = state;
        tracing::error!("no storage backend compiled in; serving in degraded mode");
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
