//! Bug tracker HTTP service entry point.
//!
//! # Purpose
//! Wires configuration, storage, token signing, and the HTTP router, then
//! serves the API and the Prometheus listener until shutdown.
use anyhow::Context;
use bugtracker::app::{AppState, build_router};
use bugtracker::auth::bootstrap::seed_admin;
use bugtracker::auth::tokens::TokenIssuer;
use bugtracker::config::{BugTrackerConfig, StorageBackend};
use bugtracker::observability;
use bugtracker::store::{BugTrackerStore, memory::InMemoryStore, postgres::PostgresStore};
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BugTrackerConfig::from_env_or_yaml().context("load bugtracker config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: BugTrackerConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("bugtracker");
    let state = build_state(config.clone()).await?;
    tracing::info!(
        backend = state.store.backend_name(),
        durable = state.store.is_durable(),
        "storage ready"
    );
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
        std::future::pending(),
    ));

    let app = build_router(state);
    let addr = config.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, "bugtracker listening");
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {
            tracing::info!("shutdown requested");
        }
    }

    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

async fn build_state(config: BugTrackerConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn BugTrackerStore + Send + Sync> = match config.storage {
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        StorageBackend::Postgres => {
            let pg = config
                .postgres
                .as_ref()
                .context("postgres configuration missing")?;
            Arc::new(
                PostgresStore::connect(pg)
                    .await
                    .context("connect postgres store")?,
            )
        }
    };

    if let Some(seed) = &config.bootstrap_admin {
        seed_admin(store.as_ref(), seed).await?;
    }
    if !config.media_root.is_dir() {
        tracing::warn!(
            media_root = %config.media_root.display(),
            "media root does not exist; /media will return 404"
        );
    }

    Ok(AppState {
        store,
        tokens: Arc::new(TokenIssuer::new(&config.auth)),
        media_root: config.media_root,
    })
}
