use std::sync::Arc;

use stepflow_handlers::HandlerRegistry;
use stepflow_server::api;
use stepflow_server::config::AppConfig;
use stepflow_server::engine::Scheduler;
use stepflow_server::sse::SsePublisher;
use stepflow_server::state::AppState;
use stepflow_server::store::{CouchBackend, ProcessStore, RuntimeStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stepflow_server=debug,tower_http=debug".into()),
        )
        .with(fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("stepflow server v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::from_env().unwrap_or_else(|err| {
        warn!(error = %err, "invalid environment, using defaults");
        AppConfig::default()
    });
    info!(
        host = %config.host,
        port = config.port,
        volatile = config.volatile,
        datastore = %config.datastore_url,
        "configuration loaded"
    );

    let registry = Arc::new(HandlerRegistry::with_builtins(config.device_port));
    let (actions, conditions, responses) = registry.list();
    info!(?actions, ?conditions, ?responses, "handlers registered");

    let backend = Arc::new(CouchBackend::new(&config.datastore_url));
    let processes = Arc::new(ProcessStore::new(
        backend.clone(),
        &config.datastore_database,
        config.volatile,
        registry.clone(),
    ));
    let runtimes = Arc::new(RuntimeStore::new(
        backend,
        &config.datastore_database,
        config.volatile,
        registry.clone(),
    ));
    processes.startup_read().await?;
    runtimes.startup_read().await?;

    let publisher = Arc::new(SsePublisher::new(runtimes.clone(), config.publish_interval()));

    let token = CancellationToken::new();
    let scheduler = Scheduler::new(runtimes.clone(), registry, config.update_interval());
    let scheduler_handle = tokio::spawn(scheduler.run(token.child_token()));
    let publisher_handle = tokio::spawn(publisher.clone().run(token.child_token()));

    let config = Arc::new(config);
    let state = AppState::new(config.clone(), processes, runtimes, publisher);
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    token.cancel();
    scheduler_handle.await?;
    publisher_handle.await?;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
