use crate::{
    blob::FsBlobStore,
    cache::{PageCache, SystemClock},
    config::Env,
    render::JsonRenderer,
    server::{ServerState, auth::AdminToken},
};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yatube_common::util::NonPositiveDurationError;
use yatube_db::{DbError, Store, client::DbClient, memory::MemoryStore};

mod blob;
mod cache;
mod config;
mod handlers;
mod render;
mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid page cache TTL: {0}")]
    CacheTtl(#[from] NonPositiveDurationError),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "yatube_api=debug,\
                yatube_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn open_store(env: &Env) -> Result<Arc<dyn Store>, InitError> {
    let Some(database_url) = &env.database_url else {
        warn!("DATABASE_URL is not set, keeping all data in memory");
        return Ok(Arc::new(MemoryStore::new(env.worker_id, env.process_id)));
    };

    let client = DbClient::connect(database_url, env.worker_id, env.process_id).await?;
    client.migrate().await?;
    info!("Connected to database and applied migrations");

    Ok(Arc::new(client))
}

async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(%err, "Could not listen for ctrl-c");
                return;
            }
            info!("Received ctrl-c, shutting down");
            token.cancel();
        }
        () = token.cancelled() => {}
    }
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;
    debug!(?env, "Loaded configuration");

    let store = open_store(&env).await?;
    let cache = PageCache::new(
        env.page_cache_ttl()?,
        env.page_cache_capacity,
        Arc::new(SystemClock),
    );
    let state = ServerState::new(
        store,
        Arc::new(cache),
        Arc::new(JsonRenderer),
        Arc::new(FsBlobStore::new(&env.media_root)),
        env.admin_token.as_deref().map(AdminToken::new),
    );
    if state.admin_token.is_none() {
        info!("ADMIN_TOKEN is not set, admin routes are disabled");
    }

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes().with_state(state).layer(tracing_layer);

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
