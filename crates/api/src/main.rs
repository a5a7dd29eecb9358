use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{Router, http::HeaderName};
use tracing::{info, warn};

use warden_api::app::{AppState, build_app};
use warden_auth::Argon2Passwords;
use warden_infra::identity::{
    CredentialVerifier, IdentityDirectory, InMemoryIdentityDirectory, PostgresIdentityDirectory,
};
use warden_infra::kv::{InMemoryKvStore, KeyValueStore, RedisKvStore};
use warden_infra::{AppConfig, RateLimiter, SessionService, SessionStore, load_key_material};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warden_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let keys = Arc::new(load_key_material(&config).context("key material unavailable")?);
    if !keys.can_sign() {
        warn!("no private key configured; login and refresh will fail");
    }

    let kv: Arc<dyn KeyValueStore> = match &config.redis_addr {
        Some(addr) => Arc::new(
            RedisKvStore::connect(RedisKvStore::url_for_addr(addr))
                .await
                .with_context(|| format!("failed to connect to redis at {addr}"))?,
        ),
        None => {
            warn!("REDIS_ADDR not set; sessions live in process memory");
            Arc::new(InMemoryKvStore::new())
        }
    };

    let directory: Arc<dyn IdentityDirectory> = match &config.database_url {
        Some(url) => Arc::new(
            PostgresIdentityDirectory::connect(url)
                .await
                .context("failed to connect to the identity database")?,
        ),
        None => {
            warn!("DATABASE_URL not set; no identity can log in");
            Arc::new(InMemoryIdentityDirectory::new())
        }
    };

    let sessions = SessionService::new(
        &config.auth,
        keys,
        SessionStore::new(kv, config.auth.store_timeout),
        CredentialVerifier::new(directory, Arc::new(Argon2Passwords::default())),
    );

    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
    let sweeper = limiter.spawn_sweeper();

    let trusted_proxy_header = config
        .rate_limit
        .trusted_proxy_header
        .as_deref()
        .map(HeaderName::try_from)
        .transpose()
        .context("invalid TRUSTED_PROXY_HEADER")?;

    let app = build_app(
        AppState::new(sessions, limiter, trusted_proxy_header),
        Router::new(),
    );

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port))
        .await
        .with_context(|| format!("failed to bind 0.0.0.0:{}", config.http_port))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    sweeper.shutdown().await;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
