use anyhow::Context;
use auth_service::config::Settings;
use auth_service::security::tokens::TokenIssuer;
use auth_service::services::cleanup::spawn_revocation_cleanup;
use auth_service::services::email::EmailService;
use auth_service::services::otp::OtpService;
use auth_service::{http, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const REVOCATION_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("auth_service=info,info")),
        )
        .init();

    let settings = Settings::from_env()?;

    let db_config = db_pool::DbConfig::from_env("auth-service").map_err(anyhow::Error::msg)?;
    let db = db_pool::create_pool(&db_config)
        .await
        .context("failed to create database pool")?;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("failed to run migrations")?;

    let redis = match &settings.redis_url {
        Some(url) => match redis_utils::RedisPool::connect(url).await {
            Ok(pool) => Some(pool.manager()),
            Err(e) => {
                warn!(error = %e, "Redis unavailable, running without cache");
                None
            }
        },
        None => {
            info!("no REDIS_URL configured, running without cache");
            None
        }
    };

    let email = EmailService::new(&settings.email)?;
    let tokens = TokenIssuer::new(
        &settings.jwt.secret,
        settings.jwt.access_ttl_secs,
        settings.jwt.registration_ttl_secs,
    );
    let otp = OtpService::new(
        db.clone(),
        redis.clone(),
        email.clone(),
        settings.otp.ttl_secs,
    );

    let state = Arc::new(AppState {
        db: db.clone(),
        redis,
        tokens,
        otp,
        email,
        settings: settings.clone(),
    });

    spawn_revocation_cleanup(db, REVOCATION_CLEANUP_INTERVAL);

    let app = http::build_router(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "auth service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
