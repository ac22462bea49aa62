use anyhow::{Context, Result};
use axum::middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

use price_catalog::{
    api::{
        auth_middleware, body_size_middleware, create_api_router, default_public_paths,
        logging_middleware, rate_limit_middleware, security_headers_middleware, ApiState,
        SecurityMiddlewareConfig, SecurityState,
    },
    config::{sanitize_for_logging, CatalogConfig},
    CatalogService, DatabasePool, NotificationDispatcher, Notifier, Repositories, SystemClock,
    TracingNotifier, WebhookNotifier,
};

const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    let config = CatalogConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {:#}", e);
        eprintln!("Please check CATALOG_* environment variables.");
        e
    })?;

    init_logging(&config)?;

    info!(
        auto_block_threshold = config.moderation.auto_block_threshold,
        blacklist_months = config.moderation.blacklist_months,
        sweep_interval_secs = config.sweeper.interval_secs,
        "Starting price catalog"
    );

    let repos = open_repositories(&config).await?;
    let notifier = create_notifier(&config)?;
    let service = CatalogService::new(
        repos,
        &config.moderation,
        Arc::new(SystemClock),
        NotificationDispatcher::new(notifier),
    );

    service
        .sweeper()
        .clone()
        .spawn(Duration::from_secs(config.sweeper.interval_secs));

    if config.security.enable_auth && config.security.api_keys.is_empty() {
        warn!("Authentication enabled without API keys - protected routes will refuse every request");
    }
    let security_state = SecurityState::new(SecurityMiddlewareConfig {
        enable_auth: config.security.enable_auth,
        api_keys: config.security.api_keys.clone(),
        rate_limit_per_minute: config.security.rate_limit_per_minute,
        max_request_size: config.security.max_request_size,
        log_requests: config.logging.log_requests,
        sanitize_logs: config.logging.sanitize_logs,
        public_paths: default_public_paths(),
    });
    security_state
        .rate_limiter
        .clone()
        .spawn_cleanup(RATE_LIMIT_CLEANUP_INTERVAL);

    // Outermost layer last: tracing, headers, logging, rate limit, auth, body size
    let app = create_api_router(ApiState::new(service))
        .layer(middleware::from_fn_with_state(
            security_state.clone(),
            body_size_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            security_state.clone(),
            auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            security_state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            security_state,
            logging_middleware,
        ))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!(
        addr = %bind_addr,
        auth = config.security.enable_auth,
        api_keys = config.security.api_keys.len(),
        rate_limit_per_minute = config.security.rate_limit_per_minute,
        "Price catalog listening"
    );

    // Connect info feeds the per-IP rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// `RUST_LOG` wins over `CATALOG_LOG_LEVEL` when set
fn init_logging(config: &CatalogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.logging.level.to_lowercase()))
        .context("Invalid log level")?;

    let span_events = if config.logging.log_requests {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    if config.logging.sanitize_logs {
        info!("Log sanitization enabled");
    }
    Ok(())
}

/// PostgreSQL when enabled, in-memory stores otherwise
async fn open_repositories(config: &CatalogConfig) -> Result<Repositories> {
    if !config.database.postgres_enabled {
        warn!("PostgreSQL disabled - using in-memory stores, data is lost on restart");
        return Ok(Repositories::in_memory());
    }

    info!(
        url = %sanitize_for_logging(&config.database.postgres_url),
        max_connections = config.database.max_connections,
        "Connecting to PostgreSQL"
    );
    let db = DatabasePool::new(
        &config.database.postgres_url,
        config.database.max_connections,
    )
    .await
    .map_err(anyhow::Error::msg)?;
    db.init_schema().await.map_err(anyhow::Error::msg)?;

    Ok(Repositories::postgres(&db))
}

/// Webhook delivery when configured, log-only otherwise
fn create_notifier(config: &CatalogConfig) -> Result<Arc<dyn Notifier>> {
    let Some(url) = &config.notifier.webhook_url else {
        info!("No webhook configured - notifications are logged only");
        return Ok(Arc::new(TracingNotifier));
    };

    info!(url = %sanitize_for_logging(url), "Notifications delivered by webhook");
    let webhook = WebhookNotifier::new(
        url.clone(),
        config.notifier.timeout_secs,
        config.notifier.max_retries,
    )
    .context("Failed to create webhook notifier")?;
    Ok(Arc::new(webhook))
}
