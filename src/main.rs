use axum::http::HeaderValue;
use axum::{middleware, Extension, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use backoffice_api::auth::{AuthConfig, AuthService};
use backoffice_api::cache::{Cache, CacheBackend, InMemoryCache, RedisCache};
use backoffice_api::config::{init_tracing, load_config, AppConfig};
use backoffice_api::db::establish_connection_from_app_config;
use backoffice_api::rate_limiter::{rate_limit_middleware, RateLimitConfig, RateLimiter};
use backoffice_api::services::AppServices;
use backoffice_api::{api_v1_routes, openapi, AppState};

fn build_cors(config: &AppConfig) -> CorsLayer {
    match config
        .cors_allowed_origins
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(config.log_level(), config.log_json);

    info!(
        environment = %config.environment,
        version = env!("CARGO_PKG_VERSION"),
        "starting back office API"
    );

    let db = Arc::new(establish_connection_from_app_config(&config).await?);

    let redis_client = if config.cache_use_redis {
        Some(Arc::new(redis::Client::open(config.redis_url.as_str())?))
    } else {
        None
    };

    let cache_backend: Arc<dyn CacheBackend> = match &redis_client {
        Some(client) => Arc::new(RedisCache::new(Arc::clone(client), "backoffice")),
        None => {
            info!("redis cache disabled; using in-memory cache");
            Arc::new(InMemoryCache::new())
        }
    };
    let cache = Cache::new(cache_backend);

    let services = AppServices::new(Arc::clone(&db), cache, &config)?;

    let auth_service = Arc::new(AuthService::new(AuthConfig {
        jwt_secret: config.jwt_secret.clone(),
        jwt_issuer: config.jwt_issuer.clone(),
        token_expiration_secs: config.jwt_expiration,
    }));

    let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig {
        requests_per_window: config.rate_limit_requests_per_window,
        window: Duration::from_secs(config.rate_limit_window_seconds),
    }));

    let cors = build_cors(&config);
    let addr = SocketAddr::new(config.host.parse()?, config.port);

    let state = AppState {
        db,
        config: Arc::new(config),
        services,
        redis: redis_client,
    };

    let app = Router::new()
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ))
        .layer(Extension(auth_service))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}
