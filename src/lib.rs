//! Back office API: role-gated profile management, invoice generation with
//! commission resolution, activity logging and email notifications.

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod openapi;
pub mod rate_limiter;
pub mod services;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;
use tracing::warn;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::services::AppServices;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub services: AppServices,
    pub redis: Option<Arc<redis::Client>>,
}

/// Liveness plus dependency checks: database ping and, when configured,
/// Redis ping. Degrades to 500 with per-dependency detail.
async fn health_check(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    state.db.ping().await?;

    let redis_status = match &state.redis {
        Some(client) => match client.get_async_connection().await {
            Ok(mut conn) => match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
                Ok(_) => "ok",
                Err(e) => {
                    warn!(error = %e, "redis health check failed");
                    return Err(ServiceError::CacheError(e.to_string()));
                }
            },
            Err(e) => {
                warn!(error = %e, "redis connection failed during health check");
                return Err(ServiceError::CacheError(e.to_string()));
            }
        },
        None => "disabled",
    };

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "database": "ok",
        "redis": redis_status,
    })))
}

async fn api_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
    }))
}

/// All `/api/v1` routes. Role gates are attached per sub-router.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/invoices", handlers::invoices::routes())
        .nest("/consumers", handlers::consumers::routes())
        .nest("/resellers", handlers::resellers::routes())
        .nest("/users", handlers::users::routes())
        .nest("/settings", handlers::settings::routes())
        .route("/health", get(health_check))
        .route("/status", get(api_status))
}
