//! Consumer endpoints. Open to resellers (scoped to their referrals) and
//! admins.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AuthRouterExt, AuthUser};
use crate::entities::profile::{AccountStatus, Role};
use crate::errors::ServiceError;
use crate::handlers::common::{ApiResponse, ListQuery, PaginatedResponse};
use crate::services::consumers::{CreateConsumerInput, UpdateConsumerInput};
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateConsumerRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub display_name: String,
    pub phone: Option<String>,
    /// Admin-only: attribute the consumer to a reseller
    pub referred_by: Option<Uuid>,
    #[serde(default)]
    pub lifetime_access: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateConsumerRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub lifetime_access: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetConsumerStatusRequest {
    pub status: AccountStatus,
    /// Honored on reactivation, clamped to the trial window
    pub trial_expiry: Option<DateTime<Utc>>,
}

async fn create_consumer(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateConsumerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let consumer = state
        .services
        .consumers
        .create(
            &user,
            CreateConsumerInput {
                email: payload.email,
                display_name: payload.display_name,
                phone: payload.phone,
                referred_by: payload.referred_by,
                lifetime_access: payload.lifetime_access,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(consumer))))
}

async fn list_consumers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (consumers, total) = state
        .services
        .consumers
        .list(&user, query.page, query.per_page)
        .await?;
    Ok(Json(PaginatedResponse::new(
        consumers,
        total,
        query.page.max(1),
        query.per_page,
    )))
}

async fn get_consumer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let consumer = state.services.consumers.get(&user, id).await?;
    Ok(Json(ApiResponse::new(consumer)))
}

async fn update_consumer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateConsumerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let consumer = state
        .services
        .consumers
        .update(
            &user,
            id,
            UpdateConsumerInput {
                email: payload.email,
                display_name: payload.display_name,
                phone: payload.phone,
                lifetime_access: payload.lifetime_access,
            },
        )
        .await?;
    Ok(Json(ApiResponse::new(consumer)))
}

async fn delete_consumer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.consumers.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_consumer_password(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.consumers.reset_password(&user, id).await?;
    // The credential goes out by email only
    Ok(Json(ApiResponse::new(
        serde_json::json!({ "password_reset": true }),
    )))
}

async fn set_consumer_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetConsumerStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let consumer = state
        .services
        .consumers
        .set_status(&user, id, payload.status, payload.trial_expiry)
        .await?;
    Ok(Json(ApiResponse::new(consumer)))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_consumer).get(list_consumers))
        .route(
            "/:id",
            get(get_consumer).put(update_consumer).delete(delete_consumer),
        )
        .route("/:id/reset-password", post(reset_consumer_password))
        .route("/:id/status", put(set_consumer_status))
        .with_role(Role::Reseller)
}
