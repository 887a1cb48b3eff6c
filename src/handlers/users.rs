//! Cross-role profile endpoints. Admin-only.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AuthRouterExt, AuthUser};
use crate::entities::profile::{AccountStatus, Role};
use crate::errors::ServiceError;
use crate::handlers::common::{ApiResponse, PaginatedResponse};
use crate::services::users::UpdateUserInput;
use crate::AppState;

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct UserListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    /// Restrict to one role (`admin`, `reseller`, `consumer`)
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub status: Option<AccountStatus>,
}

async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (users, total) = state
        .services
        .users
        .list(query.role, query.page, query.per_page)
        .await?;
    Ok(Json(PaginatedResponse::new(
        users,
        total,
        query.page.max(1),
        query.per_page,
    )))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state.services.users.get(id).await?;
    Ok(Json(ApiResponse::new(user)))
}

async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let updated = state
        .services
        .users
        .update(
            &user,
            id,
            UpdateUserInput {
                email: payload.email,
                display_name: payload.display_name,
                phone: payload.phone,
                status: payload.status,
            },
        )
        .await?;
    Ok(Json(ApiResponse::new(updated)))
}

async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.users.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_user_password(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.users.reset_password(&user, id).await?;
    Ok(Json(ApiResponse::new(
        serde_json::json!({ "password_reset": true }),
    )))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/:id/reset-password", post(reset_user_password))
        .with_role(Role::Admin)
}
