//! System settings endpoints. Admin-only.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::{AuthRouterExt, AuthUser};
use crate::entities::profile::Role;
use crate::errors::ServiceError;
use crate::handlers::common::ApiResponse;
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetSettingRequest {
    #[validate(length(min = 1, max = 4096))]
    pub value: String,
}

async fn list_settings(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let settings = state.services.settings.list().await?;
    Ok(Json(ApiResponse::new(settings)))
}

async fn set_setting(
    State(state): State<AppState>,
    user: AuthUser,
    Path(key): Path<String>,
    Json(payload): Json<SetSettingRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let setting = state.services.settings.set(&key, &payload.value).await?;
    state.services.activity.record(
        &user,
        "setting.updated",
        "app_setting",
        None,
        Some(serde_json::json!({ "key": key })),
    );
    Ok(Json(ApiResponse::new(setting)))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_settings))
        .route("/:key", put(set_setting))
        .with_role(Role::Admin)
}
